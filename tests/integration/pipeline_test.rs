//! Segment, classify and validate real-world scripts.

use pretty_assertions::assert_eq;
use sql_deploy::script::{classify, classify_all, segment, StatementCategory};
use sql_deploy::validate::{validate, Severity};

const RELEASE_SCRIPT: &str = r#"
USE DATABASE ANALYTICS;

CREATE OR REPLACE TABLE staging.orders_rollup (
    order_day DATE,
    note VARCHAR DEFAULT 'n/a; pending'
);

CREATE OR REPLACE PROCEDURE staging.refresh_rollup()
RETURNS VARCHAR
LANGUAGE SQL
AS $$
BEGIN
    -- the body contains semicolons
    BEGIN TRANSACTION;
    DELETE FROM staging.orders_rollup;
    INSERT INTO staging.orders_rollup SELECT order_day, 'it''s fine' FROM raw.orders;
    COMMIT;
    RETURN 'done';
END;
$$;

CALL staging.refresh_rollup();
-- end of release
"#;

fn texts(script: &str) -> Vec<String> {
    segment(script, false).into_iter().map(|s| s.text).collect()
}

#[test]
fn test_release_script_segments_in_order() {
    let statements = segment(RELEASE_SCRIPT, false);
    let ordinals: Vec<usize> = statements.iter().map(|s| s.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);

    let classified = classify_all(&statements);
    let categories: Vec<StatementCategory> = classified.iter().map(|c| c.category).collect();
    assert_eq!(
        categories,
        vec![
            StatementCategory::Use,
            StatementCategory::CreateTable,
            StatementCategory::CreateProcedure,
            StatementCategory::Call,
        ]
    );

    let procedure = &statements[2].text;
    assert!(procedure.starts_with("CREATE OR REPLACE PROCEDURE staging.refresh_rollup()"));
    assert!(procedure.contains("-- the body contains semicolons"));
    assert!(procedure.ends_with("END;\n$$"));
    assert!(statements[1].text.contains("'n/a; pending'"));
}

#[test]
fn test_release_script_validates_clean() {
    let classified = classify_all(&segment(RELEASE_SCRIPT, false));
    let report = validate(&classified);
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);
}

#[test]
fn test_plain_script_matches_naive_split() {
    let script = "SELECT 1;\n-- just a comment\n;\nINSERT INTO t VALUES (2);\n\nUPDATE t SET a = 3";
    let naive: Vec<String> = script
        .split(';')
        .map(str::trim)
        .filter(|fragment| {
            !fragment.is_empty()
                && !fragment
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .all(|line| line.trim().starts_with("--"))
        })
        .map(String::from)
        .collect();
    assert_eq!(texts(script), naive);
}

#[test]
fn test_dollar_block_with_semicolons_is_one_statement() {
    let script = "CREATE PROCEDURE p() RETURNS INT AS $$ a; b; $$;";
    assert_eq!(
        texts(script),
        vec!["CREATE PROCEDURE p() RETURNS INT AS $$ a; b; $$".to_string()]
    );
}

#[test]
fn test_named_dollar_tags_do_not_close_each_other() {
    let script = "CREATE FUNCTION f() AS $body$ x := '$$'; y; $body$; SELECT 2";
    assert_eq!(
        texts(script),
        vec![
            "CREATE FUNCTION f() AS $body$ x := '$$'; y; $body$".to_string(),
            "SELECT 2".to_string(),
        ]
    );
}

#[test]
fn test_string_literals_protect_semicolons_and_quotes() {
    assert_eq!(texts("SELECT ';' ;"), vec!["SELECT ';'".to_string()]);
    assert_eq!(texts("SELECT 'it''s' ;"), vec!["SELECT 'it''s'".to_string()]);
}

#[test]
fn test_single_statement_mode() {
    let script = "  CREATE PROCEDURE p() AS $$ a; $$;\nSELECT 1;  ";
    let statements = segment(script, true);
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].text, script.trim());
    assert_eq!(statements[0].ordinal, 1);
    assert!(segment(" \n\t ", true).is_empty());
}

#[test]
fn test_unmatched_dollar_tag_splits_inside_body() {
    // Known limitation: with no closing tag the body is split on its semicolons.
    let script = "CREATE PROCEDURE p() AS $$ BEGIN a; END;";
    assert_eq!(
        texts(script),
        vec![
            "CREATE PROCEDURE p() AS $$ BEGIN a".to_string(),
            "END".to_string(),
        ]
    );
}

#[test]
fn test_classification_is_total_and_stable() {
    for text in ["SELECT 1", "VACUUM", "WITH x AS (SELECT 1) SELECT * FROM x", "lorem ipsum"] {
        let first = classify(text);
        assert_eq!(classify(text), first);
    }
    assert_eq!(classify("lorem ipsum"), StatementCategory::Sql);
    // Only the leading keyword counts, so a leading comment hides it.
    assert_eq!(classify("-- note\nSELECT 1"), StatementCategory::Sql);
}

#[test]
fn test_procedure_without_delimiters_has_one_error() {
    let classified = classify_all(&segment("CREATE PROCEDURE x() AS body", false));
    let report = validate(&classified);

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].severity, Severity::Error);
    assert_eq!(report.errors[0].statement_ordinal, 1);
    assert!(report.errors[0].message.contains("Missing $$ delimiters"));
}

#[test]
fn test_general_warnings_tag_their_statement() {
    let script = "DROP TABLE old_orders; GRANT ROLE ops TO ROLE ACCOUNTADMIN; BEGIN TRANSACTION; COMMIT";
    let report = validate(&classify_all(&segment(script, false)));

    assert!(report.errors.is_empty());
    let ordinals: Vec<usize> = report.warnings.iter().map(|w| w.statement_ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
}
