//! Deployments against a live PostgreSQL database.
//!
//! Skipped unless DATABASE_URL is set.

use sql_deploy::config::ConnectionConfig;
use sql_deploy::db::{DeployTarget, PostgresTarget};
use sql_deploy::deploy::{DeployRequest, Deployer, QueryTagMethod, RunStatus};
use sql_deploy::script::{classify_all, segment};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test target and the database it is connected to.
async fn get_test_target() -> Option<(PostgresTarget, String)> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let database = config.database.clone()?;
    let target = PostgresTarget::connect(&config).await.ok()?;
    Some((target, database))
}

const SCRIPT: &str = r#"
CREATE TABLE IF NOT EXISTS sql_deploy_it_orders (id INT PRIMARY KEY, note TEXT);

CREATE OR REPLACE FUNCTION sql_deploy_it_count() RETURNS BIGINT AS $$
BEGIN
    RETURN (SELECT count(*) FROM sql_deploy_it_orders);
END;
$$ LANGUAGE plpgsql;

INSERT INTO sql_deploy_it_orders VALUES (1, 'semi; colon') ON CONFLICT DO NOTHING;
SELECT sql_deploy_it_count();
DROP FUNCTION sql_deploy_it_count();
DROP TABLE sql_deploy_it_orders;
"#;

#[tokio::test]
async fn test_deploy_script_against_postgres() {
    let Some((target, database)) = get_test_target().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let statements = classify_all(&segment(SCRIPT, false));
    assert_eq!(statements.len(), 6);

    let run = Deployer::new(&target)
        .run(
            &DeployRequest::new("it-run", database.as_str()).with_schema("public"),
            &statements,
        )
        .await;

    assert_eq!(run.status, RunStatus::Success, "log:\n{}", run.render());
    assert_eq!(run.query_tag_method, Some(QueryTagMethod::SessionStatement));
    assert!(run.entries.contains(&format!("Database set: {database}")));
    assert!(run.entries.contains("Schema set: public"));
    assert!(run.entries.contains("✓ SELECT: 1 row(s) returned/affected"));

    target.close().await.unwrap();
}

#[tokio::test]
async fn test_failure_halts_against_postgres() {
    let Some((target, database)) = get_test_target().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let statements = classify_all(&segment(
        "SELECT 1; SELECT * FROM sql_deploy_missing_table; SELECT 2",
        false,
    ));
    let run = Deployer::new(&target)
        .run(&DeployRequest::new("it-fail", database.as_str()), &statements)
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.outcomes.len(), 2);
    assert!(run.entries.contains("does not exist"));

    target.close().await.unwrap();
}

#[tokio::test]
async fn test_dml_logs_rows_affected_against_postgres() {
    let Some((target, database)) = get_test_target().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let statements = classify_all(&segment(
        "CREATE TEMP TABLE sql_deploy_it_rows (id INT);
         INSERT INTO sql_deploy_it_rows VALUES (1), (2), (3);
         UPDATE sql_deploy_it_rows SET id = id * 10 WHERE id < 3;
         DELETE FROM sql_deploy_it_rows WHERE id = 3;",
        false,
    ));
    let run = Deployer::new(&target)
        .run(&DeployRequest::new("it-rows", database.as_str()), &statements)
        .await;

    assert_eq!(run.status, RunStatus::Success, "log:\n{}", run.render());
    assert!(run.entries.contains("✓ INSERT: 3 row(s) returned/affected"));
    assert!(run.entries.contains("✓ UPDATE: 2 row(s) returned/affected"));
    assert!(run.entries.contains("✓ DELETE: 1 row(s) returned/affected"));

    target.close().await.unwrap();
}

#[tokio::test]
async fn test_oversized_tag_falls_back_to_comment_against_postgres() {
    let Some((target, database)) = get_test_target().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let tag = format!("CHG-{}-ünïcode", "x".repeat(70));
    let run = Deployer::new(&target)
        .run(
            &DeployRequest::new(tag.as_str(), database.as_str()),
            &classify_all(&segment("SELECT 1", false)),
        )
        .await;

    assert_eq!(run.status, RunStatus::Success, "log:\n{}", run.render());
    assert_eq!(run.query_tag_method, Some(QueryTagMethod::CommentPrefix));
    assert!(run
        .entries
        .contains(&format!("Query tag will be embedded as SQL comment: /* QUERY_TAG: {tag} */")));
    assert!(run.outcomes[0].sql_sent.starts_with(&format!("/* QUERY_TAG: {tag} |")));

    target.close().await.unwrap();
}
