//! End-to-end deployments against the mock target.

use sql_deploy::db::{MockCall, MockContext, MockTarget};
use sql_deploy::deploy::{
    DeployRequest, Deployer, DispatchResult, QueryTagMethod, RunStatus, StatementState,
};
use sql_deploy::script::{classify_all, segment, ClassifiedStatement};

fn prepare(script: &str) -> Vec<ClassifiedStatement> {
    classify_all(&segment(script, false))
}

fn request() -> DeployRequest {
    DeployRequest::new("CHG-0042", "ANALYTICS")
}

#[tokio::test]
async fn test_empty_script_succeeds_with_note() {
    let target = MockTarget::new();
    let run = Deployer::new(&target)
        .run(&request(), &prepare("-- nothing to do\n;\n"))
        .await;

    assert_eq!(run.status, RunStatus::Success);
    assert!(run.outcomes.is_empty());
    assert!(run.entries.contains("] No statements to execute"));
    assert!(target.executed_sql().is_empty());
    assert!(run.render().contains("Status: SUCCESS"));
}

#[tokio::test]
async fn test_halts_after_first_failure() {
    let target = MockTarget::new().fail_on("INSERT INTO b", "relation \"b\" does not exist");
    let run = Deployer::new(&target)
        .run(
            &request(),
            &prepare("INSERT INTO a VALUES (1); INSERT INTO b VALUES (2); INSERT INTO c VALUES (3);"),
        )
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.outcomes.len(), 2);
    assert!(run.outcomes[0].succeeded());
    assert_eq!(run.outcomes[1].ordinal, 2);
    assert_eq!(
        run.statement_states,
        vec![
            StatementState::Succeeded,
            StatementState::Failed,
            StatementState::Pending,
        ]
    );
    assert!(!target
        .executed_sql()
        .iter()
        .any(|sql| sql.contains("INSERT INTO c")));

    assert!(run.entries.contains("✗ INSERT: FAILED"));
    assert!(run.entries.contains("   SQL: INSERT INTO b VALUES (2)"));
    assert!(run
        .entries
        .contains("   Error: relation \"b\" does not exist"));
    assert!(run.render().contains("Status: FAILED"));
}

#[tokio::test]
async fn test_validation_errors_do_not_block_dispatch() {
    let target = MockTarget::new();
    let statements = prepare("CREATE PROCEDURE p() AS body");
    assert!(sql_deploy::validate::validate(&statements).has_errors());

    let run = Deployer::new(&target).run(&request(), &statements).await;

    assert!(run.is_success());
    assert_eq!(
        target.executed_sql(),
        vec!["CREATE PROCEDURE p() AS body".to_string()]
    );
}

#[tokio::test]
async fn test_query_tag_session_statement_fallback() {
    let target = MockTarget::new().without_session_handle();
    let run = Deployer::new(&target)
        .run(&DeployRequest::new("O'Brien fix", "ANALYTICS"), &prepare("SELECT 1"))
        .await;

    assert_eq!(run.query_tag_method, Some(QueryTagMethod::SessionStatement));
    assert!(run
        .entries
        .contains("Query tag set via session statement: O'Brien fix"));
    assert_eq!(
        target.executed_sql(),
        vec![
            "ALTER SESSION SET QUERY_TAG = 'O''Brien fix'".to_string(),
            "SELECT 1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_comment_prefix_spares_routines_and_strips_semicolon() {
    let target = MockTarget::new()
        .without_session_handle()
        .rejecting_tag_statement();
    let statements = segment(
        "CREATE FUNCTION add_one(i INT) RETURNS INT AS $$ BEGIN RETURN i + 1; END; $$ ;",
        true,
    );
    let run = Deployer::new(&target)
        .run(&request(), &classify_all(&statements))
        .await;

    assert!(run.is_success());
    assert!(run
        .entries
        .contains("Query tag will be embedded as SQL comment: /* QUERY_TAG: CHG-0042 */"));
    assert!(run.entries.contains(
        "   Note: Query tag comment skipped for CREATE FUNCTION to preserve $$ delimiters"
    ));
    assert_eq!(
        target.calls().last(),
        Some(&MockCall::Definition(
            "CREATE FUNCTION add_one(i INT) RETURNS INT AS $$ BEGIN RETURN i + 1; END; $$"
                .to_string()
        ))
    );
}

#[tokio::test]
async fn test_context_notes_are_not_failures() {
    let target = MockTarget::new()
        .with_database_context(MockContext::Unsupported(
            "USE DATABASE not supported in this context - using fully qualified names".into(),
        ));
    let run = Deployer::new(&target)
        .run(&request().with_schema("STAGING"), &prepare("SELECT 1"))
        .await;

    assert!(run.is_success());
    assert_eq!(run.notes.len(), 1);
    assert!(run.entries.contains("Database context: ANALYTICS (note: USE DATABASE not supported"));
    assert!(run.entries.contains("Schema set: STAGING"));
    assert_eq!(
        &target.calls()[..2],
        &[
            MockCall::SetDatabase("ANALYTICS".to_string()),
            MockCall::SetSchema("STAGING".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_procedure_carries_sql_and_hints() {
    let target = MockTarget::new().fail_on("PROCEDURE", "Parse error at line 2");
    let run = Deployer::new(&target)
        .run(
            &request(),
            &prepare("CREATE PROCEDURE p() AS $$ BEGIN NULL; $$"),
        )
        .await;

    let outcome = run.failed_outcome().expect("procedure should fail");
    assert_eq!(outcome.sql_sent, "CREATE PROCEDURE p() AS $$ BEGIN NULL; $$");
    let DispatchResult::Failed { error, hints } = &outcome.result else {
        panic!("expected a failed dispatch");
    };
    assert!(error.starts_with("Procedure creation failed: Parse error at line 2"));
    assert_eq!(
        hints,
        &vec![
            "Found 1 $$ block(s)".to_string(),
            "Found BEGIN without END".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_log_is_written_and_serializes() {
    let target = MockTarget::new();
    let run = Deployer::new(&target)
        .run(&request(), &prepare("CREATE TABLE t (id INT); SELECT * FROM t"))
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = run.write_to(dir.path()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("deployment_") && name.ends_with(".txt"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(&"=".repeat(60)));
    assert!(text.contains("Query Tag: CHG-0042\nUser: MOCK_USER\nRole: MOCK_ROLE\nDatabase: ANALYTICS\nStart: "));

    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["query_tag_method"], "session_property");
    assert_eq!(json["outcomes"][0]["category"], "CREATE TABLE");
    assert_eq!(json["outcomes"][1]["summary"], "1 row(s) returned/affected");
}
