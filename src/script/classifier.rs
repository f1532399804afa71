//! Keyword-based statement classification.
//!
//! Looks only at the leading keyword, plus a handful of secondary keywords
//! for CREATE and BEGIN. Secondary keywords are searched across the whole
//! statement, so a `TABLE` mentioned in a comment or a column name can
//! steer a CREATE to the wrong sub-category. Routing only needs the coarse
//! kind, so this is left as is.

use super::{ClassifiedStatement, Statement, StatementCategory};

/// CREATE sub-categories, in precedence order.
const CREATE_KINDS: [(&str, StatementCategory); 10] = [
    ("PROCEDURE", StatementCategory::CreateProcedure),
    ("FUNCTION", StatementCategory::CreateFunction),
    ("TABLE", StatementCategory::CreateTable),
    ("VIEW", StatementCategory::CreateView),
    ("SCHEMA", StatementCategory::CreateSchema),
    ("DATABASE", StatementCategory::CreateDatabase),
    ("TASK", StatementCategory::CreateTask),
    ("STREAM", StatementCategory::CreateStream),
    ("STAGE", StatementCategory::CreateStage),
    ("PIPE", StatementCategory::CreatePipe),
];

/// Leading keywords that map straight to a category. First match wins.
const LEADING_KEYWORDS: [(&str, StatementCategory); 23] = [
    ("ALTER", StatementCategory::Alter),
    ("DROP", StatementCategory::Drop),
    ("TRUNCATE", StatementCategory::Truncate),
    ("INSERT", StatementCategory::Insert),
    ("UPDATE", StatementCategory::Update),
    ("DELETE", StatementCategory::Delete),
    ("MERGE", StatementCategory::Merge),
    ("SELECT", StatementCategory::Select),
    ("WITH", StatementCategory::SelectCte),
    ("CALL", StatementCategory::Call),
    ("EXECUTE", StatementCategory::Execute),
    ("COMMIT", StatementCategory::Commit),
    ("ROLLBACK", StatementCategory::Rollback),
    ("COPY", StatementCategory::Copy),
    ("PUT", StatementCategory::Put),
    ("GET", StatementCategory::Get),
    ("GRANT", StatementCategory::Grant),
    ("REVOKE", StatementCategory::Revoke),
    ("USE", StatementCategory::Use),
    ("SET", StatementCategory::Set),
    ("SHOW", StatementCategory::Show),
    ("DESCRIBE", StatementCategory::Describe),
    ("DESC", StatementCategory::Describe),
];

/// Classifies a single statement by its leading keyword.
///
/// Total: anything unrecognised is [`StatementCategory::Sql`].
pub fn classify(statement: &str) -> StatementCategory {
    let upper = statement.trim().to_uppercase();

    if upper.starts_with("CREATE") {
        return CREATE_KINDS
            .iter()
            .find(|(keyword, _)| upper.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(StatementCategory::Create);
    }

    if upper.starts_with("BEGIN") {
        return if upper.contains("TRANSACTION") {
            StatementCategory::BeginTransaction
        } else {
            StatementCategory::BeginBlock
        };
    }

    LEADING_KEYWORDS
        .iter()
        .find(|(keyword, _)| upper.starts_with(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(StatementCategory::Sql)
}

/// Classifies every statement, preserving order.
pub fn classify_all(statements: &[Statement]) -> Vec<ClassifiedStatement> {
    statements
        .iter()
        .map(|statement| ClassifiedStatement {
            category: classify(&statement.text),
            statement: statement.clone(),
        })
        .collect()
}
