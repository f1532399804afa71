//! Query tag attachment.
//!
//! Strategies are tried in a fixed order and the first one that does not
//! error is adopted for the whole run. The last strategy cannot fail.

use crate::db::DeployTarget;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// How the query tag reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTagMethod {
    /// Property on a native session handle.
    SessionProperty,
    /// Session-scoped statement run through the query primitive.
    SessionStatement,
    /// Comment prepended to every dispatched statement.
    CommentPrefix,
}

impl QueryTagMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionProperty => "session property",
            Self::SessionStatement => "session statement",
            Self::CommentPrefix => "SQL comment prefix",
        }
    }

    /// True if statements must carry the tag themselves.
    pub fn rewrites_statements(&self) -> bool {
        matches!(self, Self::CommentPrefix)
    }
}

impl fmt::Display for QueryTagMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attaches `tag` using the first strategy the target accepts.
pub(crate) async fn attach_query_tag(target: &dyn DeployTarget, tag: &str) -> QueryTagMethod {
    match target.set_session_query_tag(tag).await {
        Ok(()) => return QueryTagMethod::SessionProperty,
        Err(e) => debug!("Session property query tag rejected: {}", e),
    }

    match target.query_tag_statement(tag) {
        Ok(statement) => match target.execute_query(&statement).await {
            Ok(_) => return QueryTagMethod::SessionStatement,
            Err(e) => debug!("Session statement query tag rejected: {}", e),
        },
        Err(e) => debug!("Session statement cannot carry query tag: {}", e),
    }

    QueryTagMethod::CommentPrefix
}

/// Comment block prepended to statements under [`QueryTagMethod::CommentPrefix`].
pub(crate) fn tag_comment(tag: &str, user: &str, role: &str, timestamp: &str) -> String {
    format!("/* QUERY_TAG: {tag} | User: {user} | Role: {role} | Timestamp: {timestamp} */\n")
}
