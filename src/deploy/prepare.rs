//! Statement preparation and failure diagnostics.

const PREVIEW_CHARS: usize = 100;

/// Returned by the definition primitive on success, and by the query
/// primitive when no rows come back.
pub(crate) const EXECUTED_SUCCESSFULLY: &str = "Executed successfully";

/// Single-line preview of a statement for the deployment log.
///
/// Keeps the first 100 characters with each `\n` turned into a space and
/// appends `...` when anything was cut. Carriage returns are left alone.
pub fn preview(sql: &str) -> String {
    let mut preview: String = sql
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if sql.chars().nth(PREVIEW_CHARS).is_some() {
        preview.push_str("...");
    }
    preview
}

/// Strips a semicolon that directly follows a closing `$$`.
///
/// Trailing whitespace is always removed. Semicolons are only removed when
/// the statement contains `$$` and what remains after stripping them ends
/// in `$$`.
pub fn normalize_trailing_semicolon(sql: &str) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') && trimmed.contains("$$") {
        let stripped = trimmed.trim_end_matches([';', ' ', '\t', '\n']);
        if stripped.ends_with("$$") {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

/// Prepends a rendered tag comment to a statement.
pub(crate) fn with_tag_comment(comment: &str, sql: &str) -> String {
    format!("{comment}{sql}")
}

/// True when an engine error looks like the parser choked on the body.
pub(crate) fn is_parse_failure(error: &str) -> bool {
    let lower = error.to_lowercase();
    lower.contains("parse error") || lower.contains("unexpected")
}

/// Error text recorded for a routine definition that failed to parse.
pub(crate) fn routine_parse_failure(error: &str) -> String {
    format!(
        "Procedure creation failed: {error}\n\n\
         Note: This may be a limitation of the execution environment with $$ delimiters. \
         Try deploying this procedure directly through the engine's own client."
    )
}

/// Syntax checks over the SQL that was sent, attached to a failed outcome.
pub fn failure_hints(sql: &str) -> Vec<String> {
    let mut hints = Vec::new();

    let dollar_count = sql.matches("$$").count();
    if dollar_count > 0 {
        if dollar_count % 2 != 0 {
            hints.push(format!(
                "Odd number of $$ delimiters ({dollar_count}) - ensure opening and closing $$ match"
            ));
        } else {
            hints.push(format!("Found {} $$ block(s)", dollar_count / 2));
        }
    }

    let upper = sql.to_uppercase();
    if upper.contains("BEGIN") && !upper.contains("END") {
        hints.push("Found BEGIN without END".to_string());
    }

    let open = sql.matches('(').count();
    let close = sql.matches(')').count();
    if open != close {
        hints.push(format!(
            "Mismatched parentheses: {open} open, {close} close"
        ));
    }

    hints
}
