//! Lint rules.

use regex::Regex;
use std::sync::LazyLock;

use crate::script::{ClassifiedStatement, StatementCategory};

use super::{ValidationIssue, ValidationReport};

const DOLLAR_DELIMITER: &str = "$$";

/// Characters of trailing content quoted in the after-delimiter warning.
const TRAILING_PREVIEW_CHARS: usize = 20;

static BEGIN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bBEGIN\b").expect("valid BEGIN pattern"));
static BEGIN_TRANSACTION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bBEGIN\s+TRANSACTION\b").expect("valid BEGIN TRANSACTION pattern")
});
static END_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bEND\b").expect("valid END pattern"));

/// Lints classified statements in order.
///
/// Errors only apply to CREATE PROCEDURE and CREATE FUNCTION bodies; the
/// general warnings apply to every statement.
pub fn validate(statements: &[ClassifiedStatement]) -> ValidationReport {
    let mut report = ValidationReport::default();

    for stmt in statements {
        if stmt.category.is_routine_definition() {
            check_routine(stmt, &mut report);
        }
        check_general(stmt, &mut report);
    }

    report
}

fn check_routine(stmt: &ClassifiedStatement, report: &mut ValidationReport) {
    let ordinal = stmt.ordinal();
    let subject = stmt.category.as_str();
    let text = stmt.text();
    let upper = text.to_uppercase();

    let dollar_count = text.matches(DOLLAR_DELIMITER).count();
    match dollar_count {
        0 => report.push(ValidationIssue::error(
            ordinal,
            subject,
            "Missing $$ delimiters - procedure body must be wrapped in $$ ... $$",
        )),
        1 => report.push(ValidationIssue::error(
            ordinal,
            subject,
            "Only ONE $$ found - missing closing $$ delimiter",
        )),
        n if n % 2 != 0 => report.push(ValidationIssue::error(
            ordinal,
            subject,
            format!("Odd number of $$ delimiters ({n}) - check for missing opening/closing $$"),
        )),
        _ => {}
    }

    let begins = BEGIN_WORD.find_iter(&upper).count();
    let transaction_begins = BEGIN_TRANSACTION_WORDS.find_iter(&upper).count();
    let ends = END_WORD.find_iter(&upper).count();
    let procedural_begins = begins.saturating_sub(transaction_begins);
    if procedural_begins > ends {
        report.push(ValidationIssue::error(
            ordinal,
            subject,
            format!(
                "Missing END; - found {procedural_begins} BEGIN block(s) but only {ends} END statement(s)"
            ),
        ));
    }

    let opens_transaction = upper.contains("BEGIN TRANSACTION") || upper.contains("BEGIN WORK");
    if opens_transaction && !upper.contains("COMMIT") && !upper.contains("ROLLBACK") {
        report.push(ValidationIssue::error(
            ordinal,
            subject,
            "Has BEGIN TRANSACTION but no COMMIT or ROLLBACK - transaction will not complete",
        ));
    }

    if upper.contains("RETURNS") && !has_return_statement(&upper) {
        report.push(ValidationIssue::warning(
            ordinal,
            subject,
            "Declares RETURNS but no RETURN statement found",
        ));
    }

    if dollar_count >= 2 {
        if let Some(last) = text.rfind(DOLLAR_DELIMITER) {
            let trailing = text[last + DOLLAR_DELIMITER.len()..].trim();
            if !trailing.is_empty() && trailing != ";" {
                let preview: String = trailing.chars().take(TRAILING_PREVIEW_CHARS).collect();
                report.push(ValidationIssue::warning(
                    ordinal,
                    subject,
                    format!("Unexpected content after closing $$: '{preview}...'"),
                ));
            }
        }
    }
}

fn check_general(stmt: &ClassifiedStatement, report: &mut ValidationReport) {
    let ordinal = stmt.ordinal();
    let upper = stmt.text().to_uppercase();

    if stmt.category.is_data_removing() {
        report.push(ValidationIssue::warning(
            ordinal,
            stmt.category.as_str(),
            "Statement detected - data may be permanently deleted",
        ));
    }

    if upper.contains("GRANT") && upper.contains("ACCOUNTADMIN") {
        report.push(ValidationIssue::warning(
            ordinal,
            "GRANT",
            "Grant to ACCOUNTADMIN detected - elevated role, verify this is intended",
        ));
    }

    if stmt.category == StatementCategory::BeginTransaction {
        report.push(ValidationIssue::warning(
            ordinal,
            "Transaction",
            "Transaction detected - ensure COMMIT/ROLLBACK is included",
        ));
    }
}

/// Looks for `RETURN` followed by a space or a line break.
fn has_return_statement(upper: &str) -> bool {
    upper.contains("RETURN ") || upper.contains("RETURN\n") || upper.contains("RETURN\r\n")
}
