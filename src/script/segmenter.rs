//! Script segmentation.
//!
//! Segmentation runs in two passes. The first locates dollar-quoted blocks
//! (`$$ ... $$`, `$body$ ... $body$`) anywhere in the script and records
//! their spans. The second walks the script with a small state machine and
//! cuts statements at semicolons that sit outside string literals and
//! outside any recorded block. Block text is copied through verbatim, so
//! procedure bodies come out exactly as written.

use std::ops::Range;

use tracing::trace;

use super::Statement;

/// A dollar-quoted region located by the first pass.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DollarBlock<'a> {
    /// Delimiter text, e.g. `$$` or `$body$`.
    tag: &'a str,
    /// Text between the opening and closing delimiter.
    body: &'a str,
    /// Byte range of the whole block, delimiters included.
    span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString,
    /// Copying a dollar block through; `end` is the byte offset just past
    /// the closing delimiter.
    InDollarBlock { end: usize, in_string: bool },
}

/// Splits a script into executable statements.
///
/// With `single_statement_mode` the whole trimmed script is one statement
/// (or none when it is blank). Otherwise statements are cut at top-level
/// semicolons, fragments that are empty or consist only of `--` comment
/// lines are dropped, and the survivors are numbered from 1 in script order.
pub fn segment(script: &str, single_statement_mode: bool) -> Vec<Statement> {
    if single_statement_mode {
        let trimmed = script.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![Statement::new(trimmed, 1)];
    }

    let blocks = find_dollar_blocks(script);
    split_top_level(script, &blocks)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Statement::new(text, idx + 1))
        .collect()
}

/// Locates every dollar-quoted block in the script.
///
/// A block opens with `$`, zero or more ASCII word characters, `$` and closes
/// at the first later occurrence of the same delimiter text. Blocks do not
/// nest: a different delimiter inside a block is just body text. An opener
/// without a matching closer is skipped and its `$` stays ordinary text.
fn find_dollar_blocks(script: &str) -> Vec<DollarBlock<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(offset) = script[pos..].find('$') {
        let start = pos + offset;
        let Some(tag) = dollar_tag_at(script, start) else {
            pos = start + 1;
            continue;
        };

        let body_start = start + tag.len();
        match script[body_start..].find(tag) {
            Some(body_len) => {
                let end = body_start + body_len + tag.len();
                blocks.push(DollarBlock {
                    tag,
                    body: &script[body_start..body_start + body_len],
                    span: start..end,
                });
                pos = end;
            }
            None => pos = start + 1,
        }
    }

    blocks
}

/// Returns the delimiter starting at `start` (which must hold a `$`), if any.
fn dollar_tag_at(script: &str, start: usize) -> Option<&str> {
    let rest = &script[start + 1..];
    let name_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if rest.as_bytes().get(name_len) == Some(&b'$') {
        Some(&script[start..start + name_len + 2])
    } else {
        None
    }
}

/// Cuts the script at top-level semicolons, keeping only retained statements.
fn split_top_level(script: &str, blocks: &[DollarBlock<'_>]) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Normal;
    let mut pending_blocks = blocks.iter().peekable();
    let mut chars = script.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if let ScanState::InDollarBlock { end, in_string } = state {
            current.push(ch);
            if idx + ch.len_utf8() >= end {
                state = if in_string {
                    ScanState::InString
                } else {
                    ScanState::Normal
                };
            }
            continue;
        }

        if let Some(block) = pending_blocks.next_if(|block| block.span.start == idx) {
            trace!(tag = block.tag, body_len = block.body.len(), "Copying dollar block");
            current.push(ch);
            state = ScanState::InDollarBlock {
                end: block.span.end,
                in_string: state == ScanState::InString,
            };
            continue;
        }

        match (state, ch) {
            (ScanState::Normal, '\'') => {
                current.push(ch);
                state = ScanState::InString;
            }
            (ScanState::Normal, ';') => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            (ScanState::InString, '\'') => {
                current.push(ch);
                // '' is an escaped quote and keeps the literal open
                if chars.next_if(|(_, next)| *next == '\'').is_some() {
                    current.push('\'');
                } else {
                    state = ScanState::Normal;
                }
            }
            _ => current.push(ch),
        }
    }

    push_statement(&mut statements, &current);
    statements
}

/// Trims a candidate and keeps it unless it is blank or comment-only.
fn push_statement(statements: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if trimmed.is_empty() || is_comment_only(trimmed) {
        return;
    }
    statements.push(trimmed.to_string());
}

/// Returns true if every non-blank line starts with `--`.
fn is_comment_only(text: &str) -> bool {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .all(|line| line.starts_with("--"))
}
