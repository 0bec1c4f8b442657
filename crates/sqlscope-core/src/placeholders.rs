//! Placeholder and statement-text helpers

use regex::Regex;
use std::sync::LazyLock;

static SKIP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'(?:[^'\\]|\\.)*'|--[^\n]*|/\*[\s\S]*?\*/").expect("valid regex")
});

static BLOCK_COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("valid regex"));

static LINE_COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[^\n]*").expect("valid regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Rewrite JDBC-style `?` placeholders into PostgreSQL's `$1, $2, ...`.
///
/// Question marks inside string literals and comments are left alone.
pub fn to_numbered(sql: &str) -> String {
    let skip_ranges: Vec<(usize, usize)> = SKIP_REGEX
        .find_iter(sql)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut result = String::with_capacity(sql.len() + 8);
    let mut position = 0;
    for (idx, ch) in sql.char_indices() {
        if ch == '?' && !skip_ranges.iter().any(|&(start, end)| idx >= start && idx < end) {
            position += 1;
            result.push('$');
            result.push_str(&position.to_string());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Strip comments and collapse whitespace so that formatting-only
/// differences map to the same text.
pub fn normalize(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT_REGEX.replace_all(sql, " ");
    let without_lines = LINE_COMMENT_REGEX.replace_all(&without_blocks, " ");
    WHITESPACE_REGEX
        .replace_all(&without_lines, " ")
        .trim()
        .to_string()
}

/// True when the statement is itself an EXPLAIN
pub fn is_explain(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    trimmed
        .get(..7)
        .is_some_and(|head| head.eq_ignore_ascii_case("explain"))
}
