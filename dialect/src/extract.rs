//! Trigger and table extraction from schema text, plus bulk-statement
//! splitting.
//!
//! Extraction is regex scanning, not parsing: definitions come back in
//! source order, exactly as written, and malformed bodies are only surfaced
//! when the storage engine rejects the generated statement.

use regex::Regex;
use std::sync::LazyLock;

// SAFETY: These regexes are compile-time constants and are validated by tests.
static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)CREATE\s+TRIGGER\s+(\w+).*?END;").expect("static regex must compile")
});
static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)CREATE\s+TABLE\s+(\w+)\s*\((.*?)\)\s*;").expect("static regex must compile")
});
static STATEMENT_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*\n").expect("static regex must compile"));

/// A `CREATE TABLE` definition lifted out of rewritten schema text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name as written in the source.
    pub name: String,
    /// The full `CREATE TABLE name (body);` statement.
    pub sql: String,
}

/// A `CREATE TRIGGER` definition lifted out of raw schema text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDef {
    /// Trigger name as written in the source.
    pub name: String,
    /// The full trigger statement, from `CREATE TRIGGER` through `END;`.
    pub sql: String,
}

/// Extracts trigger definitions from raw (pre-rewrite) schema text.
///
/// Scans for `CREATE TRIGGER <name>` and captures everything up to the
/// next literal `END;`, case-insensitive and spanning newlines. Returns
/// exactly one entry per `CREATE TRIGGER` occurrence, in source order.
///
/// Known limitation: a trigger body containing a nested `BEGIN...END;`
/// block before its true terminator is closed at the first `END;`.
pub fn extract_triggers(sql: &str) -> Vec<TriggerDef> {
    TRIGGER_RE
        .captures_iter(sql)
        .map(|caps| TriggerDef {
            name: caps[1].to_string(),
            sql: caps[0].to_string(),
        })
        .collect()
}

/// Extracts `CREATE TABLE` definitions from rewritten schema text.
///
/// Captures the table name and column body non-greedily, spanning
/// newlines, and rebuilds a canonical `CREATE TABLE name (body);`
/// statement for each. Definitions come back in source order, which is
/// not dependency order.
pub fn extract_tables(sql: &str) -> Vec<TableDef> {
    TABLE_RE
        .captures_iter(sql)
        .map(|caps| TableDef {
            name: caps[1].to_string(),
            sql: format!("CREATE TABLE {} ({});", &caps[1], &caps[2]),
        })
        .collect()
}

/// Splits bulk data text into candidate statements.
///
/// The boundary is a statement terminator (`;`) followed by a newline,
/// with optional whitespace between. Segments are trimmed; empty segments
/// are dropped. The caller decides which statement kinds to execute.
pub fn split_statements(sql: &str) -> Vec<&str> {
    STATEMENT_SPLIT_RE
        .split(sql)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}
