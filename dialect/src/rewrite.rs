//! Schema text rewriting from the extended source dialect into the
//! reduced subset SQLite accepts.

use regex::Regex;
use std::sync::LazyLock;

// SAFETY: These regexes are compile-time constants and are validated by tests.
static CHECK_REGEXP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),?\s*CHECK\s*\([^)]*REGEXP[^)]*\)").expect("static regex must compile")
});
static VARCHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)VARCHAR\(\d+\)").expect("static regex must compile"));
static CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCHAR\(\d+\)").expect("static regex must compile"));
static TINYINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTINYINT\b").expect("static regex must compile"));
static SMALLINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSMALLINT\b").expect("static regex must compile"));
static REF_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*ON\s+(DELETE|UPDATE)\s+(SET\s+NULL|CASCADE|NO\s+ACTION|RESTRICT)")
        .expect("static regex must compile")
});

/// Rewrites extended-dialect SQL text into the subset SQLite accepts.
///
/// Applied substitutions, each case-insensitive and independent of the
/// others:
///
/// - `CHECK (expr REGEXP pattern)` constraints (with or without a leading
///   comma) are removed entirely,
/// - `VARCHAR(n)` and `CHAR(n)` become `TEXT`,
/// - `TINYINT` and `SMALLINT` become `INTEGER`,
/// - `ON DELETE`/`ON UPDATE` referential actions are removed entirely.
///
/// The removals are lossy: the discarded cascade and pattern-validation
/// semantics must be reproduced by the caller (the store crate's integrity
/// engine does exactly that). Text that is already clean passes through
/// unchanged, so the function is idempotent and safe to apply to bulk data
/// files as well as schema files.
///
/// # Examples
///
/// ```
/// let cleaned = labdb_dialect::translate(
///     "age TINYINT, name VARCHAR(50) NOT NULL, CHECK (age REGEXP '^[0-9]+$')",
/// );
/// assert_eq!(cleaned, "age INTEGER, name TEXT NOT NULL");
/// ```
pub fn translate(sql: &str) -> String {
    let sql = CHECK_REGEXP_RE.replace_all(sql, "");
    let sql = VARCHAR_RE.replace_all(&sql, "TEXT");
    let sql = CHAR_RE.replace_all(&sql, "TEXT");
    let sql = TINYINT_RE.replace_all(&sql, "INTEGER");
    let sql = SMALLINT_RE.replace_all(&sql, "INTEGER");
    REF_ACTION_RE.replace_all(&sql, "").into_owned()
}
