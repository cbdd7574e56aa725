//! SQL dialect translation for the lab database.
//!
//! The lab schema is authored in a richer SQL dialect than SQLite accepts:
//! regex-based `CHECK (col REGEXP '...')` constraints, sized character types
//! (`VARCHAR(n)`, `CHAR(n)`), small integer types (`TINYINT`, `SMALLINT`),
//! native `ON DELETE`/`ON UPDATE` referential actions, and `CREATE TRIGGER`
//! blocks. This crate performs the pure text transforms that bridge the gap:
//!
//! - **`rewrite`** strips and normalizes the unsupported constructs,
//!   producing DDL the target engine accepts.
//! - **`extract`** pulls trigger and `CREATE TABLE` definitions out of
//!   schema text, and splits bulk data text into candidate statements.
//!
//! The rewrite is lossy: referential actions and pattern
//! validation are discarded here and re-implemented at the application
//! layer by the `labdb-store` integrity engine.
//!
//! This is not a SQL parser. Only the fixed set of constructs above is
//! understood; everything else passes through untouched.

mod extract;
mod rewrite;

pub use extract::{TableDef, TriggerDef, extract_tables, extract_triggers, split_statements};
pub use rewrite::translate;
