//! Load orchestration: fresh database builds from dialect-translated
//! schema and data sources.
//!
//! A load is a full rebuild, not an incremental migration: any existing
//! database file is discarded first, so re-running the loader against the
//! same sources always yields the same report. Tables are created before
//! data is inserted, and triggers are installed only after both; a trigger
//! installed earlier could fire on the very statements being seeded.
//!
//! Per-item failures (a rejected table, a data statement that does not
//! apply, a trigger the engine refuses) degrade gracefully: they are logged,
//! counted in the [`LoadReport`], and never abort the remaining work. Only
//! an unreadable source file fails the load as a whole.
//!
//! # Example
//!
//! ```no_run
//! use labdb_store::{LoadOptions, Loader};
//!
//! let loader = Loader::new(LoadOptions {
//!     db_path: "lab.db".into(),
//!     schema_path: "sql/schema.sql".into(),
//!     data_path: "sql/data.sql".into(),
//! });
//! let (conn, report) = loader.run().unwrap();
//! println!("{} tables, {} statements", report.tables_created.len(), report.statements_executed);
//! # drop(conn);
//! ```

use std::fs;
use std::path::PathBuf;

use labdb_dialect::{extract_tables, extract_triggers, split_statements, translate};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;

/// File locations for a database load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// SQLite database file to (re)create.
    pub db_path: PathBuf,
    /// Extended-dialect schema source.
    pub schema_path: PathBuf,
    /// Bulk data source (INSERT/UPDATE statements).
    pub data_path: PathBuf,
}

/// A per-item load failure, kept for the report rather than raised.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Name of the table or trigger that failed.
    pub name: String,
    /// Engine error text.
    pub reason: String,
}

/// Row count of one created table after data loading.
#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    /// Table name.
    pub table: String,
    /// Number of rows present after the load.
    pub rows: u64,
}

/// Summary of a completed load, consumed by the reporting layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Tables created, in source order.
    pub tables_created: Vec<String>,
    /// Tables the engine rejected.
    pub table_failures: Vec<ItemFailure>,
    /// Per-table row counts after data loading.
    pub row_counts: Vec<TableCount>,
    /// Data statements that applied.
    pub statements_executed: usize,
    /// Data statements skipped (wrong kind or engine rejection).
    pub statements_skipped: usize,
    /// Triggers installed, in source order.
    pub triggers_installed: Vec<String>,
    /// Triggers the engine rejected.
    pub trigger_failures: Vec<ItemFailure>,
}

/// Orchestrates a fresh database build from schema and data sources.
pub struct Loader {
    options: LoadOptions,
}

impl Loader {
    /// Creates a loader for the given file locations.
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Runs the load end to end and returns the open connection plus a
    /// report of what was built.
    ///
    /// Sequence: destroy any existing database file, extract triggers from
    /// the raw schema, translate and create tables with foreign keys off,
    /// translate and apply the bulk data, re-enable foreign keys, then
    /// install the held-back triggers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`](crate::StoreError::Io) if a source file
    /// cannot be read, or [`StoreError::Database`](crate::StoreError::Database)
    /// if the database file itself cannot be opened. Per-table, per-statement,
    /// and per-trigger failures are recorded in the report, not raised.
    pub fn run(&self) -> Result<(Connection, LoadReport)> {
        if self.options.db_path.exists() {
            info!(db = %self.options.db_path.display(), "removing existing database file");
            fs::remove_file(&self.options.db_path)?;
        }

        let schema = fs::read_to_string(&self.options.schema_path)?;

        // Triggers come from the raw text; they are installed last, after
        // both tables and data exist.
        let triggers = extract_triggers(&schema);
        debug!(count = triggers.len(), "extracted triggers");

        let cleaned = translate(&schema);
        let tables = extract_tables(&cleaned);
        debug!(count = tables.len(), "extracted table definitions");

        let conn = Connection::open(&self.options.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        let mut report = LoadReport::default();

        for table in &tables {
            match conn.execute_batch(&table.sql) {
                Ok(()) => {
                    info!(table = %table.name, "created table");
                    report.tables_created.push(table.name.clone());
                }
                Err(e) => {
                    warn!(table = %table.name, error = %e, "table creation failed");
                    report.table_failures.push(ItemFailure {
                        name: table.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let data = fs::read_to_string(&self.options.data_path)?;
        let data = translate(&data);

        for statement in split_statements(&data) {
            if !is_data_statement(statement) {
                report.statements_skipped += 1;
                continue;
            }
            match conn.execute(statement, []) {
                Ok(_) => report.statements_executed += 1,
                Err(e) => {
                    debug!(error = %e, "data statement skipped");
                    report.statements_skipped += 1;
                }
            }
        }
        info!(
            executed = report.statements_executed,
            skipped = report.statements_skipped,
            "data loading complete"
        );

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        for trigger in &triggers {
            match conn.execute_batch(&trigger.sql) {
                Ok(()) => {
                    info!(trigger = %trigger.name, "installed trigger");
                    report.triggers_installed.push(trigger.name.clone());
                }
                Err(e) => {
                    warn!(trigger = %trigger.name, error = %e, "trigger installation failed");
                    report.trigger_failures.push(ItemFailure {
                        name: trigger.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        for table in &report.tables_created {
            let rows: u64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            report.row_counts.push(TableCount {
                table: table.clone(),
                rows,
            });
        }

        Ok((conn, report))
    }
}

/// Returns `true` for statements the data-loading phase executes:
/// those beginning with `INSERT` or `UPDATE`, case-insensitive.
fn is_data_statement(statement: &str) -> bool {
    let head: String = statement
        .trim_start()
        .chars()
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();
    head == "INSERT" || head == "UPDATE"
}
