//! SQLite storage layer for the lab database.
//!
//! The lab schema is authored in a richer SQL dialect than SQLite accepts;
//! `labdb-dialect` translates it down, and this crate supplies everything
//! that translation throws away:
//!
//! - **`loader`** builds a fresh database file from schema and data
//!   sources (tables first, bulk data second, triggers last) and produces
//!   a [`LoadReport`] of what was created.
//! - **`integrity`** holds the application-level referential integrity: the
//!   cascading deletes and orphan cleanup the translated schema no longer
//!   declares natively, each executed inside one transaction.
//! - **`query`** exposes the boundary operations the console layer consumes:
//!   row lookup, generic insert/update/delete, and the transactional
//!   member/project/equipment operations.
//!
//! # Quick start
//!
//! ```no_run
//! use labdb_store::{LabQuery, LoadOptions, Loader};
//!
//! let loader = Loader::new(LoadOptions {
//!     db_path: "lab.db".into(),
//!     schema_path: "sql/schema.sql".into(),
//!     data_path: "sql/data.sql".into(),
//! });
//! let (conn, report) = loader.run().unwrap();
//! println!("created {} tables", report.tables_created.len());
//!
//! let query = LabQuery::new(&conn).unwrap();
//! query.delete_member("s002").unwrap();
//! ```

mod error;
pub mod integrity;
mod loader;
mod query;

pub use error::{Result, StoreError};
pub use integrity::{Field, MemberKind, NewMember};
pub use loader::{ItemFailure, LoadOptions, LoadReport, Loader, TableCount};
pub use query::{LabQuery, RowSnapshot};
