//! Error types for lab database storage operations.
//!
//! Provides a unified error type covering engine access, load-time I/O,
//! and the business-rule validations enforced by the integrity engine.

use thiserror::Error;

/// Errors that can occur during storage operations.
///
/// Load-time per-item failures (a table or trigger the engine rejects, a
/// data statement that does not apply) are deliberately *not* errors; they
/// degrade gracefully and are recorded in the
/// [`LoadReport`](crate::LoadReport) instead. An `Err` from an integrity
/// operation always means the enclosing transaction was rolled back whole.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage engine failure (constraint, missing table, lock).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema or data source file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A table or column name contains characters unsafe to interpolate.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// Member identifier prefix maps to no known subtype.
    #[error("unknown member type for '{0}': identifier must start with 'f', 's', or 'e'")]
    UnknownMemberType(String),

    /// Faculty member currently leads at least one project.
    #[error("member '{0}' is leading a project; reassign leadership before deletion")]
    LeadershipConflict(String),

    /// Member insertion supplied zero project assignments.
    #[error("member '{0}' must be assigned to at least one project")]
    NoProjectAssignment(String),

    /// A required (NOT NULL, no default) column has no supplied value.
    #[error("required column '{column}' of table '{table}' has no value")]
    MissingField {
        /// Table being inserted into.
        table: String,
        /// Column that is missing a value.
        column: String,
    },

    /// The row an operation targets does not exist.
    #[error("no row in '{table}' where {column} = '{value}'")]
    RowNotFound {
        /// Table that was searched.
        table: String,
        /// Key column used for the lookup.
        column: String,
        /// Key value that matched nothing.
        value: String,
    },
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
