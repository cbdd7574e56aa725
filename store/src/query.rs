//! Boundary operations consumed by the console layer.
//!
//! Provides [`LabQuery`] for row lookup, generic insert/update/delete
//! pass-through, and the transactional wrappers around the integrity
//! engine's cascade operations. Table and column names arrive from user
//! input and are interpolated into SQL, so every identifier is validated
//! before use.
//!
//! # Example
//!
//! ```no_run
//! use labdb_store::LabQuery;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("lab.db").unwrap();
//! let query = LabQuery::new(&conn).unwrap();
//!
//! if let Some(row) = query.query_row("MEMBER", "memID", "f001").unwrap() {
//!     println!("{}", row.columns.join(" | "));
//! }
//! query.delete_member("s002").unwrap();
//! ```

use rusqlite::{Connection, params, types::Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::integrity::{self, Field, MemberKind, NewMember};

/// Validates that an identifier contains only alphanumeric characters and
/// underscores, and is non-empty.
pub(crate) fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(StoreError::InvalidIdentifier(identifier.to_string()));
    }
    if !identifier.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// A single fetched row, with values rendered as text.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    /// Table the row came from.
    pub table: String,
    /// Column names, in table order.
    pub columns: Vec<String>,
    /// Values aligned with `columns`; `None` is SQL NULL.
    pub values: Vec<Option<String>>,
    /// For MEMBER rows, the matching FACULTY/STUDENT/EXTCOLLAB row.
    pub subtype: Option<Box<RowSnapshot>>,
}

/// Query interface over an open lab database connection.
///
/// Generic CRUD goes straight through; deletes and inserts on MEMBER,
/// PROJECT, and EQUIPMENT route through the integrity engine instead,
/// each inside one transaction committed only when every step succeeded.
pub struct LabQuery<'a> {
    conn: &'a Connection,
}

impl<'a> LabQuery<'a> {
    /// Creates a query interface and enables foreign-key enforcement for
    /// the session.
    pub fn new(conn: &'a Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Fetches a single row by key column.
    ///
    /// Returns `None` when nothing matches. For the MEMBER table the
    /// matching subtype row is fetched as well; an unrecognized identifier
    /// prefix leaves `subtype` empty rather than failing the lookup.
    pub fn query_row(
        &self,
        table: &str,
        pk_column: &str,
        pk_value: &str,
    ) -> Result<Option<RowSnapshot>> {
        validate_identifier(table)?;
        validate_identifier(pk_column)?;

        let Some(mut snapshot) = self.fetch_row(table, pk_column, pk_value)? else {
            return Ok(None);
        };

        if table.eq_ignore_ascii_case("MEMBER") {
            let member_id = snapshot
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case("memID"))
                .and_then(|i| snapshot.values[i].clone());
            if let Some(member_id) = member_id {
                match MemberKind::from_member_id(&member_id) {
                    Some(kind) => {
                        snapshot.subtype = self
                            .fetch_row(kind.table(), "memID", &member_id)?
                            .map(Box::new);
                    }
                    None => debug!(member = %member_id, "unknown member prefix, no subtype row"),
                }
            }
        }

        Ok(Some(snapshot))
    }

    /// Inserts a row into an arbitrary table.
    ///
    /// Required columns (NOT NULL without a default) must carry a value;
    /// INTEGER primary keys are exempt, the engine assigns them.
    pub fn insert_generic(&self, table: &str, fields: &[Field]) -> Result<()> {
        validate_identifier(table)?;
        self.check_required(table, fields)?;

        let tx = self.conn.unchecked_transaction()?;
        integrity::insert_row(&tx, table, fields)?;
        tx.commit()?;
        Ok(())
    }

    /// Updates columns of a row identified by a key column. Returns the
    /// number of rows changed (0 when the key matched nothing, or when no
    /// updates were supplied).
    pub fn update_row(
        &self,
        table: &str,
        pk_column: &str,
        pk_value: &str,
        updates: &[Field],
    ) -> Result<usize> {
        validate_identifier(table)?;
        validate_identifier(pk_column)?;
        if updates.is_empty() {
            return Ok(0);
        }
        for field in updates {
            validate_identifier(&field.column)?;
        }

        let assignments: Vec<String> = updates
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ?{}", f.column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {table} SET {} WHERE {pk_column} = ?{}",
            assignments.join(", "),
            updates.len() + 1
        );

        let values = updates
            .iter()
            .map(|f| match &f.value {
                Some(text) => Value::Text(text.clone()),
                None => Value::Null,
            })
            .chain(std::iter::once(Value::Text(pk_value.to_string())));
        let changed = self.conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(changed)
    }

    /// Deletes a row without any cascade handling. Returns the number of
    /// rows removed.
    ///
    /// MEMBER, PROJECT, and EQUIPMENT rows should go through their
    /// dedicated cascade operations instead.
    pub fn delete_row(&self, table: &str, pk_column: &str, pk_value: &str) -> Result<usize> {
        validate_identifier(table)?;
        validate_identifier(pk_column)?;
        let deleted = self.conn.execute(
            &format!("DELETE FROM {table} WHERE {pk_column} = ?1"),
            params![pk_value],
        )?;
        Ok(deleted)
    }

    /// Deletes a member and cascades through its associations atomically.
    /// See [`integrity::delete_member`] for the step order.
    pub fn delete_member(&self, member_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        integrity::delete_member(&tx, member_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes a project atomically, removing grants left funding nothing.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        integrity::delete_project(&tx, project_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes equipment and its usage rows atomically.
    pub fn delete_equipment(&self, equipment_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        integrity::delete_equipment(&tx, equipment_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Inserts a member with its project assignments and subtype row as
    /// one atomic unit. See [`integrity::insert_member`].
    pub fn insert_member(&self, member: &NewMember) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        integrity::insert_member(&tx, member)?;
        tx.commit()?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn fetch_row(
        &self,
        table: &str,
        pk_column: &str,
        pk_value: &str,
    ) -> Result<Option<RowSnapshot>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} WHERE {pk_column} = ?1"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.query(params![pk_value])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value: Value = row.get(i)?;
            values.push(value_to_text(value));
        }

        Ok(Some(RowSnapshot {
            table: table.to_string(),
            columns,
            values,
            subtype: None,
        }))
    }

    /// Required-column validation for generic inserts, via the table's
    /// declared metadata.
    fn check_required(&self, table: &str, fields: &[Field]) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let infos: Vec<(String, String, bool, Option<String>, i64)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get("name")?,
                    row.get("type")?,
                    row.get("notnull")?,
                    row.get("dflt_value")?,
                    row.get("pk")?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        // table_info yields nothing for a table that does not exist.
        if infos.is_empty() {
            return Err(StoreError::RowNotFound {
                table: "sqlite_master".to_string(),
                column: "name".to_string(),
                value: table.to_string(),
            });
        }

        for (name, column_type, notnull, default, pk) in infos {
            // INTEGER primary keys alias the rowid; the engine fills them.
            if pk == 1 && column_type.eq_ignore_ascii_case("INTEGER") {
                continue;
            }
            if notnull && default.is_none() {
                let supplied = fields
                    .iter()
                    .any(|f| f.column.eq_ignore_ascii_case(&name) && f.value.is_some());
                if !supplied {
                    return Err(StoreError::MissingField {
                        table: table.to_string(),
                        column: name,
                    });
                }
            }
        }
        Ok(())
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(t) => Some(t),
        Value::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}
