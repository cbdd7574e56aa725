//! Application-level referential integrity: manual cascade simulation.
//!
//! Dialect translation strips the `ON DELETE`/`ON UPDATE` actions the
//! original schema declared, so every cascading effect is reproduced here
//! explicitly. Each public function below is one ordered list of
//! sub-operations over an explicit [`Transaction`] handle; the caller
//! (normally [`LabQuery`](crate::LabQuery)) opens the transaction, invokes
//! the function, and commits only on success. A returned error at any step
//! rolls back every prior step in the same call, so a partially applied
//! cascade is never observable.

use rusqlite::{Transaction, params, types::Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::query::validate_identifier;

/// Member subtype, selected deterministically by the first character of
/// the member identifier.
///
/// Every MEMBER row has exactly one matching row in the subtype table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `f...` identifiers; rows in FACULTY.
    Faculty,
    /// `s...` identifiers; rows in STUDENT.
    Student,
    /// `e...` identifiers; rows in EXTCOLLAB.
    External,
}

impl MemberKind {
    /// Resolves the subtype from a member identifier prefix.
    pub fn from_member_id(member_id: &str) -> Option<Self> {
        match member_id.chars().next()?.to_ascii_lowercase() {
            'f' => Some(Self::Faculty),
            's' => Some(Self::Student),
            'e' => Some(Self::External),
            _ => None,
        }
    }

    /// Subtype table holding this kind's rows.
    pub fn table(self) -> &'static str {
        match self {
            Self::Faculty => "FACULTY",
            Self::Student => "STUDENT",
            Self::External => "EXTCOLLAB",
        }
    }
}

/// A column value supplied to an insert or update.
///
/// `None` stores SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub column: String,
    /// Value, or `None` for NULL.
    pub value: Option<String>,
}

impl Field {
    /// Convenience constructor.
    pub fn new(column: impl Into<String>, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Everything needed to insert a member: base row, project assignments,
/// and the subtype row's columns.
#[derive(Debug, Clone, Default)]
pub struct NewMember {
    /// MEMBER columns; must include `memID`.
    pub member_fields: Vec<Field>,
    /// Projects to assign via WORK_ON. Must be non-empty.
    pub projects: Vec<String>,
    /// Columns of the FACULTY/STUDENT/EXTCOLLAB row (without `memID`).
    pub subtype_fields: Vec<Field>,
}

/// Deletes a member and everything that hangs off it, in one pass.
///
/// Ordered sub-operations: WORK_ON rows, subtype resolution and
/// leadership check, the subtype row, mentor-reference nulling, USES and
/// AUTHORED_BY rows, the publication orphan sweep, and finally the MEMBER
/// row itself.
///
/// # Errors
///
/// - [`StoreError::UnknownMemberType`] when the identifier prefix maps to
///   no subtype.
/// - [`StoreError::LeadershipConflict`] when a faculty member still leads
///   a project; nothing anywhere is modified.
/// - [`StoreError::RowNotFound`] when no MEMBER row matches.
///
/// Any error leaves the database exactly as it was before the call once
/// the caller rolls back.
pub fn delete_member(tx: &Transaction<'_>, member_id: &str) -> Result<()> {
    tx.execute("DELETE FROM WORK_ON WHERE memID = ?1", params![member_id])?;

    let kind = MemberKind::from_member_id(member_id)
        .ok_or_else(|| StoreError::UnknownMemberType(member_id.to_string()))?;

    if kind == MemberKind::Faculty {
        let leading: i64 = tx.query_row(
            "SELECT COUNT(*) FROM PROJECT WHERE memID = ?1",
            params![member_id],
            |row| row.get(0),
        )?;
        if leading > 0 {
            return Err(StoreError::LeadershipConflict(member_id.to_string()));
        }
    }

    tx.execute(
        &format!("DELETE FROM {} WHERE memID = ?1", kind.table()),
        params![member_id],
    )?;

    tx.execute(
        "UPDATE MEMBER
         SET mentorID = NULL,
             mentorStartDate = NULL,
             mentorEndDate = NULL
         WHERE mentorID = ?1",
        params![member_id],
    )?;

    tx.execute("DELETE FROM USES WHERE memID = ?1", params![member_id])?;
    tx.execute(
        "DELETE FROM AUTHORED_BY WHERE memID = ?1",
        params![member_id],
    )?;

    // Orphan sweep: publications left with zero authors must not persist.
    let swept = tx.execute(
        "DELETE FROM PUBLICATION
         WHERE NOT EXISTS (
             SELECT 1 FROM AUTHORED_BY
             WHERE AUTHORED_BY.pubID = PUBLICATION.pubID
         )",
        [],
    )?;
    if swept > 0 {
        debug!(swept, "orphaned publications removed");
    }

    let deleted = tx.execute("DELETE FROM MEMBER WHERE memID = ?1", params![member_id])?;
    if deleted == 0 {
        return Err(StoreError::RowNotFound {
            table: "MEMBER".to_string(),
            column: "memID".to_string(),
            value: member_id.to_string(),
        });
    }

    Ok(())
}

/// Deletes a project, its assignments and funding links, and any grant
/// left funding nothing.
///
/// Affected grants are collected before their FUNDED_BY rows are removed,
/// then re-checked one by one: a grant shared with another project
/// survives, a grant exclusive to this project is deleted.
pub fn delete_project(tx: &Transaction<'_>, project_id: &str) -> Result<()> {
    tx.execute("DELETE FROM WORK_ON WHERE projID = ?1", params![project_id])?;

    let grants: Vec<String> = tx
        .prepare("SELECT DISTINCT grantID FROM FUNDED_BY WHERE projID = ?1")?
        .query_map(params![project_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;

    tx.execute(
        "DELETE FROM FUNDED_BY WHERE projID = ?1",
        params![project_id],
    )?;

    for grant_id in &grants {
        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM FUNDED_BY WHERE grantID = ?1",
            params![grant_id],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            debug!(grant = %grant_id, "deleting grant with no funded projects");
            tx.execute("DELETE FROM GRANT WHERE grantID = ?1", params![grant_id])?;
        }
    }

    let deleted = tx.execute("DELETE FROM PROJECT WHERE projID = ?1", params![project_id])?;
    if deleted == 0 {
        return Err(StoreError::RowNotFound {
            table: "PROJECT".to_string(),
            column: "projID".to_string(),
            value: project_id.to_string(),
        });
    }

    Ok(())
}

/// Deletes a piece of equipment and its usage records.
pub fn delete_equipment(tx: &Transaction<'_>, equipment_id: &str) -> Result<()> {
    tx.execute("DELETE FROM USES WHERE equipID = ?1", params![equipment_id])?;

    let deleted = tx.execute(
        "DELETE FROM EQUIPMENT WHERE equipID = ?1",
        params![equipment_id],
    )?;
    if deleted == 0 {
        return Err(StoreError::RowNotFound {
            table: "EQUIPMENT".to_string(),
            column: "equipID".to_string(),
            value: equipment_id.to_string(),
        });
    }

    Ok(())
}

/// Inserts a member as one atomic unit: base row, project assignments,
/// then the subtype row.
///
/// Every failure path rolls the whole insert back; a MEMBER row without
/// its subtype row, or without at least one WORK_ON row, is never
/// committed.
///
/// # Errors
///
/// - [`StoreError::MissingField`] when `memID` is absent from
///   `member_fields`, or a required subtype column has no value.
/// - [`StoreError::NoProjectAssignment`] when zero projects are supplied.
/// - [`StoreError::UnknownMemberType`] when the identifier prefix maps to
///   no subtype.
pub fn insert_member(tx: &Transaction<'_>, member: &NewMember) -> Result<()> {
    let member_id = member
        .member_fields
        .iter()
        .find(|f| f.column.eq_ignore_ascii_case("memID"))
        .and_then(|f| f.value.clone())
        .ok_or_else(|| StoreError::MissingField {
            table: "MEMBER".to_string(),
            column: "memID".to_string(),
        })?;

    insert_row(tx, "MEMBER", &member.member_fields)?;

    if member.projects.is_empty() {
        return Err(StoreError::NoProjectAssignment(member_id));
    }
    for project_id in &member.projects {
        tx.execute(
            "INSERT INTO WORK_ON (memID, projID) VALUES (?1, ?2)",
            params![member_id, project_id],
        )?;
    }

    let kind = MemberKind::from_member_id(&member_id)
        .ok_or_else(|| StoreError::UnknownMemberType(member_id.clone()))?;

    check_required_columns(tx, kind.table(), &member.subtype_fields)?;

    let mut subtype_fields = vec![Field::new("memID", Some(member_id))];
    subtype_fields.extend(
        member
            .subtype_fields
            .iter()
            .filter(|f| !f.column.eq_ignore_ascii_case("memID"))
            .cloned(),
    );
    insert_row(tx, kind.table(), &subtype_fields)?;

    Ok(())
}

/// Builds and executes a parameterized `INSERT` from the given fields.
/// Identifiers are validated before interpolation.
pub(crate) fn insert_row(tx: &Transaction<'_>, table: &str, fields: &[Field]) -> Result<()> {
    validate_identifier(table)?;
    for field in fields {
        validate_identifier(&field.column)?;
    }

    let columns: Vec<&str> = fields.iter().map(|f| f.column.as_str()).collect();
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let values = fields.iter().map(|f| match &f.value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    });
    tx.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(())
}

/// Verifies that every NOT NULL column of `table` without a default (and
/// outside the `memID` key, which the caller always supplies) has a
/// non-NULL value among `fields`.
fn check_required_columns(tx: &Transaction<'_>, table: &str, fields: &[Field]) -> Result<()> {
    validate_identifier(table)?;
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({table})"))?;
    let required: Vec<String> = stmt
        .query_map([], |row| {
            let name: String = row.get("name")?;
            let notnull: bool = row.get("notnull")?;
            let default: Option<String> = row.get("dflt_value")?;
            Ok((name, notnull, default))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(name, notnull, default)| {
            *notnull && default.is_none() && !name.eq_ignore_ascii_case("memID")
        })
        .map(|(name, _, _)| name)
        .collect();

    for column in required {
        let supplied = fields
            .iter()
            .any(|f| f.column.eq_ignore_ascii_case(&column) && f.value.is_some());
        if !supplied {
            return Err(StoreError::MissingField {
                table: table.to_string(),
                column,
            });
        }
    }
    Ok(())
}
