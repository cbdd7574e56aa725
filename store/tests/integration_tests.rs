//! Integration tests for the labdb-store crate: full loads from the real
//! schema/data sources, followed by integrity-engine operations.

use std::fs;

use labdb_store::{Field, LabQuery, LoadOptions, LoadReport, Loader, NewMember, StoreError};
use rusqlite::Connection;
use tempfile::TempDir;

const SCHEMA: &str = include_str!("../../sql/schema.sql");
const DATA: &str = include_str!("../../sql/data.sql");

/// Writes the fixture sources into a temp dir and runs a full load.
fn load_fixture() -> (Connection, LoadReport, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.sql");
    let data_path = dir.path().join("data.sql");
    fs::write(&schema_path, SCHEMA).unwrap();
    fs::write(&data_path, DATA).unwrap();

    let loader = Loader::new(LoadOptions {
        db_path: dir.path().join("lab.db"),
        schema_path,
        data_path,
    });
    let (conn, report) = loader.run().unwrap();
    (conn, report, dir)
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn count_where(conn: &Connection, table: &str, column: &str, value: &str) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
        [value],
        |row| row.get(0),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[test]
fn test_load_creates_all_tables() {
    let (_conn, report, _dir) = load_fixture();
    assert_eq!(report.tables_created.len(), 12);
    assert!(report.table_failures.is_empty());
    assert_eq!(report.tables_created[0], "MEMBER");
    assert!(report.tables_created.iter().any(|t| t == "GRANT"));
    assert!(report.tables_created.iter().any(|t| t == "AUTHORED_BY"));
}

#[test]
fn test_load_executes_insert_and_update_statements_only() {
    let (conn, report, _dir) = load_fixture();
    // 28 INSERTs + 2 UPDATEs apply; the trailing SELECT is skipped.
    assert_eq!(report.statements_executed, 30);
    assert_eq!(report.statements_skipped, 1);
    assert_eq!(count(&conn, "MEMBER"), 4);
    assert_eq!(count(&conn, "WORK_ON"), 4);

    let mentor: Option<String> = conn
        .query_row(
            "SELECT mentorID FROM MEMBER WHERE memID = 's002'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(mentor.as_deref(), Some("f001"));
}

#[test]
fn test_load_reports_row_counts_for_created_tables() {
    let (_conn, report, _dir) = load_fixture();
    let members = report
        .row_counts
        .iter()
        .find(|c| c.table == "MEMBER")
        .unwrap();
    assert_eq!(members.rows, 4);
    let grants = report
        .row_counts
        .iter()
        .find(|c| c.table == "GRANT")
        .unwrap();
    assert_eq!(grants.rows, 2);
}

#[test]
fn test_load_installs_triggers_after_data() {
    let (conn, report, _dir) = load_fixture();
    assert_eq!(
        report.triggers_installed,
        vec!["trg_publication_touch", "trg_grant_amount_guard"]
    );
    assert!(report.trigger_failures.is_empty());

    // Seed AUTHORED_BY rows predate trigger installation, so the touch
    // column is still NULL.
    let touched: Option<String> = conn
        .query_row(
            "SELECT lastAuthoredDate FROM PUBLICATION WHERE pubID = 'PUB2'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(touched, None);

    // A post-load insert fires it.
    conn.execute(
        "INSERT INTO AUTHORED_BY (memID, pubID) VALUES ('e004', 'PUB2')",
        [],
    )
    .unwrap();
    let touched: Option<String> = conn
        .query_row(
            "SELECT lastAuthoredDate FROM PUBLICATION WHERE pubID = 'PUB2'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(touched.is_some());
}

#[test]
fn test_load_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.sql");
    let data_path = dir.path().join("data.sql");
    fs::write(&schema_path, SCHEMA).unwrap();
    fs::write(&data_path, DATA).unwrap();
    let loader = Loader::new(LoadOptions {
        db_path: dir.path().join("lab.db"),
        schema_path,
        data_path,
    });

    let (conn1, first) = loader.run().unwrap();
    drop(conn1);
    let (_conn2, second) = loader.run().unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn test_load_fails_fast_on_missing_schema_source() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("data.sql");
    fs::write(&data_path, DATA).unwrap();
    let loader = Loader::new(LoadOptions {
        db_path: dir.path().join("lab.db"),
        schema_path: dir.path().join("missing.sql"),
        data_path,
    });
    assert!(matches!(loader.run(), Err(StoreError::Io(_))));
}

#[test]
fn test_load_tolerates_rejected_table() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.sql");
    let data_path = dir.path().join("data.sql");
    // Second table is malformed; first and third must still be created.
    fs::write(
        &schema_path,
        "CREATE TABLE A (x VARCHAR(4));\n\
         CREATE TABLE B (NOT VALID SQL AT ALL);\n\
         CREATE TABLE C (y TINYINT);\n",
    )
    .unwrap();
    fs::write(&data_path, "INSERT INTO A (x) VALUES ('v');\n").unwrap();
    let loader = Loader::new(LoadOptions {
        db_path: dir.path().join("lab.db"),
        schema_path,
        data_path,
    });
    let (conn, report) = loader.run().unwrap();
    assert_eq!(report.tables_created, vec!["A", "C"]);
    assert_eq!(report.table_failures.len(), 1);
    assert_eq!(report.table_failures[0].name, "B");
    assert_eq!(count(&conn, "A"), 1);
}

// ---------------------------------------------------------------------------
// Integrity engine: deletes
// ---------------------------------------------------------------------------

#[test]
fn test_delete_member_leadership_conflict_changes_nothing() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let err = query.delete_member("f001").unwrap_err();
    assert!(matches!(err, StoreError::LeadershipConflict(_)));

    assert_eq!(count(&conn, "MEMBER"), 4);
    assert_eq!(count(&conn, "PROJECT"), 2);
    assert_eq!(count(&conn, "WORK_ON"), 4);
    assert_eq!(count(&conn, "FACULTY"), 1);
}

#[test]
fn test_delete_member_cascades_and_sweeps_orphan_publication() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    // s002: one WORK_ON row (P2), sole author of PUB1.
    query.delete_member("s002").unwrap();

    assert_eq!(count_where(&conn, "WORK_ON", "memID", "s002"), 0);
    assert_eq!(count_where(&conn, "STUDENT", "memID", "s002"), 0);
    assert_eq!(count_where(&conn, "MEMBER", "memID", "s002"), 0);
    assert_eq!(count_where(&conn, "PUBLICATION", "pubID", "PUB1"), 0);
    // PUB2 still has authors, so it survives.
    assert_eq!(count_where(&conn, "PUBLICATION", "pubID", "PUB2"), 1);
}

#[test]
fn test_delete_member_clears_mentor_references() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    conn.execute(
        "UPDATE MEMBER SET mentorID = 's003', mentorStartDate = '2024-04-01',
         mentorEndDate = '2024-12-31' WHERE memID = 'e004'",
        [],
    )
    .unwrap();

    query.delete_member("s003").unwrap();

    let (mentor, start, end): (Option<String>, Option<String>, Option<String>) = conn
        .query_row(
            "SELECT mentorID, mentorStartDate, mentorEndDate FROM MEMBER WHERE memID = 'e004'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(mentor, None);
    assert_eq!(start, None);
    assert_eq!(end, None);

    // s003's equipment usage went with it; PUB2 keeps its other author.
    assert_eq!(count_where(&conn, "USES", "memID", "s003"), 0);
    assert_eq!(count_where(&conn, "PUBLICATION", "pubID", "PUB2"), 1);
}

#[test]
fn test_delete_member_unknown_prefix() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    let err = query.delete_member("x123").unwrap_err();
    assert!(matches!(err, StoreError::UnknownMemberType(_)));
    assert_eq!(count(&conn, "MEMBER"), 4);
}

#[test]
fn test_delete_member_not_found_rolls_back() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    let err = query.delete_member("s999").unwrap_err();
    assert!(matches!(err, StoreError::RowNotFound { .. }));
    assert_eq!(count(&conn, "WORK_ON"), 4);
}

#[test]
fn test_delete_project_removes_exclusively_funding_grant() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    // G1 funds only P1; G2 funds P1 and P2.
    query.delete_project("P1").unwrap();

    assert_eq!(count_where(&conn, "PROJECT", "projID", "P1"), 0);
    assert_eq!(count_where(&conn, "WORK_ON", "projID", "P1"), 0);
    assert_eq!(count_where(&conn, "GRANT", "grantID", "G1"), 0);
    assert_eq!(count_where(&conn, "GRANT", "grantID", "G2"), 1);
}

#[test]
fn test_delete_project_keeps_grant_shared_with_other_projects() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    query.delete_project("P2").unwrap();

    assert_eq!(count_where(&conn, "GRANT", "grantID", "G2"), 1);
    assert_eq!(count_where(&conn, "GRANT", "grantID", "G1"), 1);
    assert_eq!(count_where(&conn, "FUNDED_BY", "projID", "P2"), 0);
}

#[test]
fn test_delete_equipment_removes_usage_rows() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    query.delete_equipment("E2").unwrap();

    assert_eq!(count_where(&conn, "USES", "equipID", "E2"), 0);
    assert_eq!(count(&conn, "EQUIPMENT"), 1);
}

// ---------------------------------------------------------------------------
// Integrity engine: member insertion
// ---------------------------------------------------------------------------

fn new_student(member_id: &str, projects: &[&str]) -> NewMember {
    NewMember {
        member_fields: vec![
            Field::new("memID", Some(member_id.to_string())),
            Field::new("fName", Some("Ada".to_string())),
            Field::new("lName", Some("Lovelace".to_string())),
        ],
        projects: projects.iter().map(|p| p.to_string()).collect(),
        subtype_fields: vec![
            Field::new("major", Some("Computer Science".to_string())),
            Field::new("degreeProgram", Some("PhD".to_string())),
        ],
    }
}

#[test]
fn test_insert_member_succeeds_with_assignments_and_subtype() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    query.insert_member(&new_student("s010", &["P1", "P2"])).unwrap();

    assert_eq!(count_where(&conn, "MEMBER", "memID", "s010"), 1);
    assert_eq!(count_where(&conn, "STUDENT", "memID", "s010"), 1);
    assert_eq!(count_where(&conn, "WORK_ON", "memID", "s010"), 2);
}

#[test]
fn test_insert_member_zero_projects_fully_rolls_back() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    let before = count(&conn, "MEMBER");

    let err = query.insert_member(&new_student("s011", &[])).unwrap_err();
    assert!(matches!(err, StoreError::NoProjectAssignment(_)));
    assert_eq!(count(&conn, "MEMBER"), before);
}

#[test]
fn test_insert_member_missing_subtype_field_fully_rolls_back() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let mut member = new_student("s012", &["P1"]);
    member.subtype_fields.retain(|f| f.column != "major");

    let err = query.insert_member(&member).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingField { ref table, ref column }
            if table == "STUDENT" && column == "major"
    ));
    // Base row and project assignments are undone too, not just the
    // subtype step.
    assert_eq!(count_where(&conn, "MEMBER", "memID", "s012"), 0);
    assert_eq!(count_where(&conn, "WORK_ON", "memID", "s012"), 0);
}

#[test]
fn test_insert_member_unknown_prefix_rolls_back() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let err = query.insert_member(&new_student("x013", &["P1"])).unwrap_err();
    assert!(matches!(err, StoreError::UnknownMemberType(_)));
    assert_eq!(count_where(&conn, "MEMBER", "memID", "x013"), 0);
    assert_eq!(count_where(&conn, "WORK_ON", "memID", "x013"), 0);
}

// ---------------------------------------------------------------------------
// Boundary CRUD
// ---------------------------------------------------------------------------

#[test]
fn test_query_row_member_includes_subtype() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let row = query.query_row("MEMBER", "memID", "f001").unwrap().unwrap();
    assert_eq!(row.table, "MEMBER");
    let age_index = row.columns.iter().position(|c| c == "age").unwrap();
    assert_eq!(row.values[age_index].as_deref(), Some("58"));

    let subtype = row.subtype.unwrap();
    assert_eq!(subtype.table, "FACULTY");
    let rank_index = subtype.columns.iter().position(|c| c == "rank").unwrap();
    assert_eq!(subtype.values[rank_index].as_deref(), Some("Professor"));
}

#[test]
fn test_query_row_no_match_returns_none() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    assert!(query.query_row("MEMBER", "memID", "f999").unwrap().is_none());
}

#[test]
fn test_query_row_rejects_invalid_identifier() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    let err = query
        .query_row("MEMBER; DROP TABLE MEMBER", "memID", "f001")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
}

#[test]
fn test_update_row_reports_changed_count() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let changed = query
        .update_row(
            "EQUIPMENT",
            "equipID",
            "E1",
            &[Field::new("status", Some("retired".to_string()))],
        )
        .unwrap();
    assert_eq!(changed, 1);

    let status: String = conn
        .query_row(
            "SELECT status FROM EQUIPMENT WHERE equipID = 'E1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(status, "retired");

    let missed = query
        .update_row(
            "EQUIPMENT",
            "equipID",
            "E9",
            &[Field::new("status", Some("retired".to_string()))],
        )
        .unwrap();
    assert_eq!(missed, 0);
}

#[test]
fn test_delete_row_passthrough() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();
    assert_eq!(query.delete_row("USES", "memID", "s003").unwrap(), 1);
    assert_eq!(query.delete_row("USES", "memID", "s003").unwrap(), 0);
}

#[test]
fn test_insert_generic_requires_not_null_columns() {
    let (conn, _report, _dir) = load_fixture();
    let query = LabQuery::new(&conn).unwrap();

    let err = query
        .insert_generic(
            "EQUIPMENT",
            &[
                Field::new("equipID", Some("E3".to_string())),
                Field::new("equipName", Some("Oscilloscope".to_string())),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingField { ref column, .. } if column == "status"
    ));

    query
        .insert_generic(
            "EQUIPMENT",
            &[
                Field::new("equipID", Some("E3".to_string())),
                Field::new("equipName", Some("Oscilloscope".to_string())),
                Field::new("status", Some("available".to_string())),
            ],
        )
        .unwrap();
    assert_eq!(count_where(&conn, "EQUIPMENT", "equipID", "E3"), 1);
}
