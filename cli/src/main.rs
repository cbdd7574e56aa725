use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use labdb_store::{Field, LabQuery, LoadOptions, LoadReport, Loader, NewMember, RowSnapshot};
use tracing::Level;

/// Output format for the load report.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "labdb")]
#[command(about = "Research lab database console")]
#[command(version)]
struct Cli {
    /// Log verbosity: debug, info, warn, or error.
    #[arg(long, default_value = "warn", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the database from schema and data sources.
    Load(LoadArgs),
    /// Look up a single row by key column.
    Query(QueryArgs),
    /// Insert a row into an arbitrary table.
    Insert(InsertArgs),
    /// Update columns of a row identified by a key column.
    Update(UpdateArgs),
    /// Delete a row with no cascade handling.
    DeleteRow(DeleteRowArgs),
    /// Insert a member with project assignments and its subtype record.
    InsertMember(InsertMemberArgs),
    /// Delete a member, cascading through its associations.
    DeleteMember(CascadeDeleteArgs),
    /// Delete a project, removing grants left funding nothing.
    DeleteProject(CascadeDeleteArgs),
    /// Delete equipment and its usage records.
    DeleteEquipment(CascadeDeleteArgs),
}

#[derive(Debug, Args)]
struct LoadArgs {
    /// Database file to (re)create.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Extended-dialect schema source.
    #[arg(long, default_value = "sql/schema.sql")]
    schema: PathBuf,
    /// Bulk data source.
    #[arg(long, default_value = "sql/data.sql")]
    data: PathBuf,
    /// Report output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Table to query.
    #[arg(long)]
    table: String,
    /// Key column.
    #[arg(long)]
    column: String,
    /// Key value.
    #[arg(long)]
    value: String,
}

#[derive(Debug, Args)]
struct InsertArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Table to insert into.
    #[arg(long)]
    table: String,
    /// Column values as column=value (repeatable; `column=` stores NULL).
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<Field>,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Table to update.
    #[arg(long)]
    table: String,
    /// Key column identifying the row.
    #[arg(long)]
    column: String,
    /// Key value identifying the row.
    #[arg(long)]
    value: String,
    /// Column updates as column=value (repeatable).
    #[arg(long = "set", value_parser = parse_field, required = true)]
    updates: Vec<Field>,
}

#[derive(Debug, Args)]
struct DeleteRowArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Table to delete from.
    #[arg(long)]
    table: String,
    /// Key column.
    #[arg(long)]
    column: String,
    /// Key value.
    #[arg(long)]
    value: String,
}

#[derive(Debug, Args)]
struct InsertMemberArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// MEMBER column values as column=value; must include memID.
    #[arg(long = "field", value_parser = parse_field, required = true)]
    fields: Vec<Field>,
    /// Project to assign (repeatable; at least one is required).
    #[arg(long = "project")]
    projects: Vec<String>,
    /// Subtype (FACULTY/STUDENT/EXTCOLLAB) column values as column=value.
    #[arg(long = "subtype-field", value_parser = parse_field)]
    subtype_fields: Vec<Field>,
}

#[derive(Debug, Args)]
struct CascadeDeleteArgs {
    /// Database file path.
    #[arg(long, default_value = "lab.db")]
    db: PathBuf,
    /// Identifier of the row to delete.
    id: String,
}

/// Parses a `column=value` argument; `column=` stores NULL.
fn parse_field(raw: &str) -> Result<Field, String> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected column=value, got '{raw}'"))?;
    if column.is_empty() {
        return Err(format!("empty column name in '{raw}'"));
    }
    let value = if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    };
    Ok(Field::new(column, value))
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.verbosity) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Load(args) => run_load(args),
        Command::Query(args) => run_query(args),
        Command::Insert(args) => run_insert(args),
        Command::Update(args) => run_update(args),
        Command::DeleteRow(args) => run_delete_row(args),
        Command::InsertMember(args) => run_insert_member(args),
        Command::DeleteMember(args) => run_delete_member(args),
        Command::DeleteProject(args) => run_delete_project(args),
        Command::DeleteEquipment(args) => run_delete_equipment(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbosity: &str) -> Result<(), String> {
    let level = match verbosity {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("invalid verbosity '{other}'")),
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
    Ok(())
}

fn run_load(args: LoadArgs) -> Result<(), String> {
    let loader = Loader::new(LoadOptions {
        db_path: args.db.clone(),
        schema_path: args.schema,
        data_path: args.data,
    });
    let (_conn, report) = loader.run().map_err(|e| format!("load failed: {e}"))?;

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("failed to serialize report: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Text => print_report(&args.db, &report),
    }
    Ok(())
}

fn print_report(db: &Path, report: &LoadReport) {
    println!("Load complete: {}", db.display());
    println!(
        "  Tables created: {} ({} failed)",
        report.tables_created.len(),
        report.table_failures.len()
    );
    for failure in &report.table_failures {
        println!("    FAIL {}: {}", failure.name, failure.reason);
    }
    println!(
        "  Statements executed: {} ({} skipped)",
        report.statements_executed, report.statements_skipped
    );
    println!(
        "  Triggers installed: {} ({} failed)",
        report.triggers_installed.len(),
        report.trigger_failures.len()
    );
    for failure in &report.trigger_failures {
        println!("    FAIL {}: {}", failure.name, failure.reason);
    }
    println!("  Row counts:");
    for count in &report.row_counts {
        println!("    {:<16} {:>4}", count.table, count.rows);
    }
}

fn run_query(args: QueryArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    match query
        .query_row(&args.table, &args.column, &args.value)
        .map_err(|e| e.to_string())?
    {
        Some(row) => print_row(&row),
        None => println!("No matching record found."),
    }
    Ok(())
}

fn print_row(row: &RowSnapshot) {
    println!("{}", row.columns.join(" | "));
    println!("{}", "-".repeat(50));
    let rendered: Vec<&str> = row
        .values
        .iter()
        .map(|v| v.as_deref().unwrap_or("NULL"))
        .collect();
    println!("{}", rendered.join(" | "));
    if let Some(subtype) = &row.subtype {
        println!("--- {} ---", subtype.table);
        print_row(subtype);
    }
}

fn run_insert(args: InsertArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    query
        .insert_generic(&args.table, &args.fields)
        .map_err(|e| e.to_string())?;
    println!("Inserted into {}.", args.table);
    Ok(())
}

fn run_update(args: UpdateArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    let changed = query
        .update_row(&args.table, &args.column, &args.value, &args.updates)
        .map_err(|e| e.to_string())?;
    if changed == 0 {
        println!("No record updated (key not found).");
    } else {
        println!("Record updated successfully.");
    }
    Ok(())
}

fn run_delete_row(args: DeleteRowArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    let deleted = query
        .delete_row(&args.table, &args.column, &args.value)
        .map_err(|e| e.to_string())?;
    if deleted == 0 {
        println!("No record deleted (key not found).");
    } else {
        println!("Record deleted successfully.");
    }
    Ok(())
}

fn run_insert_member(args: InsertMemberArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    let member = NewMember {
        member_fields: args.fields,
        projects: args.projects,
        subtype_fields: args.subtype_fields,
    };
    query.insert_member(&member).map_err(|e| e.to_string())?;
    println!(
        "Member inserted with {} project assignment(s).",
        member.projects.len()
    );
    Ok(())
}

fn run_delete_member(args: CascadeDeleteArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    query.delete_member(&args.id).map_err(|e| e.to_string())?;
    println!("Member {} deleted.", args.id);
    Ok(())
}

fn run_delete_project(args: CascadeDeleteArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    query.delete_project(&args.id).map_err(|e| e.to_string())?;
    println!("Project {} deleted.", args.id);
    Ok(())
}

fn run_delete_equipment(args: CascadeDeleteArgs) -> Result<(), String> {
    let conn = open_existing(&args.db)?;
    let query = LabQuery::new(&conn).map_err(|e| e.to_string())?;
    query.delete_equipment(&args.id).map_err(|e| e.to_string())?;
    println!("Equipment {} deleted.", args.id);
    Ok(())
}

/// Opens an existing database file, refusing to create an empty one.
fn open_existing(path: &Path) -> Result<rusqlite::Connection, String> {
    if !path.exists() {
        return Err(format!(
            "database file '{}' not found; run `labdb load` first",
            path.display()
        ));
    }
    rusqlite::Connection::open(path)
        .map_err(|e| format!("failed to open database '{}': {e}", path.display()))
}
