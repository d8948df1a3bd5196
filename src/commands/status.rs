use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::storage::{DB_SCHEMA_VERSION, query_count};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = &args.db_path;
    info!(db_path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let schema_version = read_metadata(&conn, "db_schema_version")?;
    let updated_at = read_metadata(&conn, "db_updated_at")?;
    match schema_version.as_deref() {
        Some(DB_SCHEMA_VERSION) => {}
        Some(found) => warn!(
            found = %found,
            expected = DB_SCHEMA_VERSION,
            "database schema version differs from this build"
        ),
        None => warn!("database has no schema version recorded"),
    }

    let records = query_count(&conn, "SELECT COUNT(*) FROM question_records").unwrap_or(0);
    let accesses = query_count(
        &conn,
        "SELECT COALESCE(SUM(access_count), 0) FROM question_records",
    )
    .unwrap_or(0);

    info!(
        path = %db_path.display(),
        schema_version = %schema_version.unwrap_or_default(),
        updated_at = %updated_at.unwrap_or_default(),
        records,
        accesses,
        "database status"
    );
    drop(conn);

    if let Some(question_id) = &args.question_id {
        let store = super::open_store_read_only(db_path)?;
        let record = store
            .get_record(question_id)
            .with_context(|| format!("failed to look up question {question_id}"))?;
        super::print_json(&record)?;
    }

    Ok(())
}

fn read_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))?;
    Ok(value)
}
