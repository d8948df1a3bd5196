use rusqlite::Connection;

use crate::error::EvalResult;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn configure_connection(connection: &Connection) -> EvalResult<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> EvalResult<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS question_records (
          question_id TEXT PRIMARY KEY,
          question_title TEXT NOT NULL DEFAULT '',
          question_content TEXT,
          original_answer TEXT NOT NULL,
          llm_answer TEXT NOT NULL,
          metric_scores_json TEXT NOT NULL,
          composite_score REAL NOT NULL,
          quality_tier TEXT NOT NULL,
          access_count INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          update_seq INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_question_records_access
          ON question_records(access_count DESC, update_seq DESC);
        CREATE INDEX IF NOT EXISTS idx_question_records_tier
          ON question_records(quality_tier);
        CREATE INDEX IF NOT EXISTS idx_question_records_update_seq
          ON question_records(update_seq);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Stamps `db_updated_at`; called only alongside a record write.
pub fn touch_updated_at(connection: &Connection, now: &str) -> EvalResult<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;
    Ok(())
}

pub fn query_count(connection: &Connection, sql: &str) -> EvalResult<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
