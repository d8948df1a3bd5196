//! Durable question records keyed by `question_id`.
//!
//! `store` and `export` report failure through their return value and [`RecordStore::last_error`]
//! so callers looping over large inputs can keep going; the `try_*` variants return the typed
//! error instead.

mod db_setup;
pub mod export;

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::{debug, warn};

use crate::error::{EvalError, EvalResult};
use crate::model::{
    AccessedQuestion, QualityTier, QuestionInput, QuestionRecord, ScoreReport, StoreStats,
    check_answer_text,
};
use crate::util::{create_parent_dirs, now_utc_millis_string};

pub use db_setup::{DB_SCHEMA_VERSION, query_count};
use export::{ExportRow, write_csv};

pub struct RecordStore {
    connection: Mutex<Connection>,
    last_error: Mutex<Option<String>>,
}

impl RecordStore {
    /// Opens the store for writing, creating the database file and schema when missing.
    pub fn open(db_path: &Path) -> EvalResult<Self> {
        create_parent_dirs(db_path)?;

        let connection = Connection::open(db_path)?;
        db_setup::configure_connection(&connection)?;
        db_setup::ensure_schema(&connection)?;

        Ok(Self {
            connection: Mutex::new(connection),
            last_error: Mutex::new(None),
        })
    }

    /// Opens an existing database without creating or modifying anything. Every write through
    /// this handle fails.
    pub fn open_read_only(db_path: &Path) -> EvalResult<Self> {
        if !db_path.is_file() {
            return Err(EvalError::NotFound(format!(
                "database {}",
                db_path.display()
            )));
        }

        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            connection: Mutex::new(connection),
            last_error: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> EvalResult<Self> {
        let connection = Connection::open_in_memory()?;
        db_setup::ensure_schema(&connection)?;

        Ok(Self {
            connection: Mutex::new(connection),
            last_error: Mutex::new(None),
        })
    }

    /// Reason for the most recent failed `store`/`export` on this handle; cleared by the next
    /// success. Concurrent callers should use `try_store`/`try_export` instead.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn store(
        &self,
        input: &QuestionInput,
        report: &ScoreReport,
        initial_access_count: u32,
    ) -> bool {
        let outcome = self.try_store(input, report, initial_access_count);
        self.record_outcome(&outcome, "store")
    }

    /// Inserts a new record, or overwrites the fields of an existing one and bumps its
    /// `access_count` by one.
    pub fn try_store(
        &self,
        input: &QuestionInput,
        report: &ScoreReport,
        initial_access_count: u32,
    ) -> EvalResult<()> {
        let question_id = input.question_id.trim();
        if question_id.is_empty() {
            return Err(EvalError::InvalidInput(
                "question_id is required".to_string(),
            ));
        }
        check_answer_text("reference answer", &input.reference_answer)
            .and_then(|()| check_answer_text("generated answer", &input.generated_answer))
            .map_err(|err| match err {
                EvalError::InvalidInput(message) => {
                    EvalError::InvalidInput(format!("question {question_id}: {message}"))
                }
                other => other,
            })?;

        let metric_scores_json = serde_json::to_string(&report.metric_scores)?;
        let now = now_utc_millis_string();

        let mut connection = self.connection.lock();
        let tx = connection.transaction()?;
        tx.execute(
            "
            INSERT INTO question_records(
              question_id, question_title, question_content, original_answer, llm_answer,
              metric_scores_json, composite_score, quality_tier, access_count,
              created_at, updated_at, update_seq
            )
            VALUES(
              ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10,
              (SELECT COALESCE(MAX(update_seq), 0) + 1 FROM question_records)
            )
            ON CONFLICT(question_id) DO UPDATE SET
              question_title=excluded.question_title,
              question_content=excluded.question_content,
              original_answer=excluded.original_answer,
              llm_answer=excluded.llm_answer,
              metric_scores_json=excluded.metric_scores_json,
              composite_score=excluded.composite_score,
              quality_tier=excluded.quality_tier,
              access_count=question_records.access_count + 1,
              updated_at=excluded.updated_at,
              update_seq=excluded.update_seq
            ",
            params![
                question_id,
                input.question_title.as_deref().unwrap_or(""),
                input.question_content.as_deref(),
                input.reference_answer,
                input.generated_answer,
                metric_scores_json,
                report.composite_score,
                report.quality_tier.as_str(),
                i64::from(initial_access_count),
                now,
            ],
        )?;
        db_setup::touch_updated_at(&tx, &now)?;
        tx.commit()?;

        debug!(
            question_id = %question_id,
            composite_score = report.composite_score,
            tier = %report.quality_tier,
            "question record upserted"
        );
        Ok(())
    }

    pub fn get_record(&self, question_id: &str) -> EvalResult<QuestionRecord> {
        let connection = self.connection.lock();
        let record = connection
            .query_row(
                "
                SELECT question_id, question_title, question_content, original_answer,
                       llm_answer, metric_scores_json, composite_score, quality_tier,
                       access_count, created_at, updated_at
                FROM question_records
                WHERE question_id = ?1
                ",
                [question_id.trim()],
                |row| Ok(RawRecord::from_row(row)),
            )
            .optional()?
            .ok_or_else(|| EvalError::NotFound(format!("question {question_id}")))??;

        record.into_record()
    }

    pub fn count_records(&self) -> EvalResult<u64> {
        let connection = self.connection.lock();
        let count = query_count(&connection, "SELECT COUNT(*) FROM question_records")?;
        Ok(non_negative(count))
    }

    /// Aggregates over every record in one consistent read. An empty store yields zeros.
    pub fn get_stats(&self, top_n: usize) -> EvalResult<StoreStats> {
        let connection = self.connection.lock();

        let (total_questions, average_score, total_accesses) = connection.query_row(
            "
            SELECT COUNT(*), COALESCE(AVG(composite_score), 0.0), COALESCE(SUM(access_count), 0)
            FROM question_records
            ",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;

        let mut top_statement = connection.prepare(
            "
            SELECT question_id, question_title, composite_score, quality_tier, access_count,
                   updated_at
            FROM question_records
            ORDER BY access_count DESC, update_seq DESC
            LIMIT ?1
            ",
        )?;
        let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
        let mut rows = top_statement.query([limit])?;
        let mut top_accessed = Vec::<AccessedQuestion>::new();
        while let Some(row) = rows.next()? {
            let tier: String = row.get(3)?;
            top_accessed.push(AccessedQuestion {
                question_id: row.get(0)?,
                question_title: row.get(1)?,
                composite_score: row.get(2)?,
                quality_tier: parse_tier(&tier)?,
                access_count: non_negative(row.get(4)?),
                updated_at: row.get(5)?,
            });
        }

        let mut distribution_statement = connection.prepare(
            "SELECT quality_tier, COUNT(*) FROM question_records GROUP BY quality_tier",
        )?;
        let mut rows = distribution_statement.query([])?;
        let mut score_distribution = BTreeMap::<QualityTier, u64>::new();
        while let Some(row) = rows.next()? {
            let tier: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            score_distribution.insert(parse_tier(&tier)?, non_negative(count));
        }

        Ok(StoreStats {
            total_questions: non_negative(total_questions),
            average_score,
            total_accesses: non_negative(total_accesses),
            top_accessed,
            score_distribution,
        })
    }

    pub fn export(&self, destination: &Path) -> bool {
        let outcome = self.try_export(destination);
        self.record_outcome(&outcome, "export")
    }

    /// Writes every record as one CSV row; returns the number of rows written.
    pub fn try_export(&self, destination: &Path) -> EvalResult<usize> {
        let rows = self.load_export_rows()?;
        write_csv(destination, &rows)
    }

    fn load_export_rows(&self) -> EvalResult<Vec<ExportRow>> {
        let connection = self.connection.lock();
        let mut statement = connection.prepare(
            "
            SELECT question_id, question_title, question_content, original_answer, llm_answer,
                   composite_score, quality_tier, access_count
            FROM question_records
            ORDER BY question_id ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::<ExportRow>::new();
        while let Some(row) = rows.next()? {
            let tier: String = row.get(6)?;
            out.push(ExportRow {
                question_id: row.get(0)?,
                question_title: row.get(1)?,
                question_content: row.get(2)?,
                original_answer: row.get(3)?,
                llm_answer: row.get(4)?,
                composite_score: row.get(5)?,
                quality_tier: parse_tier(&tier)?,
                access_count: non_negative(row.get(7)?),
            });
        }

        Ok(out)
    }

    fn record_outcome<T>(&self, outcome: &EvalResult<T>, operation: &str) -> bool {
        let mut last_error = self.last_error.lock();
        match outcome {
            Ok(_) => {
                *last_error = None;
                true
            }
            Err(err) => {
                warn!(operation, error = %err, "record store operation failed");
                *last_error = Some(err.to_string());
                false
            }
        }
    }
}

struct RawRecord {
    question_id: String,
    question_title: String,
    question_content: Option<String>,
    reference_answer: String,
    generated_answer: String,
    metric_scores_json: String,
    composite_score: f64,
    quality_tier: String,
    access_count: i64,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> EvalResult<Self> {
        Ok(Self {
            question_id: row.get(0)?,
            question_title: row.get(1)?,
            question_content: row.get(2)?,
            reference_answer: row.get(3)?,
            generated_answer: row.get(4)?,
            metric_scores_json: row.get(5)?,
            composite_score: row.get(6)?,
            quality_tier: row.get(7)?,
            access_count: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_record(self) -> EvalResult<QuestionRecord> {
        let metric_scores: BTreeMap<String, f64> =
            serde_json::from_str(&self.metric_scores_json)?;

        Ok(QuestionRecord {
            question_id: self.question_id,
            question_title: self.question_title,
            question_content: self.question_content,
            reference_answer: self.reference_answer,
            generated_answer: self.generated_answer,
            score_report: ScoreReport {
                metric_scores,
                composite_score: self.composite_score,
                quality_tier: parse_tier(&self.quality_tier)?,
            },
            access_count: non_negative(self.access_count),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_tier(value: &str) -> EvalResult<QualityTier> {
    QualityTier::parse(value)
        .ok_or_else(|| EvalError::Persistence(format!("unknown quality tier `{value}` in store")))
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ScoringConfig;
    use crate::scoring::Evaluator;

    fn input(question_id: &str, reference: &str, candidate: &str) -> QuestionInput {
        QuestionInput {
            question_id: question_id.to_string(),
            question_title: Some(format!("Title {question_id}")),
            question_content: None,
            reference_answer: reference.to_string(),
            generated_answer: candidate.to_string(),
        }
    }

    fn score(reference: &str, candidate: &str) -> ScoreReport {
        Evaluator::new(&ScoringConfig::default())
            .expect("default config")
            .evaluate_one(reference, candidate)
            .expect("pair should score")
    }

    #[test]
    fn repeated_store_upserts_and_increments_access_count() {
        let store = RecordStore::open_in_memory().expect("store");
        let first = input("42", "Rust is a systems language", "Rust is a language");
        let report = score(&first.reference_answer, &first.generated_answer);

        assert!(store.store(&first, &report, 1));
        assert_eq!(store.get_record("42").expect("record").access_count, 1);

        let mut second = first.clone();
        second.generated_answer = "Rust is a systems programming language".to_string();
        let second_report = score(&second.reference_answer, &second.generated_answer);
        assert!(store.store(&second, &second_report, 1));

        let record = store.get_record("42").expect("record");
        assert_eq!(record.access_count, 2);
        assert_eq!(record.generated_answer, second.generated_answer);
        assert_eq!(record.score_report, second_report);
        assert_eq!(store.count_records().expect("count"), 1);
    }

    #[test]
    fn initial_access_count_seeds_new_records_only() {
        let store = RecordStore::open_in_memory().expect("store");
        let question = input("seeded", "Paris is the capital", "Paris");
        let report = score(&question.reference_answer, &question.generated_answer);

        assert!(store.store(&question, &report, 5));
        assert!(store.store(&question, &report, 5));
        assert_eq!(store.get_record("seeded").expect("record").access_count, 6);
    }

    #[test]
    fn invalid_input_returns_false_and_sets_last_error() {
        let store = RecordStore::open_in_memory().expect("store");
        let report = score("reference", "candidate");

        assert!(!store.store(&input("  ", "reference", "candidate"), &report, 1));
        let reason = store.last_error().expect("failure reason should be recorded");
        assert!(reason.contains("question_id"), "unexpected reason: {reason}");

        assert!(!store.store(&input("q", "reference", "bad\0answer"), &report, 1));
        let reason = store.last_error().expect("failure reason should be recorded");
        assert!(reason.contains("generated answer"), "unexpected reason: {reason}");

        assert!(store.store(&input("q", "reference", "candidate"), &report, 1));
        assert!(store.last_error().is_none());
        assert_eq!(store.count_records().expect("count"), 1);
    }

    #[test]
    fn blank_answer_texts_are_stored_like_any_other_text() {
        let store = RecordStore::open_in_memory().expect("store");
        let report = score("", "");

        store
            .try_store(&input("blank", "   ", ""), &report, 1)
            .expect("blank answers are valid text");
        let record = store.get_record("blank").expect("record");
        assert_eq!(record.reference_answer, "   ");
        assert_eq!(record.generated_answer, "");
    }

    #[test]
    fn concurrent_stores_for_one_question_are_serialized() {
        const THREADS: u64 = 4;
        const STORES_PER_THREAD: u64 = 5;
        const INITIAL: u32 = 2;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            RecordStore::open(&dir.path().join("records.sqlite")).expect("file-backed store"),
        );
        let report = score("shared reference", "shared candidate");

        std::thread::scope(|scope| {
            for worker in 0..THREADS {
                let store = Arc::clone(&store);
                let report = report.clone();
                scope.spawn(move || {
                    let question = input("shared", "shared reference", &format!("from {worker}"));
                    for _ in 0..STORES_PER_THREAD {
                        store
                            .try_store(&question, &report, INITIAL)
                            .expect("concurrent store should succeed");
                    }
                });
            }
        });

        assert_eq!(store.count_records().expect("count"), 1);
        assert_eq!(
            store.get_record("shared").expect("record").access_count,
            u64::from(INITIAL) + THREADS * STORES_PER_THREAD - 1
        );
    }

    #[test]
    fn read_only_open_of_missing_database_fails_without_creating_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("typo").join("missing.sqlite");

        let error = RecordStore::open_read_only(&path)
            .err()
            .expect("missing database should not open");
        assert!(matches!(error, EvalError::NotFound(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("typo").exists());
    }

    #[test]
    fn only_record_writes_stamp_updated_at_and_read_only_handles_reject_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.sqlite");
        let read_updated_at = || -> Option<String> {
            Connection::open(&path)
                .expect("inspect db")
                .query_row(
                    "SELECT value FROM metadata WHERE key = 'db_updated_at'",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .expect("metadata query")
        };

        drop(RecordStore::open(&path).expect("create store"));
        assert_eq!(read_updated_at(), None);

        let report = score("reference", "candidate");
        let writer = RecordStore::open(&path).expect("writer");
        assert!(writer.store(&input("q", "reference", "candidate"), &report, 1));
        drop(writer);
        let stamped = read_updated_at().expect("store should stamp db_updated_at");

        drop(RecordStore::open(&path).expect("reopen writer"));
        let reader = RecordStore::open_read_only(&path).expect("reader");
        assert_eq!(reader.get_stats(5).expect("stats").total_questions, 1);
        assert!(
            reader
                .try_store(&input("other", "reference", "candidate"), &report, 1)
                .is_err()
        );
        drop(reader);
        assert_eq!(read_updated_at(), Some(stamped));
    }

    #[test]
    fn unknown_record_is_not_found() {
        let store = RecordStore::open_in_memory().expect("store");
        assert!(matches!(
            store.get_record("missing"),
            Err(EvalError::NotFound(_))
        ));
    }

    #[test]
    fn stats_on_empty_store_are_zero() {
        let store = RecordStore::open_in_memory().expect("store");
        let stats = store.get_stats(5).expect("stats on empty store");

        assert_eq!(stats.total_questions, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.total_accesses, 0);
        assert!(stats.top_accessed.is_empty());
        assert!(stats.score_distribution.is_empty());
    }

    #[test]
    fn top_accessed_ranks_by_access_count() {
        let store = RecordStore::open_in_memory().expect("store");
        let a = input("A", "Docker runs containers", "Docker runs containers");
        let b = input("B", "Kubernetes schedules pods", "Bananas");
        let a_report = score(&a.reference_answer, &a.generated_answer);
        let b_report = score(&b.reference_answer, &b.generated_answer);

        for _ in 0..3 {
            assert!(store.store(&a, &a_report, 1));
        }
        assert!(store.store(&b, &b_report, 1));

        let stats = store.get_stats(1).expect("stats");
        assert_eq!(stats.top_accessed.len(), 1);
        assert_eq!(stats.top_accessed[0].question_id, "A");
        assert_eq!(stats.top_accessed[0].access_count, 3);
        assert_eq!(stats.total_questions, 2);
        assert_eq!(stats.total_accesses, 4);

        let expected_average = (a_report.composite_score + b_report.composite_score) / 2.0;
        assert!((stats.average_score - expected_average).abs() < 1e-9);
        assert_eq!(stats.score_distribution.values().sum::<u64>(), 2);
    }

    #[test]
    fn access_count_ties_prefer_most_recently_updated() {
        let store = RecordStore::open_in_memory().expect("store");
        let report = score("same reference", "same reference");

        assert!(store.store(&input("first", "same reference", "x"), &report, 1));
        assert!(store.store(&input("second", "same reference", "y"), &report, 1));

        let stats = store.get_stats(2).expect("stats");
        let order = stats
            .top_accessed
            .iter()
            .map(|entry| entry.question_id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(order, vec!["second", "first"]);

        assert!(store.store(&input("first", "same reference", "x"), &report, 1));
        assert!(store.store(&input("second", "same reference", "y"), &report, 1));
        assert!(store.store(&input("first", "same reference", "x"), &report, 1));
        let stats = store.get_stats(1).expect("stats");
        assert_eq!(stats.top_accessed[0].question_id, "first");
    }

    #[test]
    fn export_writes_one_row_per_record_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(&dir.path().join("db").join("records.sqlite"))
            .expect("file-backed store");
        let report = score("Python is interpreted", "Python is interpreted");

        let text = "Python is interpreted";
        assert!(store.store(&input("b", text, text), &report, 1));
        assert!(store.store(&input("a", text, text), &report, 2));

        let path = dir.path().join("out").join("export.csv");
        assert!(store.export(&path));

        let contents = std::fs::read_to_string(&path).expect("read export");
        let lines = contents.lines().collect::<Vec<&str>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("question_id,question_title,"));
        assert!(lines[1].starts_with("a,Title a,"));
        assert!(lines[1].ends_with(",high,2"));
        assert!(lines[2].starts_with("b,Title b,"));
    }

    #[test]
    fn export_to_unwritable_destination_reports_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open_in_memory().expect("store");

        assert!(!store.export(dir.path()));
        assert!(store.last_error().is_some());
    }
}
