pub mod evaluate;
pub mod export;
pub mod process;
pub mod report;
pub mod serve;
pub mod status;

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::ScoringArgs;
use crate::config::ScoringConfig;
use crate::storage::RecordStore;

fn load_scoring_config(args: &ScoringArgs) -> Result<ScoringConfig> {
    let mut config = ScoringConfig::load(args.scoring_config.as_deref())?;
    if let Some(max_batch_size) = args.max_batch_size {
        config = config.with_max_batch_size(max_batch_size);
        config
            .validate()
            .context("--max-batch-size rejected")?;
    }
    Ok(config)
}

fn open_store(db_path: &Path) -> Result<Arc<RecordStore>> {
    let store = RecordStore::open(db_path)
        .with_context(|| format!("failed to open record store {}", db_path.display()))?;
    Ok(Arc::new(store))
}

fn open_store_read_only(db_path: &Path) -> Result<Arc<RecordStore>> {
    let store = RecordStore::open_read_only(db_path)
        .with_context(|| format!("failed to open record store {} read-only", db_path.display()))?;
    Ok(Arc::new(store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to write JSON output")?;
    writeln!(output).context("failed to write JSON output")?;
    output.flush().context("failed to flush JSON output")?;
    Ok(())
}
