use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::EvalResult;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Record timestamps keep milliseconds so consecutive updates stay distinguishable.
pub fn now_utc_millis_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filesystem-safe stamp, e.g. `20240501T120000Z`.
pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Creates the directory that will hold `path`, if it has one.
pub fn create_parent_dirs(path: &Path) -> EvalResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    create_parent_dirs(path)
        .with_context(|| format!("failed to create parent directory of {}", path.display()))
}

/// Lower-case hex digest of the file contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_directory(path)?;

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut output = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut output, value)
        .with_context(|| format!("failed to serialize json to {}", path.display()))?;
    writeln!(output)
        .and_then(|()| output.flush())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

pub fn escape_csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_csv_cell_quotes_only_when_needed() {
        assert_eq!(escape_csv_cell("plain"), "plain");
        assert_eq!(escape_csv_cell("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_cell("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn round_to_keeps_requested_precision() {
        assert_eq!(round_to(0.81234, 3), 0.812);
        assert_eq!(round_to(0.0, 3), 0.0);
    }

    #[test]
    fn sha256_file_matches_known_digest_and_json_lands_in_new_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("value.json");

        write_json_pretty(&path, &serde_json::json!({"rows": 2})).expect("json written");
        let contents = fs::read_to_string(&path).expect("read json");
        assert!(contents.ends_with("}\n"));

        let empty = dir.path().join("empty");
        fs::write(&empty, b"").expect("write empty file");
        assert_eq!(
            sha256_file(&empty).expect("hash"),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
