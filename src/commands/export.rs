use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::analytics::Analytics;
use crate::cli::ExportArgs;
use crate::model::ExportManifest;
use crate::storage::export::EXPORT_COLUMNS;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

pub fn run(args: ExportArgs) -> Result<()> {
    let store = super::open_store_read_only(&args.db_path)?;
    let analytics = Analytics::new(store);

    let row_count = analytics
        .try_export(&args.output)
        .with_context(|| format!("failed to export records to {}", args.output.display()))?;
    let sha256 = sha256_file(&args.output)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        let file_name = format!("export_manifest_{}.json", utc_compact_string(Utc::now()));
        match args.output.parent() {
            Some(parent) => parent.join(file_name),
            None => file_name.into(),
        }
    });

    let manifest = ExportManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        export_path: args.output.display().to_string(),
        db_path: args.db_path.display().to_string(),
        row_count,
        columns: EXPORT_COLUMNS.iter().map(|column| column.to_string()).collect(),
        sha256,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %args.output.display(),
        manifest = %manifest_path.display(),
        rows = row_count,
        "export complete"
    );
    Ok(())
}
