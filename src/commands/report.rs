use anyhow::{Context, Result};
use tracing::info;

use crate::analytics::Analytics;
use crate::cli::ReportArgs;
use crate::util::write_json_pretty;

pub fn run(args: ReportArgs) -> Result<()> {
    let store = super::open_store_read_only(&args.db_path)?;
    let report = Analytics::new(store)
        .report(args.top)
        .with_context(|| format!("failed to build report from {}", args.db_path.display()))?;

    info!(
        total_questions = report.overview.total_questions,
        average_score = report.overview.average_score,
        "analytics report generated"
    );

    if let Some(output) = &args.output {
        write_json_pretty(output, &report)?;
        info!(path = %output.display(), "wrote analytics report");
    }

    super::print_json(&report)
}
