use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::AnalyticsReport;
use crate::cli::ProcessArgs;
use crate::pipeline::{AnalysisSystem, ProcessSummary, load_questions};

#[derive(Serialize)]
struct ProcessOutput {
    summary: ProcessSummary,
    report: AnalyticsReport,
}

pub fn run(args: ProcessArgs) -> Result<()> {
    let config = super::load_scoring_config(&args.scoring)?;
    let questions = load_questions(&args.input)?;
    info!(
        input = %args.input.display(),
        questions = questions.len(),
        "loaded questions"
    );

    let store = super::open_store(&args.db_path)?;
    let system = AnalysisSystem::new(&config, store.clone())
        .context("failed to build analysis system")?;
    let summary = system.process_all(&questions, args.access_count);

    for outcome in summary.outcomes.iter().filter(|outcome| !outcome.success) {
        warn!(
            question_id = %outcome.question_id,
            error = %outcome.error.as_deref().unwrap_or("unknown failure"),
            "question not processed"
        );
    }
    info!(
        processed = summary.processed,
        failed = summary.failed,
        stored_records = store.count_records().context("failed to count stored records")?,
        db_path = %args.db_path.display(),
        "processing finished"
    );

    if let Some(destination) = &args.export {
        if system.export_data(destination) {
            info!(path = %destination.display(), "exported question records");
        } else {
            warn!(
                path = %destination.display(),
                error = %store.last_error().unwrap_or_default(),
                "export failed"
            );
        }
    }

    let report = system
        .generate_report(args.top)
        .context("failed to generate analytics report")?;
    let failed = summary.failed;
    super::print_json(&ProcessOutput { summary, report })?;

    if args.strict && failed > 0 {
        bail!("{} of {} questions failed", failed, questions.len());
    }
    Ok(())
}
