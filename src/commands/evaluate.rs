use anyhow::{Context, Result};

use crate::cli::EvaluateArgs;
use crate::scoring::Evaluator;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = super::load_scoring_config(&args.scoring)?;
    let evaluator = Evaluator::new(&config).context("failed to build evaluator")?;

    let report = evaluator
        .evaluate_one(&args.reference, &args.candidate)
        .context("evaluation failed")?;

    super::print_json(&report)
}
