use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "answer-eval",
    version,
    about = "Answer-quality scoring service and question record analytics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Serve(ServeArgs),
    Evaluate(EvaluateArgs),
    Process(ProcessArgs),
    Report(ReportArgs),
    Export(ExportArgs),
    Status(StatusArgs),
}

/// Scoring options shared by every command that builds an evaluator.
#[derive(Args, Debug, Clone)]
pub struct ScoringArgs {
    /// JSON file overriding the default weights, tier thresholds and limits.
    #[arg(long)]
    pub scoring_config: Option<PathBuf>,

    #[arg(long)]
    pub max_batch_size: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen_addr: SocketAddr,

    #[arg(long, default_value = "data/answer_eval.sqlite")]
    pub db_path: PathBuf,

    /// Serve scoring only, without opening the record store.
    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub reference: String,

    #[arg(long)]
    pub candidate: String,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// JSON array or JSON-lines file of questions.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = "data/answer_eval.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub access_count: u32,

    /// Number of most-accessed questions listed in the closing report.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Also write the CSV export of every stored record here.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Exit with an error when any question fails.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[command(flatten)]
    pub scoring: ScoringArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = "data/answer_eval.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub top: usize,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long, default_value = "data/answer_eval.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "data/exports/question_records.csv")]
    pub output: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "data/answer_eval.sqlite")]
    pub db_path: PathBuf,

    /// Print the stored record for this question as JSON.
    #[arg(long)]
    pub question_id: Option<String>,
}
