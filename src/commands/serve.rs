use anyhow::{Context, Result};
use tracing::info;

use crate::analytics::Analytics;
use crate::cli::ServeArgs;
use crate::scoring::Evaluator;
use crate::server::{self, AppState};

pub fn run(args: ServeArgs) -> Result<()> {
    let config = super::load_scoring_config(&args.scoring)?;
    let evaluator = Evaluator::new(&config).context("failed to build evaluator")?;

    let analytics = if args.no_store {
        info!("record store disabled, analytics endpoint will answer 404");
        None
    } else {
        let store = super::open_store(&args.db_path)?;
        info!(db_path = %args.db_path.display(), "record store opened");
        Some(Analytics::new(store))
    };

    info!(
        listen_addr = %args.listen_addr,
        max_batch_size = config.max_batch_size,
        "starting evaluation service"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(server::serve(args.listen_addr, AppState::new(evaluator, analytics)))
}
