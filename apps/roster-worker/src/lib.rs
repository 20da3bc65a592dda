pub mod worker;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use roster_service::RosterService;
use roster_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = roster_cli::VERSION,
	rename_all = "kebab",
	styles = roster_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = roster_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let interval = Duration::from_secs(config.worker.scan_interval_secs);
	let db = Db::connect(&config.storage.postgres).await?;
	db.ensure_schema().await?;
	let service = RosterService::new(config, db)?;

	worker::run_worker(worker::WorkerState { service, interval }).await
}
