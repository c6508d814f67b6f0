pub mod worker;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pact_service::{PactService, Stores};
use pact_storage::{db::Db, keyword::KeywordStore, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = pact_cli::VERSION,
	rename_all = "kebab",
	styles = pact_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pact_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;
	let keyword = KeywordStore::new(&config.storage.keyword)?;
	let schedule = worker::SweepSchedule::from_config(&config.lifecycle);
	let service = PactService::new(config, Stores::new(db, keyword, qdrant));

	worker::run_worker(&service, schedule).await
}
