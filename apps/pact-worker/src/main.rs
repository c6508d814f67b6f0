use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pact_worker::Args::parse();

	pact_worker::run(args).await
}
