use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pact_api::Args::parse();

	pact_api::run(args).await
}
