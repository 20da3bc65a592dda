use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = roster_worker::Args::parse();
	roster_worker::run(args).await
}
