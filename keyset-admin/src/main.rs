use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod cli;

/// Sets up the tracing subscriber for the process. Log output goes to
/// stderr; stdout is reserved for the JWKS export.
fn init_tracing_subscriber() {
	let env_filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::INFO.into())
		.from_env_lossy();
	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing_subscriber();
	let cli = cli::CLI::parse();
	cli.run().await
}
