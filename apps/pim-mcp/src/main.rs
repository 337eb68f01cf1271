use clap::Parser;

use pim_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	pim_mcp::run(args).await
}
