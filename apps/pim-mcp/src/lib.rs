pub mod server;

use std::sync::Arc;

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use pim_config::Config;
use pim_service::{HttpEmbedding, PimService, SearchSettings, SemanticIndex};
use pim_storage::{FileStockStore, SqliteStateStore, VectorIndex};

#[derive(Debug, Parser)]
#[command(
	version = pim_cli::VERSION,
	rename_all = "kebab",
	styles = pim_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub common: pim_cli::CommonArgs,
	/// Override `mcp.transport` (`stdio` or `http`).
	#[arg(long, value_name = "TRANSPORT")]
	pub transport: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	Bearer { token: String },
}
impl McpAuthState {
	pub fn from_config(mcp: &pim_config::Mcp) -> Self {
		match mcp.auth_token.as_deref().map(str::trim) {
			Some(token) if !token.is_empty() => Self::Bearer { token: token.to_string() },
			_ => Self::Off,
		}
	}
}

pub async fn run(args: Args) -> Result<()> {
	let config = load_config(&args)?;

	init_tracing(&config);

	let service = Arc::new(build_service(&config).await?);

	if let Err(err) = service.bootstrap_index().await {
		tracing::warn!(error = %err, "Index bootstrap failed. Continuing.");
	}

	match config.mcp.transport.as_str() {
		"stdio" => server::serve_stdio(service).await,
		"http" => {
			let auth_state = McpAuthState::from_config(&config.mcp);

			server::serve_http(&config.mcp.bind, service, auth_state).await
		},
		other => Err(eyre::eyre!("mcp.transport must be one of stdio or http, got {other}.")),
	}
}

/// Resolves the config file and applies command-line overrides on top of it.
pub fn load_config(args: &Args) -> Result<Config> {
	let mut config = pim_config::load_unvalidated(args.common.config.as_deref())?;

	if let Some(data_dir) = &args.common.data_dir {
		config.storage.data_dir = data_dir.clone();
	}
	if let Some(transport) = &args.transport {
		config.mcp.transport = transport.trim().to_string();
	}

	pim_config::validate(&config)?;

	Ok(config)
}

/// Opens both stores under `storage.data_dir` and attaches the semantic index when it can be
/// built.
pub async fn build_service(config: &Config) -> Result<PimService> {
	tokio::fs::create_dir_all(&config.storage.data_dir).await?;

	let stocks = FileStockStore::open(config.storage.stocks_dir()).await?;
	let states = SqliteStateStore::open(&config.storage.states_db_path()).await?;
	let index = build_index(config).await;

	tracing::info!(
		data_dir = %config.storage.data_dir.display(),
		semantic = index.is_some(),
		"Stores opened."
	);

	Ok(PimService::new(Arc::new(stocks), Arc::new(states), index)
		.with_settings(SearchSettings::from_config(config)))
}

async fn build_index(config: &Config) -> Option<Arc<dyn VectorIndex>> {
	if !config.rag.enabled {
		return None;
	}

	match SemanticIndex::connect(&config.rag, Arc::new(HttpEmbedding)).await {
		Ok(index) => {
			tracing::info!(collection = index.collection(), "Semantic index ready.");

			let index: Arc<dyn VectorIndex> = Arc::new(index);

			Some(index)
		},
		Err(err) => {
			tracing::warn!(error = %err, "Semantic index unavailable. Using keyword search only.");

			None
		},
	}
}

fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	// Stdout carries the stdio transport.
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
