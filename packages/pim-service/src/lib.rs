pub mod index;
pub mod search;
pub mod state;
pub mod stock;

mod error;

pub use error::{Error, Result};
pub use index::{BootstrapReport, SemanticIndex};
pub use pim_storage::BoxFuture;
pub use search::{ContextSearchRequest, ContextSearchResponse, ScoredState, ScoredStock};
pub use state::{CreateStateInput, UpdateStateInput};
pub use stock::{CreateStockInput, UpdateStockInput};

use std::{sync::Arc, time::Duration};

use pim_config::{Config, Embedding, PriorityWeights};
use pim_domain::{IdGenerator, RandomIds};
use pim_providers::embedding;
use pim_storage::{StateStore, StockStore, VectorIndex};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a Embedding,
		texts: &'a [String],
	) -> BoxFuture<'a, pim_providers::Result<Vec<Vec<f32>>>>;
}

/// Calls the configured embedding endpoint over HTTP.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpEmbedding;
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a Embedding,
		texts: &'a [String],
	) -> BoxFuture<'a, pim_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

#[derive(Clone, Debug)]
pub struct SearchSettings {
	/// Used whenever a request asks for zero or fewer results.
	pub default_limit: usize,
	pub overfetch_factor: usize,
	pub index_timeout: Duration,
	pub priority_weights: PriorityWeights,
}
impl SearchSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			default_limit: cfg.search.default_limit as usize,
			overfetch_factor: cfg.search.overfetch_factor as usize,
			index_timeout: Duration::from_millis(cfg.search.index_timeout_ms),
			priority_weights: cfg.ranking.priority_weights,
		}
	}

	pub(crate) fn resolve_limit(&self, requested: Option<i64>) -> usize {
		match requested {
			Some(limit) if limit > 0 => usize::try_from(limit).unwrap_or(usize::MAX),
			_ => self.default_limit.max(1),
		}
	}

	pub(crate) fn fetch_limit(&self, limit: usize) -> usize {
		limit.saturating_mul(self.overfetch_factor).max(limit)
	}
}
impl Default for SearchSettings {
	fn default() -> Self {
		Self::from_config(&Config::default())
	}
}

/// Entry point for every Stock, State, and retrieval operation.
///
/// The stores are authoritative. The vector index is optional and best-effort: index writes that
/// fail are logged and skipped, and searches fall back to keyword matching.
pub struct PimService {
	pub stocks: Arc<dyn StockStore>,
	pub states: Arc<dyn StateStore>,
	pub index: Option<Arc<dyn VectorIndex>>,
	pub ids: Arc<dyn IdGenerator>,
	pub settings: SearchSettings,
}
impl PimService {
	pub fn new(
		stocks: Arc<dyn StockStore>,
		states: Arc<dyn StateStore>,
		index: Option<Arc<dyn VectorIndex>>,
	) -> Self {
		Self { stocks, states, index, ids: Arc::new(RandomIds), settings: SearchSettings::default() }
	}

	pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
		self.ids = ids;

		self
	}

	pub fn with_settings(mut self, settings: SearchSettings) -> Self {
		self.settings = settings;

		self
	}
}

pub(crate) fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
	if value.trim().is_empty() {
		return Err(Error::MissingField { field });
	}

	Ok(value)
}
