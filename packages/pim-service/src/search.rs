mod assemble;
mod hydrate;
mod keyword;
mod ranking;

pub use keyword::matches_query;
pub use ranking::{KEYWORD_SIMILARITY, priority_multiplier};

use serde::{Deserialize, Serialize};

use crate::{PimService, Result};
use pim_domain::{EntityKind, StateSummary, StockSummary};
use pim_storage::{VectorHit, VectorIndex, vector};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextSearchRequest {
	pub query: String,
	pub project_id: String,
	/// Zero, negative, or absent means the configured default.
	#[serde(default)]
	pub limit: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoredStock {
	#[serde(flatten)]
	pub summary: StockSummary,
	pub score: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoredState {
	#[serde(flatten)]
	pub summary: StateSummary,
	pub score: f32,
}

/// Both lists are cut from a single ranking, so `stocks.len() + states.len() == total <= limit`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ContextSearchResponse {
	pub stocks: Vec<ScoredStock>,
	pub states: Vec<ScoredState>,
	pub total: usize,
}

enum RetrievalPath<'a> {
	Semantic(&'a dyn VectorIndex),
	Keyword,
}

impl PimService {
	/// Ranked Stocks and active States of one project that relate to `query`.
	///
	/// Requests are validated before any store or index is touched. Index failures and timeouts
	/// degrade to keyword matching and are never returned; store failures are.
	pub async fn context_search(&self, req: ContextSearchRequest) -> Result<ContextSearchResponse> {
		let query = crate::require("query", &req.query)?;
		let project_id = crate::require("project_id", &req.project_id)?;
		let limit = self.settings.resolve_limit(req.limit);

		self.retrieve(query, project_id, limit, None).await
	}

	/// Runs retrieval for already validated inputs. `scope` restricts results to one store.
	pub(crate) async fn retrieve(
		&self,
		query: &str,
		project_id: &str,
		limit: usize,
		scope: Option<EntityKind>,
	) -> Result<ContextSearchResponse> {
		let candidates = match self.retrieval_path(query) {
			RetrievalPath::Semantic(index) =>
				match self.query_index(index, query, project_id, limit, scope).await {
					Ok(hits) => self.hydrate(hits, project_id, scope).await,
					Err(err) => {
						tracing::warn!(
							error = %err,
							project_id,
							"Vector search failed. Falling back to keyword search."
						);

						self.keyword_candidates(query, project_id, scope).await?
					},
				},
			RetrievalPath::Keyword => self.keyword_candidates(query, project_id, scope).await?,
		};
		let ranked = ranking::score(candidates, &self.settings.priority_weights);

		Ok(assemble::assemble(ranked, limit))
	}

	fn retrieval_path(&self, query: &str) -> RetrievalPath<'_> {
		match self.index.as_deref() {
			Some(index) if !query.trim().is_empty() => RetrievalPath::Semantic(index),
			_ => RetrievalPath::Keyword,
		}
	}

	async fn query_index(
		&self,
		index: &dyn VectorIndex,
		query: &str,
		project_id: &str,
		limit: usize,
		scope: Option<EntityKind>,
	) -> pim_storage::Result<Vec<VectorHit>> {
		let filters = vector::project_filter(project_id, scope);
		let fetch_limit = self.settings.fetch_limit(limit);
		let timeout = self.settings.index_timeout;

		match tokio::time::timeout(timeout, index.search(query, fetch_limit, &filters)).await {
			Ok(result) => result,
			Err(_) => Err(pim_storage::Error::Index(format!(
				"search timed out after {} ms",
				timeout.as_millis()
			))),
		}
	}
}
