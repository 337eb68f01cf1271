use std::sync::Arc;

use qdrant_client::{
	client::Payload,
	qdrant::{
		Condition, DeletePointsBuilder, Filter, GetPointsBuilder, PointId, PointStruct, Query,
		QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, value::Kind,
	},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{EmbeddingProvider, PimService, Result};
use pim_config::{Embedding, Rag};
use pim_domain::{State, Stock};
use pim_providers::embedding;
use pim_storage::{
	BoxFuture, Metadata, StateListOptions, StockListOptions, VectorHit, VectorIndex,
	qdrant::{QdrantStore, RECORD_ID_KEY},
	vector,
};

/// Outcome of reconciling the index with the stores at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
	/// Records that were missing and have been written.
	pub indexed: usize,
	/// Records already present.
	pub present: usize,
	/// Archived States whose stale entries were deleted.
	pub removed: usize,
	pub failed: usize,
}

/// Qdrant point id for a record id. Deterministic, so re-indexing replaces the old point.
pub fn point_id(record_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}

/// [`VectorIndex`] backed by an embedding provider and a Qdrant collection.
pub struct SemanticIndex {
	qdrant: QdrantStore,
	embedding: Embedding,
	provider: Arc<dyn EmbeddingProvider>,
}
impl SemanticIndex {
	/// Checks the embedding settings, then connects and creates the collection if needed.
	pub async fn connect(rag: &Rag, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
		embedding::check(&rag.embedding)?;

		let qdrant = QdrantStore::new(rag)?;

		qdrant.ensure_collection().await?;

		Ok(Self { qdrant, embedding: rag.embedding.clone(), provider })
	}

	pub fn collection(&self) -> &str {
		&self.qdrant.collection
	}

	async fn embed_text(&self, text: &str) -> pim_storage::Result<Vec<f32>> {
		let texts = [text.to_string()];
		let mut vectors = self
			.provider
			.embed(&self.embedding, &texts)
			.await
			.map_err(|err| pim_storage::Error::Index(err.to_string()))?;

		vectors
			.pop()
			.ok_or_else(|| pim_storage::Error::Index("embedding provider returned no vector".into()))
	}

	async fn upsert_document(
		&self,
		id: &str,
		text: &str,
		metadata: &Metadata,
	) -> pim_storage::Result<()> {
		let vector = self.embed_text(text).await?;
		let mut payload = Payload::new();

		payload.insert(RECORD_ID_KEY, id.to_string());

		for (key, value) in metadata {
			payload.insert(key.as_str(), value.clone());
		}

		let point = PointStruct::new(point_id(id).to_string(), vector, payload);

		self.qdrant
			.client
			.upsert_points(
				UpsertPointsBuilder::new(self.qdrant.collection.clone(), vec![point]).wait(true),
			)
			.await?;

		Ok(())
	}

	async fn search_documents(
		&self,
		query: &str,
		limit: usize,
		filters: &Metadata,
	) -> pim_storage::Result<Vec<VectorHit>> {
		if query.trim().is_empty() {
			return Err(pim_storage::Error::Index("query must be non-empty".to_string()));
		}
		if limit == 0 {
			return Ok(Vec::new());
		}

		let vector = self.embed_text(query).await?;
		let filter = Filter::must(
			filters.iter().map(|(key, value)| Condition::matches(key.clone(), value.clone())),
		);
		let search = QueryPointsBuilder::new(self.qdrant.collection.clone())
			.query(Query::new_nearest(vector))
			.filter(filter)
			.limit(limit as u64)
			.with_payload(true);
		let response = self.qdrant.client.query(search).await?;

		Ok(response.result.into_iter().filter_map(scored_point_to_hit).collect())
	}

	async fn delete_document(&self, id: &str) -> pim_storage::Result<()> {
		let filter = Filter::must([Condition::matches(RECORD_ID_KEY, id.to_string())]);

		self.qdrant
			.client
			.delete_points(
				DeletePointsBuilder::new(self.qdrant.collection.clone()).points(filter).wait(true),
			)
			.await?;

		Ok(())
	}

	async fn document_exists(&self, id: &str) -> pim_storage::Result<bool> {
		let ids: Vec<PointId> = vec![point_id(id).to_string().into()];
		let response = self
			.qdrant
			.client
			.get_points(
				GetPointsBuilder::new(self.qdrant.collection.clone(), ids)
					.with_payload(false)
					.with_vectors(false),
			)
			.await?;

		Ok(!response.result.is_empty())
	}
}
impl VectorIndex for SemanticIndex {
	fn upsert<'a>(
		&'a self,
		id: &'a str,
		text: &'a str,
		metadata: &'a Metadata,
	) -> BoxFuture<'a, pim_storage::Result<()>> {
		Box::pin(self.upsert_document(id, text, metadata))
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
		filters: &'a Metadata,
	) -> BoxFuture<'a, pim_storage::Result<Vec<VectorHit>>> {
		Box::pin(self.search_documents(query, limit, filters))
	}

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, pim_storage::Result<()>> {
		Box::pin(self.delete_document(id))
	}

	fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, pim_storage::Result<bool>> {
		Box::pin(self.document_exists(id))
	}
}

impl PimService {
	/// Writes are best-effort: a failed index update is logged and the store write stands.
	pub(crate) async fn index_stock(&self, stock: &Stock) {
		let Some(index) = self.index.as_deref() else {
			return;
		};
		let text = stock.index_text();
		let metadata = vector::stock_metadata(stock);

		if let Err(err) = index.upsert(&stock.id, &text, &metadata).await {
			tracing::warn!(error = %err, record_id = %stock.id, "Failed to index stock.");
		}
	}

	pub(crate) async fn index_state(&self, state: &State) {
		let Some(index) = self.index.as_deref() else {
			return;
		};
		let text = state.index_text();
		let metadata = vector::state_metadata(state);

		if let Err(err) = index.upsert(&state.id, &text, &metadata).await {
			tracing::warn!(error = %err, record_id = %state.id, "Failed to index state.");
		}
	}

	pub(crate) async fn unindex(&self, id: &str) {
		let Some(index) = self.index.as_deref() else {
			return;
		};

		if let Err(err) = index.delete(id).await {
			tracing::warn!(error = %err, record_id = %id, "Failed to remove record from index.");
		}
	}

	/// Indexes every Stock and active State the index is missing and drops archived States
	/// that are still present. Per-record failures are counted and logged; only store listing
	/// errors abort.
	pub async fn bootstrap_index(&self) -> Result<BootstrapReport> {
		let mut report = BootstrapReport::default();
		let Some(index) = self.index.as_deref() else {
			return Ok(report);
		};
		let stocks = self.stocks.list("", &StockListOptions::default()).await?;

		for stock in &stocks {
			let text = stock.index_text();
			let metadata = vector::stock_metadata(stock);

			ensure_indexed(index, &stock.id, &text, &metadata, &mut report).await;
		}

		let opts = StateListOptions { include_archived: true, ..StateListOptions::default() };
		let states = self.states.list("", &opts).await?;

		for state in &states {
			if state.is_active() {
				let text = state.index_text();
				let metadata = vector::state_metadata(state);

				ensure_indexed(index, &state.id, &text, &metadata, &mut report).await;
			} else {
				ensure_removed(index, &state.id, &mut report).await;
			}
		}

		tracing::info!(
			indexed = report.indexed,
			present = report.present,
			removed = report.removed,
			failed = report.failed,
			"Index bootstrap finished."
		);

		Ok(report)
	}
}

async fn ensure_indexed(
	index: &dyn VectorIndex,
	id: &str,
	text: &str,
	metadata: &Metadata,
	report: &mut BootstrapReport,
) {
	let result = match index.exists(id).await {
		Ok(true) => {
			report.present += 1;

			return;
		},
		Ok(false) => index.upsert(id, text, metadata).await,
		Err(err) => Err(err),
	};

	match result {
		Ok(()) => report.indexed += 1,
		Err(err) => {
			tracing::warn!(error = %err, record_id = %id, "Failed to bootstrap index entry.");

			report.failed += 1;
		},
	}
}

async fn ensure_removed(index: &dyn VectorIndex, id: &str, report: &mut BootstrapReport) {
	let result = match index.exists(id).await {
		Ok(false) => return,
		Ok(true) => index.delete(id).await,
		Err(err) => Err(err),
	};

	match result {
		Ok(()) => report.removed += 1,
		Err(err) => {
			tracing::warn!(error = %err, record_id = %id, "Failed to drop archived index entry.");

			report.failed += 1;
		},
	}
}

fn scored_point_to_hit(point: ScoredPoint) -> Option<VectorHit> {
	let mut id = None;
	let mut metadata = Metadata::new();

	for (key, value) in point.payload {
		let Some(Kind::StringValue(text)) = value.kind else {
			continue;
		};

		if key == RECORD_ID_KEY {
			id = Some(text);
		} else {
			metadata.insert(key, text);
		}
	}

	Some(VectorHit { id: id?, similarity: vector::clamp_similarity(point.score), metadata })
}
