use qdrant_client::qdrant::{CreateCollectionBuilder, Distance, VectorParamsBuilder};

use crate::Result;

/// Payload key carrying the original record id; Qdrant point ids must be UUIDs or integers.
pub const RECORD_ID_KEY: &str = "record_id";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &pim_config::Rag) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.qdrant_url).build()?;

		Ok(Self { client, collection: cfg.collection_name(), vector_dim: cfg.vector_dim })
	}

	/// Creates the cosine-distance collection when it does not exist yet.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine));

		self.client.create_collection(builder).await?;

		tracing::info!(collection = %self.collection, "Created vector collection.");

		Ok(())
	}
}
