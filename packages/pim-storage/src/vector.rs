use std::collections::BTreeMap;

use crate::{BoxFuture, Result};
use pim_domain::{EntityKind, State, Stock};

pub const META_TYPE: &str = "type";
pub const META_PROJECT_ID: &str = "project_id";
pub const META_PRIORITY: &str = "priority";
pub const META_CATEGORY: &str = "category";
pub const META_STATE_TYPE: &str = "state_type";
pub const META_STATUS: &str = "status";

/// String-keyed metadata stored beside each indexed document and used as exact-match filters.
pub type Metadata = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
	pub id: String,
	/// In `[0, 1]`, higher is closer.
	pub similarity: f32,
	pub metadata: Metadata,
}
impl VectorHit {
	/// Entity kind recorded at indexing time, if any.
	pub fn kind(&self) -> Option<EntityKind> {
		self.metadata.get(META_TYPE).and_then(|raw| EntityKind::parse(raw))
	}
}

/// Best-effort semantic index over Stock and State text. Never authoritative.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Replaces any existing document with the same id.
	fn upsert<'a>(
		&'a self,
		id: &'a str,
		text: &'a str,
		metadata: &'a Metadata,
	) -> BoxFuture<'a, Result<()>>;

	/// Returns at most `limit` hits ordered by descending similarity, or nothing when the index
	/// is empty. Every `filters` entry must match the document metadata exactly.
	fn search<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
		filters: &'a Metadata,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>>;

	/// Deleting an absent id is not an error.
	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

	fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool>>;
}

pub fn stock_metadata(stock: &Stock) -> Metadata {
	Metadata::from([
		(META_TYPE.to_string(), EntityKind::Stock.as_str().to_string()),
		(META_PROJECT_ID.to_string(), stock.project_id.clone()),
		(META_CATEGORY.to_string(), stock.category.as_str().to_string()),
		(META_PRIORITY.to_string(), stock.priority.as_str().to_string()),
	])
}

pub fn state_metadata(state: &State) -> Metadata {
	Metadata::from([
		(META_TYPE.to_string(), EntityKind::State.as_str().to_string()),
		(META_PROJECT_ID.to_string(), state.project_id.clone()),
		(META_STATE_TYPE.to_string(), state.state_type.as_str().to_string()),
		(META_STATUS.to_string(), state.status.as_str().to_string()),
		(META_PRIORITY.to_string(), state.priority.as_str().to_string()),
	])
}

/// Filter restricting a search to one project and, optionally, one entity kind.
pub fn project_filter(project_id: &str, kind: Option<EntityKind>) -> Metadata {
	let mut filters = Metadata::from([(META_PROJECT_ID.to_string(), project_id.to_string())]);

	if let Some(kind) = kind {
		filters.insert(META_TYPE.to_string(), kind.as_str().to_string());
	}

	filters
}

/// Clamps raw similarity into `[0, 1]`; NaN becomes zero.
pub fn clamp_similarity(raw: f32) -> f32 {
	if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) }
}
