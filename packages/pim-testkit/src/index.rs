use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use pim_storage::{BoxFuture, Metadata, Result, VectorHit, VectorIndex, vector};

/// Similarity reported for documents without an explicit override.
const DEFAULT_SIMILARITY: f32 = 0.5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCall {
	pub query: String,
	pub limit: usize,
	pub filters: Metadata,
}

#[derive(Clone, Debug)]
struct Document {
	text: String,
	metadata: Metadata,
}

/// In-memory index whose similarities are assigned by the test rather than computed.
#[derive(Debug, Default)]
pub struct MemoryIndex {
	documents: Mutex<BTreeMap<String, Document>>,
	similarities: Mutex<HashMap<String, f32>>,
	calls: Mutex<Vec<SearchCall>>,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_similarity(&self, id: &str, similarity: f32) {
		lock(&self.similarities).insert(id.to_string(), similarity);
	}

	/// Plants a document directly, bypassing the service.
	pub fn insert(&self, id: &str, text: &str, metadata: Metadata) {
		lock(&self.documents)
			.insert(id.to_string(), Document { text: text.to_string(), metadata });
	}

	pub fn contains(&self, id: &str) -> bool {
		lock(&self.documents).contains_key(id)
	}

	pub fn text(&self, id: &str) -> Option<String> {
		lock(&self.documents).get(id).map(|doc| doc.text.clone())
	}

	pub fn metadata(&self, id: &str) -> Option<Metadata> {
		lock(&self.documents).get(id).map(|doc| doc.metadata.clone())
	}

	pub fn len(&self) -> usize {
		lock(&self.documents).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn search_calls(&self) -> Vec<SearchCall> {
		lock(&self.calls).clone()
	}

	fn hits(&self, query: &str, limit: usize, filters: &Metadata) -> Vec<VectorHit> {
		lock(&self.calls).push(SearchCall {
			query: query.to_string(),
			limit,
			filters: filters.clone(),
		});

		let similarities = lock(&self.similarities);
		let mut hits = lock(&self.documents)
			.iter()
			.filter(|(_, doc)| {
				filters.iter().all(|(key, value)| doc.metadata.get(key) == Some(value))
			})
			.map(|(id, doc)| VectorHit {
				id: id.clone(),
				similarity: vector::clamp_similarity(
					similarities.get(id).copied().unwrap_or(DEFAULT_SIMILARITY),
				),
				metadata: doc.metadata.clone(),
			})
			.collect::<Vec<_>>();

		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.id.cmp(&b.id)));
		hits.truncate(limit);

		hits
	}
}
impl VectorIndex for MemoryIndex {
	fn upsert<'a>(
		&'a self,
		id: &'a str,
		text: &'a str,
		metadata: &'a Metadata,
	) -> BoxFuture<'a, Result<()>> {
		self.insert(id, text, metadata.clone());

		Box::pin(async { Ok(()) })
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
		filters: &'a Metadata,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		let hits = self.hits(query, limit, filters);

		Box::pin(async move { Ok(hits) })
	}

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
		lock(&self.documents).remove(id);

		Box::pin(async { Ok(()) })
	}

	fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool>> {
		let found = self.contains(id);

		Box::pin(async move { Ok(found) })
	}
}

/// Index that rejects every call.
#[derive(Debug, Default)]
pub struct FailingIndex {
	calls: AtomicUsize,
}
impl FailingIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn fail<T>(&self) -> BoxFuture<'_, Result<T>>
	where
		T: Send + 'static,
	{
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Err(pim_storage::Error::Index("index unavailable".to_string())) })
	}
}
impl VectorIndex for FailingIndex {
	fn upsert<'a>(
		&'a self,
		_id: &'a str,
		_text: &'a str,
		_metadata: &'a Metadata,
	) -> BoxFuture<'a, Result<()>> {
		self.fail()
	}

	fn search<'a>(
		&'a self,
		_query: &'a str,
		_limit: usize,
		_filters: &'a Metadata,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		self.fail()
	}

	fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<()>> {
		self.fail()
	}

	fn exists<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<bool>> {
		self.fail()
	}
}

/// Wraps a [`MemoryIndex`] and stalls every search for `delay` before answering.
#[derive(Debug)]
pub struct SlowIndex {
	pub inner: MemoryIndex,
	delay: Duration,
}
impl SlowIndex {
	pub fn new(delay: Duration) -> Self {
		Self { inner: MemoryIndex::new(), delay }
	}
}
impl VectorIndex for SlowIndex {
	fn upsert<'a>(
		&'a self,
		id: &'a str,
		text: &'a str,
		metadata: &'a Metadata,
	) -> BoxFuture<'a, Result<()>> {
		self.inner.upsert(id, text, metadata)
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
		filters: &'a Metadata,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.search(query, limit, filters).await
		})
	}

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
		self.inner.delete(id)
	}

	fn exists<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool>> {
		self.inner.exists(id)
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
