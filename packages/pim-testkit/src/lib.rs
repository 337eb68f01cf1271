mod error;
mod index;

pub use error::{Error, Result};
pub use index::{FailingIndex, MemoryIndex, SearchCall, SlowIndex};

use std::{
	env,
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

use pim_domain::{Priority, State, StateStatus, StateType, Stock, StockCategory};
use pim_storage::{
	BoxFuture, FileStockStore, SqliteStateStore, StateListOptions, StateStore, StockListOptions,
	StockStore,
};

/// File-backed Stock store and SQLite State store living in a private temp directory that is
/// removed on drop.
pub struct TestStores {
	pub stocks: Arc<FileStockStore>,
	pub states: Arc<SqliteStateStore>,
	dir: TempDir,
}
impl TestStores {
	pub async fn new() -> Result<Self> {
		let dir = tempfile::tempdir()?;
		let stocks = FileStockStore::open(dir.path().join("stocks")).await?;
		let states = SqliteStateStore::open(&dir.path().join("states.db")).await?;

		Ok(Self { stocks: Arc::new(stocks), states: Arc::new(states), dir })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub async fn put_stock(&self, stock: &Stock) -> Result<()> {
		self.stocks.create(stock).await?;

		Ok(())
	}

	pub async fn put_state(&self, state: &State) -> Result<()> {
		self.states.create(state).await?;

		Ok(())
	}
}

/// Stores whose every call fails, counting how often they were reached.
#[derive(Debug, Default)]
pub struct BrokenStores {
	calls: AtomicUsize,
}
impl BrokenStores {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn fail<T>(&self) -> BoxFuture<'_, pim_storage::Result<T>>
	where
		T: Send + 'static,
	{
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Err(pim_storage::Error::Io(std::io::Error::other("store unavailable"))) })
	}
}
impl StockStore for BrokenStores {
	fn create<'a>(&'a self, _stock: &'a Stock) -> BoxFuture<'a, pim_storage::Result<()>> {
		self.fail()
	}

	fn get<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, pim_storage::Result<Stock>> {
		self.fail()
	}

	fn update<'a>(&'a self, _stock: &'a Stock) -> BoxFuture<'a, pim_storage::Result<()>> {
		self.fail()
	}

	fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, pim_storage::Result<()>> {
		self.fail()
	}

	fn list<'a>(
		&'a self,
		_project_id: &'a str,
		_opts: &'a StockListOptions,
	) -> BoxFuture<'a, pim_storage::Result<Vec<Stock>>> {
		self.fail()
	}
}
impl StateStore for BrokenStores {
	fn create<'a>(&'a self, _state: &'a State) -> BoxFuture<'a, pim_storage::Result<()>> {
		self.fail()
	}

	fn get<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, pim_storage::Result<State>> {
		self.fail()
	}

	fn update<'a>(&'a self, _state: &'a State) -> BoxFuture<'a, pim_storage::Result<()>> {
		self.fail()
	}

	fn list<'a>(
		&'a self,
		_project_id: &'a str,
		_opts: &'a StateListOptions,
	) -> BoxFuture<'a, pim_storage::Result<Vec<State>>> {
		self.fail()
	}
}

/// Qdrant endpoint for the ignored integration tests.
pub fn env_qdrant_url() -> Option<String> {
	env::var("PIM_QDRANT_URL").ok()
}

/// Fixed instant plus `offset_secs`, so fixtures order deterministically by recency.
pub fn ts(offset_secs: i64) -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_750_000_000 + offset_secs)
}

pub fn stock(id: &str, project_id: &str, priority: Priority, title: &str) -> Stock {
	Stock {
		id: id.to_string(),
		project_id: project_id.to_string(),
		category: StockCategory::Design,
		priority,
		title: title.to_string(),
		content: String::new(),
		tags: Vec::new(),
		references: Vec::new(),
		created_at: ts(0),
		updated_at: ts(0),
	}
}

pub fn state(id: &str, project_id: &str, priority: Priority, title: &str) -> State {
	State {
		id: id.to_string(),
		project_id: project_id.to_string(),
		state_type: StateType::Task,
		status: StateStatus::Open,
		priority,
		title: title.to_string(),
		description: String::new(),
		resolution: String::new(),
		tags: Vec::new(),
		references: Vec::new(),
		created_at: ts(0),
		updated_at: ts(0),
		archived_at: None,
	}
}
