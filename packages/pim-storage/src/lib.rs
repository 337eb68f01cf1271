pub mod qdrant;
pub mod schema;
pub mod state;
pub mod stock;
pub mod vector;

mod error;

pub use error::Error;
pub use state::SqliteStateStore;
pub use stock::FileStockStore;
pub use vector::{Metadata, VectorHit, VectorIndex};

use std::{future::Future, pin::Pin};

use pim_domain::{Priority, State, StateStatus, StateType, Stock, StockCategory};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Debug, Default)]
pub struct StockListOptions {
	pub category: Option<StockCategory>,
	pub priority: Option<Priority>,
	pub tag: Option<String>,
	pub limit: Option<usize>,
	pub offset: usize,
}

#[derive(Clone, Debug, Default)]
pub struct StateListOptions {
	pub state_type: Option<StateType>,
	pub status: Option<StateStatus>,
	pub priority: Option<Priority>,
	/// Archived records are excluded unless set.
	pub include_archived: bool,
	pub limit: Option<usize>,
	pub offset: usize,
}

/// Owner of Stock records. An empty `project_id` in `list` matches every project.
pub trait StockStore
where
	Self: Send + Sync,
{
	fn create<'a>(&'a self, stock: &'a Stock) -> BoxFuture<'a, Result<()>>;

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Stock>>;

	fn update<'a>(&'a self, stock: &'a Stock) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

	fn list<'a>(
		&'a self,
		project_id: &'a str,
		opts: &'a StockListOptions,
	) -> BoxFuture<'a, Result<Vec<Stock>>>;
}

/// Owner of State records. An empty `project_id` in `list` matches every project.
pub trait StateStore
where
	Self: Send + Sync,
{
	fn create<'a>(&'a self, state: &'a State) -> BoxFuture<'a, Result<()>>;

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<State>>;

	fn update<'a>(&'a self, state: &'a State) -> BoxFuture<'a, Result<()>>;

	fn list<'a>(
		&'a self,
		project_id: &'a str,
		opts: &'a StateListOptions,
	) -> BoxFuture<'a, Result<Vec<State>>>;
}
