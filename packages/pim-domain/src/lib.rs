mod error;
mod ids;
mod priority;
mod state;
mod stock;

pub use error::{Error, Result};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use priority::Priority;
pub use state::{State, StateStatus, StateSummary, StateType};
pub use stock::{Stock, StockCategory, StockSummary};

/// Which store owns a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Stock,
	State,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Stock => "stock",
			Self::State => "state",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"stock" => Some(Self::Stock),
			"state" => Some(Self::State),
			_ => None,
		}
	}
}
