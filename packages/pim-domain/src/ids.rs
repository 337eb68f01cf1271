use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::{StateType, StockCategory};

/// Mints record identifiers. Injected into services so tests can pin ids.
pub trait IdGenerator
where
	Self: Send + Sync,
{
	fn stock_id(&self, category: StockCategory) -> String;

	fn state_id(&self, state_type: StateType) -> String;
}

/// `STK-DESIGN-1a2b3c4d` style ids, unique across processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;
impl IdGenerator for RandomIds {
	fn stock_id(&self, category: StockCategory) -> String {
		format!("STK-{}-{}", category.as_str().to_ascii_uppercase(), short_uuid())
	}

	fn state_id(&self, state_type: StateType) -> String {
		format!("STA-{}-{}", state_type.as_str().to_ascii_uppercase(), short_uuid())
	}
}

/// `STK-DESIGN-001` style ids from a counter owned by this instance.
#[derive(Debug, Default)]
pub struct SequentialIds {
	next: AtomicU64,
}
impl SequentialIds {
	pub fn new() -> Self {
		Self::default()
	}

	fn bump(&self) -> u64 {
		self.next.fetch_add(1, Ordering::SeqCst) + 1
	}
}
impl IdGenerator for SequentialIds {
	fn stock_id(&self, category: StockCategory) -> String {
		format!("STK-{}-{:03}", category.as_str().to_ascii_uppercase(), self.bump())
	}

	fn state_id(&self, state_type: StateType) -> String {
		format!("STA-{}-{:03}", state_type.as_str().to_ascii_uppercase(), self.bump())
	}
}

fn short_uuid() -> String {
	let mut raw = Uuid::new_v4().simple().to_string();

	raw.truncate(8);

	raw
}
