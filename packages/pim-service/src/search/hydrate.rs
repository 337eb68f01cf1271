use std::collections::HashSet;

use time::OffsetDateTime;

use crate::PimService;
use pim_domain::{EntityKind, Priority, State, Stock};
use pim_storage::VectorHit;

#[derive(Clone, Debug)]
pub(crate) enum Record {
	Stock(Stock),
	State(State),
}
impl Record {
	pub(crate) fn kind(&self) -> EntityKind {
		match self {
			Self::Stock(_) => EntityKind::Stock,
			Self::State(_) => EntityKind::State,
		}
	}

	pub(crate) fn id(&self) -> &str {
		match self {
			Self::Stock(stock) => &stock.id,
			Self::State(state) => &state.id,
		}
	}

	pub(crate) fn priority(&self) -> Priority {
		match self {
			Self::Stock(stock) => stock.priority,
			Self::State(state) => state.priority,
		}
	}

	pub(crate) fn updated_at(&self) -> OffsetDateTime {
		match self {
			Self::Stock(stock) => stock.updated_at,
			Self::State(state) => state.updated_at,
		}
	}

	fn project_id(&self) -> &str {
		match self {
			Self::Stock(stock) => &stock.project_id,
			Self::State(state) => &state.project_id,
		}
	}
}

/// A record that survived hydration, with the similarity its retrieval path assigned.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
	pub(crate) record: Record,
	pub(crate) similarity: f32,
}

/// Records from another project and archived States never reach ranking.
pub(crate) fn admissible(record: &Record, project_id: &str) -> bool {
	if record.project_id() != project_id {
		return false;
	}

	match record {
		Record::Stock(_) => true,
		Record::State(state) => state.is_active(),
	}
}

impl PimService {
	/// Re-reads every hit from its owning store. The index may lag behind the stores, so hits
	/// that no longer resolve, moved project, or were archived are dropped without error.
	pub(crate) async fn hydrate(
		&self,
		hits: Vec<VectorHit>,
		project_id: &str,
		scope: Option<EntityKind>,
	) -> Vec<Candidate> {
		let mut seen = HashSet::new();
		let mut candidates = Vec::new();

		for hit in hits {
			let Some(kind) = hit.kind() else {
				tracing::debug!(id = %hit.id, "Skipping index hit without an entity type.");

				continue;
			};

			if scope.is_some_and(|scope| scope != kind) || !seen.insert((kind, hit.id.clone())) {
				continue;
			}

			let fetched = match kind {
				EntityKind::Stock => self.stocks.get(&hit.id).await.map(Record::Stock),
				EntityKind::State => self.states.get(&hit.id).await.map(Record::State),
			};
			let record = match fetched {
				Ok(record) => record,
				Err(err) if err.is_not_found() => {
					tracing::debug!(id = %hit.id, "Skipping stale index hit.");

					continue;
				},
				Err(err) => {
					tracing::warn!(error = %err, id = %hit.id, "Failed to load indexed record.");

					continue;
				},
			};

			if admissible(&record, project_id) {
				candidates.push(Candidate { record, similarity: hit.similarity });
			}
		}

		candidates
	}
}
