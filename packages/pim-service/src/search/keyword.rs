use crate::{
	PimService, Result,
	search::{
		hydrate::{self, Candidate, Record},
		ranking::KEYWORD_SIMILARITY,
	},
};
use pim_domain::{EntityKind, State, Stock};
use pim_storage::{StateListOptions, StockListOptions};

/// Case-insensitive substring match of the trimmed `query` against any of `fields`. A blank
/// query matches everything.
pub fn matches_query(query: &str, fields: &[&str]) -> bool {
	let needle = query.trim().to_lowercase();

	if needle.is_empty() {
		return true;
	}

	fields.iter().any(|field| field.to_lowercase().contains(&needle))
}

fn stock_matches(query: &str, stock: &Stock) -> bool {
	let tags = stock.tags.join(" ");

	matches_query(query, &[stock.title.as_str(), stock.content.as_str(), tags.as_str()])
}

fn state_matches(query: &str, state: &State) -> bool {
	let tags = state.tags.join(" ");

	matches_query(query, &[state.title.as_str(), state.description.as_str(), tags.as_str()])
}

impl PimService {
	/// Lists the project's records straight from the stores. Listing failures are returned.
	pub(crate) async fn keyword_candidates(
		&self,
		query: &str,
		project_id: &str,
		scope: Option<EntityKind>,
	) -> Result<Vec<Candidate>> {
		let mut candidates = Vec::new();

		if scope != Some(EntityKind::State) {
			let stocks = self.stocks.list(project_id, &StockListOptions::default()).await?;

			candidates.extend(
				stocks
					.into_iter()
					.filter(|stock| stock_matches(query, stock))
					.map(|stock| Candidate {
						record: Record::Stock(stock),
						similarity: KEYWORD_SIMILARITY,
					}),
			);
		}
		if scope != Some(EntityKind::Stock) {
			let states = self.states.list(project_id, &StateListOptions::default()).await?;

			candidates.extend(
				states
					.into_iter()
					.filter(|state| state_matches(query, state))
					.map(|state| Candidate {
						record: Record::State(state),
						similarity: KEYWORD_SIMILARITY,
					}),
			);
		}

		candidates.retain(|candidate| hydrate::admissible(&candidate.record, project_id));

		Ok(candidates)
	}
}
