use crate::search::{
	ContextSearchResponse, ScoredState, ScoredStock,
	hydrate::Record,
	ranking::{self, Ranked},
};

/// Orders every survivor in one ranking, keeps the first `limit`, then splits by kind.
pub(crate) fn assemble(mut ranked: Vec<Ranked>, limit: usize) -> ContextSearchResponse {
	ranked.sort_by(ranking::compare);
	ranked.truncate(limit);

	let mut response = ContextSearchResponse::default();

	for item in ranked {
		match item.record {
			Record::Stock(stock) =>
				response.stocks.push(ScoredStock { summary: stock.to_summary(), score: item.score }),
			Record::State(state) =>
				response.states.push(ScoredState { summary: state.to_summary(), score: item.score }),
		}
	}

	response.total = response.stocks.len() + response.states.len();

	response
}
