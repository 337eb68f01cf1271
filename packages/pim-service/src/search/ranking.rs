use std::cmp::Ordering;

use crate::search::hydrate::{Candidate, Record};
use pim_config::PriorityWeights;
use pim_domain::{EntityKind, Priority};

/// Similarity assigned to every keyword match, so priority alone orders keyword results.
pub const KEYWORD_SIMILARITY: f32 = 1.0;

pub fn priority_multiplier(weights: &PriorityWeights, priority: Priority) -> f32 {
	weights.as_array()[usize::from(priority.rank())]
}

#[derive(Clone, Debug)]
pub(crate) struct Ranked {
	pub(crate) record: Record,
	pub(crate) score: f32,
}

pub(crate) fn score(candidates: Vec<Candidate>, weights: &PriorityWeights) -> Vec<Ranked> {
	candidates
		.into_iter()
		.map(|candidate| {
			let multiplier = priority_multiplier(weights, candidate.record.priority());
			let score = candidate.similarity * multiplier;

			Ranked { record: candidate.record, score }
		})
		.collect()
}

/// Score descending, then most recently updated, then id.
pub(crate) fn compare(a: &Ranked, b: &Ranked) -> Ordering {
	cmp_f32_desc(a.score, b.score)
		.then_with(|| b.record.updated_at().cmp(&a.record.updated_at()))
		.then_with(|| a.record.id().cmp(b.record.id()))
		.then_with(|| kind_order(a.record.kind()).cmp(&kind_order(b.record.kind())))
}

fn kind_order(kind: EntityKind) -> u8 {
	match kind {
		EntityKind::Stock => 0,
		EntityKind::State => 1,
	}
}

fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
