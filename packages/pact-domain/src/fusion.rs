//! Weighted score fusion of vector and keyword result lists.
//!
//! Each source is min-max normalized on its own, then every item contributes
//! `normalized * weight` for each source that returned it. Items found by both sources carry the
//! sum of both contributions, so cross-source agreement outranks a single strong signal.

use std::{
	cmp::Ordering,
	collections::{BTreeSet, HashMap, HashSet},
};

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkMetadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
	Vector,
	Keyword,
}

/// One ranked hit. `score` is the raw source score on input to [`fuse`] and the combined score on
/// output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievedItem {
	pub id: String,
	pub content: String,
	pub metadata: ChunkMetadata,
	pub score: f32,
	pub sources: BTreeSet<Source>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusionWeights {
	pub vector: f32,
	pub keyword: f32,
}
impl FusionWeights {
	pub fn total(&self) -> f32 {
		self.vector + self.keyword
	}
}
impl Default for FusionWeights {
	fn default() -> Self {
		Self { vector: 0.6, keyword: 0.4 }
	}
}

/// Min-max normalizes scores into `[0, 1]` and returns new items. A list whose scores are all equal
/// normalizes to `1.0` throughout. Non-finite scores count as the minimum.
pub fn normalize(items: &[RetrievedItem]) -> Vec<RetrievedItem> {
	let finite = items.iter().map(|item| item.score).filter(|score| score.is_finite());
	let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), score| {
		(min.min(score), max.max(score))
	});
	let span = max - min;

	items
		.iter()
		.map(|item| {
			let score = if !span.is_finite() || span <= 0.0 {
				1.0
			} else if item.score.is_finite() {
				((item.score - min) / span).clamp(0.0, 1.0)
			} else {
				0.0
			};

			RetrievedItem { score, ..item.clone() }
		})
		.collect()
}

/// Merges both lists by id, sorts by combined score descending and keeps `top_k`. Ties keep
/// first-seen order, vector results before keyword results. Repeated ids within one source keep
/// their best-ranked occurrence only.
pub fn fuse(
	vector: &[RetrievedItem],
	keyword: &[RetrievedItem],
	weights: FusionWeights,
	top_k: usize,
) -> Vec<RetrievedItem> {
	let mut merged: Vec<RetrievedItem> = Vec::with_capacity(vector.len() + keyword.len());
	let mut positions: HashMap<String, usize> = HashMap::new();

	for (source, weight, items) in [
		(Source::Vector, weights.vector, normalize(vector)),
		(Source::Keyword, weights.keyword, normalize(keyword)),
	] {
		let mut seen = HashSet::new();

		for item in items {
			if !seen.insert(item.id.clone()) {
				continue;
			}

			let contribution = item.score * weight;

			match positions.get(&item.id) {
				Some(&idx) => {
					let existing = &mut merged[idx];

					existing.score += contribution;
					existing.sources.insert(source);

					if existing.content.is_empty() {
						existing.content = item.content;
					}
				},
				None => {
					positions.insert(item.id.clone(), merged.len());
					merged.push(RetrievedItem {
						score: contribution,
						sources: BTreeSet::from([source]),
						..item
					});
				},
			}
		}
	}

	merged.sort_by(|a, b| cmp_score_desc(a.score, b.score));
	merged.truncate(top_k);

	merged
}

pub fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use crate::status::ContractStatus;

	fn item(id: &str, score: f32) -> RetrievedItem {
		RetrievedItem {
			id: id.to_string(),
			content: format!("content {id}"),
			metadata: ChunkMetadata {
				doc_id: Uuid::nil(),
				party_a: String::new(),
				party_b: String::new(),
				amount: 0.0,
				contract_type: String::new(),
				status: ContractStatus::Active,
				sign_date: None,
				end_date: None,
			},
			score,
			sources: BTreeSet::new(),
		}
	}

	#[test]
	fn normalize_returns_new_scores_and_leaves_input_untouched() {
		let input = vec![item("a", 10.0), item("b", 5.0), item("c", 0.0)];
		let normalized = normalize(&input);

		assert_eq!(normalized.iter().map(|i| i.score).collect::<Vec<_>>(), vec![1.0, 0.5, 0.0]);
		assert_eq!(input[0].score, 10.0);
	}

	#[test]
	fn equal_scores_normalize_to_one() {
		let normalized = normalize(&[item("a", 3.0), item("b", 3.0)]);

		assert!(normalized.iter().all(|i| i.score == 1.0));
		assert_eq!(normalize(&[item("solo", 0.2)])[0].score, 1.0);
	}

	#[test]
	fn non_finite_scores_count_as_minimum() {
		let normalized = normalize(&[item("a", f32::NAN), item("b", 2.0), item("c", 1.0)]);

		assert_eq!(normalized[0].score, 0.0);
		assert_eq!(normalized[1].score, 1.0);
	}

	#[test]
	fn within_source_duplicates_keep_first() {
		let fused = fuse(
			&[item("a", 1.0), item("b", 0.0), item("a", 0.5)],
			&[],
			FusionWeights::default(),
			10,
		);

		assert_eq!(fused.len(), 2);
		assert!((fused[0].score - 0.6).abs() < 1e-6);
	}

	#[test]
	fn truncates_to_top_k() {
		let vector: Vec<_> = (0..20).map(|i| item(&format!("v{i}"), i as f32)).collect();

		assert_eq!(fuse(&vector, &[], FusionWeights::default(), 10).len(), 10);
	}

	#[test]
	fn nan_sorts_last() {
		assert_eq!(cmp_score_desc(f32::NAN, 1.0), Ordering::Greater);
		assert_eq!(cmp_score_desc(2.0, 1.0), Ordering::Less);
	}
}
