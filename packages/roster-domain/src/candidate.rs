use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pair::PairKey;

/// Raw and weight-multiplied score for one configured field.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldScore {
	pub raw: f64,
	pub weighted: f64,
}

/// A likely-duplicate pair produced by a matcher run, before persistence.
///
/// `record_a` is absent when the left side is a not-yet-persisted draft
/// checked ad hoc against the population. Exact matches carry a score of 1
/// and no per-field breakdown.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DuplicateCandidate {
	pub record_a: Option<Uuid>,
	pub record_b: Uuid,
	pub field_scores: BTreeMap<String, FieldScore>,
	pub weighted_score: f64,
}
impl DuplicateCandidate {
	pub fn exact(record_a: Uuid, record_b: Uuid) -> Self {
		let key = PairKey::new(record_a, record_b);

		Self {
			record_a: Some(key.record_a()),
			record_b: key.record_b(),
			field_scores: BTreeMap::new(),
			weighted_score: 1.0,
		}
	}

	/// Canonical key for the pair, when both sides are persisted records.
	pub fn pair_key(&self) -> Option<PairKey> {
		self.record_a.map(|record_a| PairKey::new(record_a, self.record_b))
	}
}
