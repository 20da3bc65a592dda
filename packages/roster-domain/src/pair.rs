use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical unordered pair of record ids.
///
/// The smaller id is always held first, so a pair is represented exactly once
/// regardless of which side a comparison started from. Every persistence path
/// and every exclusion set goes through this type.
#[derive(
	Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct PairKey {
	record_a: Uuid,
	record_b: Uuid,
}
impl PairKey {
	pub fn new(x: Uuid, y: Uuid) -> Self {
		if x <= y {
			Self { record_a: x, record_b: y }
		} else {
			Self { record_a: y, record_b: x }
		}
	}

	pub fn record_a(&self) -> Uuid {
		self.record_a
	}

	pub fn record_b(&self) -> Uuid {
		self.record_b
	}
}
impl fmt::Display for PairKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.record_a, self.record_b)
	}
}
