use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use roster_domain::{FieldScore, PersonRecord};

use crate::{DuplicateRecord, Result, RosterService};

/// A stored duplicate hydrated with the referenced records for display.
/// Either side can be absent: duplicate rows hold soft references only, and
/// a referenced record may have been retired since the pair was stored.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DenormalisedDuplicateRecord {
	pub record_a: Option<PersonRecord>,
	pub record_b: Option<PersonRecord>,
	pub weighted_score: f64,
	pub field_scores: BTreeMap<String, FieldScore>,
	#[serde(with = "roster_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "roster_domain::time_serde")]
	pub updated_at: OffsetDateTime,
}

impl RosterService {
	pub async fn denormalise(
		&self,
		duplicates: &[DuplicateRecord],
	) -> Result<Vec<DenormalisedDuplicateRecord>> {
		// One fetch per distinct id; the same record often appears in several
		// pairs on a review page.
		let mut records: HashMap<Uuid, Option<PersonRecord>> = HashMap::new();

		for duplicate in duplicates {
			for id in duplicate.record_a.iter().chain(Some(&duplicate.record_b)) {
				if !records.contains_key(id) {
					let record = self.collaborators.entity.get(*id).await?;

					records.insert(*id, record);
				}
			}
		}

		let hydrated = duplicates
			.iter()
			.map(|duplicate| DenormalisedDuplicateRecord {
				record_a: duplicate
					.record_a
					.and_then(|id| records.get(&id).cloned().flatten()),
				record_b: records.get(&duplicate.record_b).cloned().flatten(),
				weighted_score: duplicate.weighted_score,
				field_scores: duplicate.field_scores.clone(),
				created_at: duplicate.created_at,
				updated_at: duplicate.updated_at,
			})
			.collect();

		Ok(hydrated)
	}
}
