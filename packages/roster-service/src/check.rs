use std::{
	cmp::Ordering,
	collections::{BTreeMap, HashMap},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roster_domain::{DraftRecord, DuplicateCandidate, PairKey};
use roster_storage::scratch::{self, StagedSeed};

use crate::{Error, Result, RosterService};

/// Scores one or more records, persisted or not, against the population.
/// Results are returned to the caller and never stored.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckRequest {
	pub records: Vec<DraftRecord>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckResponse {
	pub candidates: Vec<DuplicateCandidate>,
}

impl RosterService {
	/// Stages the given records into the scratch table under a fresh op_id,
	/// runs the same exact and weighted join cores as a scan, and tears the
	/// staged rows down whether the check succeeds or fails.
	pub async fn check(&self, req: CheckRequest) -> Result<CheckResponse> {
		if req.records.is_empty() {
			return Err(Error::InvalidRequest {
				message: "records must contain at least one record to check.".to_string(),
			});
		}

		let op_id = Uuid::new_v4();
		// Drafts without an id get a throwaway seed id so join output can be
		// mapped back; those candidates carry record_a = None.
		let mut origin: HashMap<Uuid, Option<Uuid>> = HashMap::with_capacity(req.records.len());
		let mut staged = Vec::with_capacity(req.records.len());

		for draft in &req.records {
			let seed_id = draft.person_id.unwrap_or_else(Uuid::new_v4);

			origin.insert(seed_id, draft.person_id);
			staged.push(StagedSeed { seed_id, draft });
		}

		scratch::stage(&self.db, op_id, &staged).await?;

		let outcome = self.check_staged(op_id, &origin).await;

		if let Err(err) = scratch::teardown(&self.db, op_id).await {
			tracing::warn!(%op_id, error = %err, "Failed to tear down scratch rows.");
		}

		let candidates = outcome?;

		Ok(CheckResponse { candidates })
	}

	async fn check_staged(
		&self,
		op_id: Uuid,
		origin: &HashMap<Uuid, Option<Uuid>>,
	) -> Result<Vec<DuplicateCandidate>> {
		let matching = &self.cfg.matching;
		let mut candidates = Vec::new();

		for (seed_id, other_id) in
			scratch::exact_matches(&self.db, op_id, matching.require_matching_sex).await?
		{
			candidates.push(match origin.get(&seed_id).copied().flatten() {
				Some(record_a) => DuplicateCandidate::exact(record_a, other_id),
				None => DuplicateCandidate {
					record_a: None,
					record_b: other_id,
					field_scores: BTreeMap::new(),
					weighted_score: 1.0,
				},
			});
		}

		// The scratch join carries the same identifier and document
		// exclusions as a scan page, so nothing here repeats an exact match.
		let rows = scratch::candidate_rows(
			&self.db,
			op_id,
			matching.require_matching_sex,
			matching.prefilter_floor,
			self.scoring.wants_address(),
		)
		.await?;
		let scored = self.score_candidate_rows(rows).await?;

		for pair in scored.pairs {
			if pair.score.weighted_score < matching.cutoff {
				continue;
			}

			let (record_a, record_b) = match origin.get(&pair.seed_id).copied().flatten() {
				Some(record_a) => {
					let key = PairKey::new(record_a, pair.other_id);

					(Some(key.record_a()), key.record_b())
				},
				None => (None, pair.other_id),
			};

			candidates.push(DuplicateCandidate {
				record_a,
				record_b,
				field_scores: pair.score.field_scores,
				weighted_score: pair.score.weighted_score,
			});
		}

		candidates.sort_by(|x, y| {
			y.weighted_score.partial_cmp(&x.weighted_score).unwrap_or(Ordering::Equal)
		});

		Ok(candidates)
	}
}
