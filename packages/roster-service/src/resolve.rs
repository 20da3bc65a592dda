use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roster_domain::{PairKey, PersonPatch, PersonRecord};
use roster_storage::duplicates::{self, RESOLUTION_IGNORE, RESOLUTION_MERGE};

use crate::{Error, Result, RosterService};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct IgnoreRequest {
	pub record_a: Uuid,
	pub record_b: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MergeRequest {
	pub record_a: Uuid,
	pub record_b: Uuid,
	/// Field values the reviewer picked for the surviving record.
	#[serde(default)]
	pub resolved: PersonPatch,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MergeResponse {
	pub survivor: PersonRecord,
}

impl RosterService {
	/// Drops the pair and records the decision, in one transaction.
	/// Resolving an already-absent pair succeeds: the desired end state
	/// holds either way, and the log still captures the decision.
	pub async fn ignore(&self, req: IgnoreRequest) -> Result<()> {
		validate_pair(req.record_a, req.record_b)?;

		let key = PairKey::new(req.record_a, req.record_b);
		let mut tx = self.db.pool.begin().await?;

		duplicates::delete_pair_tx(&mut tx, req.record_a, req.record_b).await?;
		duplicates::log_resolution_tx(&mut tx, req.record_a, req.record_b, RESOLUTION_IGNORE)
			.await?;

		tx.commit().await?;

		tracing::info!(pair = %key, "Ignored duplicate pair.");

		Ok(())
	}

	/// Merges `record_b` into `record_a` as a single transaction: the pair is
	/// deleted, the decision logged, `record_b` soft-tombstoned, and the
	/// reviewer's resolved fields applied to the survivor. Any step failing
	/// rolls the whole resolution back.
	pub async fn merge(&self, req: MergeRequest) -> Result<MergeResponse> {
		validate_pair(req.record_a, req.record_b)?;

		let key = PairKey::new(req.record_a, req.record_b);
		let entity = self.collaborators.entity.clone();
		let mut tx = self.db.pool.begin().await?;

		duplicates::delete_pair_tx(&mut tx, req.record_a, req.record_b).await?;
		duplicates::log_resolution_tx(&mut tx, req.record_a, req.record_b, RESOLUTION_MERGE)
			.await?;

		entity.tombstone(&mut tx, req.record_b).await?;

		let survivor = entity.update(&mut tx, req.record_a, &req.resolved).await?;

		tx.commit().await?;

		tracing::info!(pair = %key, survivor = %survivor.person_id, "Merged duplicate pair.");

		Ok(MergeResponse { survivor })
	}
}

fn validate_pair(record_a: Uuid, record_b: Uuid) -> Result<()> {
	if record_a == record_b {
		return Err(Error::InvalidRequest {
			message: "record_a and record_b must be two different records.".to_string(),
		});
	}

	Ok(())
}
