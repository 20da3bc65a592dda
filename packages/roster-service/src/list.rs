use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use roster_domain::FieldScore;
use roster_storage::duplicates;

use crate::{Result, RosterService};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ListDuplicatesRequest {
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

/// A stored duplicate pair as surfaced to reviewers, highest score first.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DuplicateRecord {
	pub record_a: Option<Uuid>,
	pub record_b: Uuid,
	pub weighted_score: f64,
	pub field_scores: BTreeMap<String, FieldScore>,
	#[serde(with = "roster_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "roster_domain::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ListDuplicatesResponse {
	pub items: Vec<DuplicateRecord>,
	pub total: u64,
}

impl RosterService {
	pub async fn list_duplicates(
		&self,
		req: ListDuplicatesRequest,
	) -> Result<ListDuplicatesResponse> {
		let limit = req.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
		let offset = req.offset.unwrap_or(0).max(0);
		let rows = duplicates::list(&self.db, limit, offset).await?;
		let total = self.count_duplicates().await?;
		let mut items = Vec::with_capacity(rows.len());

		for row in rows {
			// Pairwise rows are independent; a row whose stored score map no
			// longer decodes is reported and skipped, not a listing failure.
			let field_scores = match row.decode_field_scores() {
				Ok(field_scores) => field_scores,
				Err(err) => {
					tracing::warn!(
						row = row.id,
						error = %err,
						"Stored field scores failed to decode; skipping the row.",
					);

					continue;
				},
			};

			items.push(DuplicateRecord {
				record_a: row.record_a,
				record_b: row.record_b,
				weighted_score: row.weighted_score,
				field_scores,
				created_at: row.created_at,
				updated_at: row.updated_at,
			});
		}

		Ok(ListDuplicatesResponse { items, total })
	}

	pub async fn count_duplicates(&self) -> Result<u64> {
		let count = duplicates::count(&self.db).await?;

		Ok(count.max(0) as u64)
	}
}
