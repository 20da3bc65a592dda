use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

use roster_domain::{DuplicateCandidate, PairKey};

use crate::{
	Error, Result,
	db::Db,
	models::{DuplicateRow, ResolutionLogRow},
};

pub const RESOLUTION_MERGE: &str = "merge";
pub const RESOLUTION_IGNORE: &str = "ignore";

/// Multi-row insert-or-update keyed by the canonical pair. Candidates without
/// a persisted left side are skipped. A pair must not repeat within one
/// batch; `ON CONFLICT DO UPDATE` rejects statements touching a row twice.
pub async fn upsert(db: &Db, candidates: &[DuplicateCandidate]) -> Result<u64> {
	let mut rows = Vec::with_capacity(candidates.len());

	for candidate in candidates {
		let Some(key) = candidate.pair_key() else {
			continue;
		};
		let field_scores = serde_json::to_value(&candidate.field_scores).map_err(|err| {
			Error::InvalidArgument(format!("Failed to encode field scores for {key}: {err}."))
		})?;

		rows.push((key, candidate.weighted_score, field_scores));
	}

	if rows.is_empty() {
		return Ok(0);
	}

	let mut builder = sqlx::QueryBuilder::new(
		"INSERT INTO duplicate_records (record_a, record_b, weighted_score, field_scores) ",
	);

	builder.push_values(rows, |mut b, (key, weighted_score, field_scores)| {
		b.push_bind(key.record_a())
			.push_bind(key.record_b())
			.push_bind(weighted_score)
			.push_bind(field_scores);
	});
	builder.push(
		"\
 ON CONFLICT (record_a, record_b) DO UPDATE
SET
	weighted_score = EXCLUDED.weighted_score,
	field_scores = EXCLUDED.field_scores,
	updated_at = now()",
	);

	let result = builder.build().execute(&db.pool).await?;

	Ok(result.rows_affected())
}

pub async fn list(db: &Db, limit: i64, offset: i64) -> Result<Vec<DuplicateRow>> {
	let rows = sqlx::query_as(
		"\
SELECT id, record_a, record_b, weighted_score, field_scores, created_at, updated_at
FROM duplicate_records
ORDER BY weighted_score DESC, id
LIMIT $1 OFFSET $2",
	)
	.bind(limit)
	.bind(offset)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn count(db: &Db) -> Result<i64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM duplicate_records")
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

/// Removes a stored pair; absent pairs delete zero rows and are not an error.
pub async fn delete_pair(db: &Db, record_a: Uuid, record_b: Uuid) -> Result<u64> {
	delete_pair_exec(&db.pool, record_a, record_b).await
}

pub async fn delete_pair_tx(
	tx: &mut Transaction<'_, Postgres>,
	record_a: Uuid,
	record_b: Uuid,
) -> Result<u64> {
	delete_pair_exec(&mut **tx, record_a, record_b).await
}

pub async fn log_resolution(
	db: &Db,
	record_a: Uuid,
	record_b: Uuid,
	resolution: &str,
) -> Result<()> {
	log_resolution_exec(&db.pool, record_a, record_b, resolution).await
}

pub async fn log_resolution_tx(
	tx: &mut Transaction<'_, Postgres>,
	record_a: Uuid,
	record_b: Uuid,
	resolution: &str,
) -> Result<()> {
	log_resolution_exec(&mut **tx, record_a, record_b, resolution).await
}

pub async fn log_entries(db: &Db, record_a: Uuid, record_b: Uuid) -> Result<Vec<ResolutionLogRow>> {
	let key = PairKey::new(record_a, record_b);
	let rows = sqlx::query_as(
		"\
SELECT id, record_a, record_b, resolution, resolved_at
FROM resolution_log
WHERE record_a = $1 AND record_b = $2
ORDER BY resolved_at, id",
	)
	.bind(key.record_a())
	.bind(key.record_b())
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

async fn delete_pair_exec<'e, E>(executor: E, record_a: Uuid, record_b: Uuid) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let key = PairKey::new(record_a, record_b);
	let result = sqlx::query("DELETE FROM duplicate_records WHERE record_a = $1 AND record_b = $2")
		.bind(key.record_a())
		.bind(key.record_b())
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

async fn log_resolution_exec<'e, E>(
	executor: E,
	record_a: Uuid,
	record_b: Uuid,
	resolution: &str,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let key = PairKey::new(record_a, record_b);

	sqlx::query(
		"\
INSERT INTO resolution_log (record_a, record_b, resolution)
VALUES ($1, $2, $3)",
	)
	.bind(key.record_a())
	.bind(key.record_b())
	.bind(resolution)
	.execute(executor)
	.await?;

	Ok(())
}
