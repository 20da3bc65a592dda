use time::OffsetDateTime;

use crate::{Result, db::Db};

/// State key under which the weighted scan stores its watermark.
pub const SCAN_WATERMARK: &str = "weighted_scan";

pub async fn watermark(db: &Db, key: &str) -> Result<Option<OffsetDateTime>> {
	let value: Option<OffsetDateTime> =
		sqlx::query_scalar("SELECT watermark FROM matcher_state WHERE key = $1")
			.bind(key)
			.fetch_optional(&db.pool)
			.await?;

	Ok(value)
}

pub async fn set_watermark(db: &Db, key: &str, at: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO matcher_state (key, watermark)
VALUES ($1, $2)
ON CONFLICT (key) DO UPDATE
SET
	watermark = EXCLUDED.watermark,
	updated_at = now()",
	)
	.bind(key)
	.bind(at)
	.execute(&db.pool)
	.await?;

	Ok(())
}
