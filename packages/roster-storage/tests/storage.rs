//! Storage-layer tests against an ephemeral Postgres database. Set
//! `ROSTER_PG_DSN` to a reachable server to run them.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use roster_config::Postgres;
use roster_domain::{DuplicateCandidate, FieldScore, PairKey};
use roster_storage::{db::Db, duplicates, state};
use roster_testkit::TestDatabase;

async fn bootstrap(dsn: &str) -> Db {
	let cfg = Postgres { dsn: dsn.to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

fn candidate(record_a: Uuid, record_b: Uuid, weighted_score: f64) -> DuplicateCandidate {
	let key = PairKey::new(record_a, record_b);
	let mut field_scores = BTreeMap::new();

	field_scores.insert("name".to_string(), FieldScore { raw: weighted_score, weighted: weighted_score });

	DuplicateCandidate {
		record_a: Some(key.record_a()),
		record_b: key.record_b(),
		field_scores,
		weighted_score,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn schema_bootstrap_creates_the_matcher_tables() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_creates_the_matcher_tables; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;

	for table in [
		"persons",
		"person_identifications",
		"duplicate_records",
		"resolution_log",
		"scratch_candidates",
		"matcher_state",
	] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "table {table} must exist");
	}

	// Bootstrapping again must be a no-op, not an error.
	db.ensure_schema().await.expect("Schema bootstrap must be idempotent.");

	tdb.cleanup().await.expect("Failed to drop test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn upsert_overwrites_scores_for_the_same_pair() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping upsert_overwrites_scores_for_the_same_pair; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;
	let a = Uuid::new_v4();
	let b = Uuid::new_v4();

	duplicates::upsert(&db, &[candidate(a, b, 0.7)]).await.expect("Upsert failed.");
	// Opposite comparison order, later score: still the same canonical row.
	duplicates::upsert(&db, &[candidate(b, a, 0.9)]).await.expect("Upsert failed.");

	let rows = duplicates::list(&db, 10, 0).await.expect("Listing failed.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].weighted_score, 0.9);

	let key = PairKey::new(a, b);

	assert_eq!(rows[0].record_a, Some(key.record_a()));
	assert_eq!(rows[0].record_b, key.record_b());
	assert!(rows[0].updated_at >= rows[0].created_at);

	tdb.cleanup().await.expect("Failed to drop test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn listing_orders_by_score_descending() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping listing_orders_by_score_descending; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;

	let batch = vec![
		candidate(Uuid::new_v4(), Uuid::new_v4(), 0.2),
		candidate(Uuid::new_v4(), Uuid::new_v4(), 0.8),
		candidate(Uuid::new_v4(), Uuid::new_v4(), 0.5),
	];

	duplicates::upsert(&db, &batch).await.expect("Upsert failed.");

	let rows = duplicates::list(&db, 10, 0).await.expect("Listing failed.");
	let scores: Vec<f64> = rows.iter().map(|row| row.weighted_score).collect();

	assert_eq!(scores, vec![0.8, 0.5, 0.2]);
	assert_eq!(duplicates::count(&db).await.expect("Count failed."), 3);

	tdb.cleanup().await.expect("Failed to drop test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn deleting_an_absent_pair_is_a_no_op() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping deleting_an_absent_pair_is_a_no_op; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;

	let deleted = duplicates::delete_pair(&db, Uuid::new_v4(), Uuid::new_v4())
		.await
		.expect("Delete must not fail for an absent pair.");

	assert_eq!(deleted, 0);

	tdb.cleanup().await.expect("Failed to drop test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn resolution_log_appends_under_the_canonical_pair() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping resolution_log_appends_under_the_canonical_pair; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;
	let a = Uuid::new_v4();
	let b = Uuid::new_v4();

	duplicates::log_resolution(&db, a, b, duplicates::RESOLUTION_IGNORE)
		.await
		.expect("Log append failed.");
	// Opposite order lands under the same pair.
	duplicates::log_resolution(&db, b, a, duplicates::RESOLUTION_MERGE)
		.await
		.expect("Log append failed.");

	let entries = duplicates::log_entries(&db, a, b).await.expect("Log fetch failed.");

	assert_eq!(entries.len(), 2);
	assert_eq!(entries[0].resolution, "ignore");
	assert_eq!(entries[1].resolution, "merge");

	let key = PairKey::new(a, b);

	for entry in &entries {
		assert_eq!(entry.record_a, key.record_a());
		assert_eq!(entry.record_b, key.record_b());
	}

	tdb.cleanup().await.expect("Failed to drop test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROSTER_PG_DSN to run."]
async fn watermark_roundtrips_and_overwrites() {
	let Some(base_dsn) = roster_testkit::env_dsn() else {
		eprintln!("Skipping watermark_roundtrips_and_overwrites; set ROSTER_PG_DSN.");

		return;
	};
	let tdb = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(tdb.dsn()).await;

	assert!(
		state::watermark(&db, state::SCAN_WATERMARK)
			.await
			.expect("Watermark fetch failed.")
			.is_none()
	);

	let first = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid timestamp.");
	let second = OffsetDateTime::from_unix_timestamp(1_700_100_000).expect("Valid timestamp.");

	state::set_watermark(&db, state::SCAN_WATERMARK, first).await.expect("Set failed.");
	state::set_watermark(&db, state::SCAN_WATERMARK, second).await.expect("Set failed.");

	let stored = state::watermark(&db, state::SCAN_WATERMARK)
		.await
		.expect("Watermark fetch failed.")
		.expect("Watermark must be stored.");

	assert_eq!(stored, second);

	tdb.cleanup().await.expect("Failed to drop test database.");
}
