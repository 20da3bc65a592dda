//! Staging for ad-hoc duplicate checks. Records under review are written into
//! `scratch_candidates` under a per-call op_id, run through the same join
//! cores as a scan, and removed again whether the check succeeds or fails.

use sqlx::QueryBuilder;
use uuid::Uuid;

use roster_domain::DraftRecord;

use crate::{Error, Result, db::Db, models::CandidateRow};

/// One ad-hoc record staged under an operation: the caller assigns a seed id
/// up front (the draft's own id when it has one, a fresh one otherwise) so
/// join output can be mapped back to the input.
pub struct StagedSeed<'a> {
	pub seed_id: Uuid,
	pub draft: &'a DraftRecord,
}

pub async fn stage(db: &Db, op_id: Uuid, seeds: &[StagedSeed<'_>]) -> Result<()> {
	if seeds.is_empty() {
		return Ok(());
	}

	let mut rows = Vec::with_capacity(seeds.len());

	for seed in seeds {
		let identifications =
			serde_json::to_value(&seed.draft.identifications).map_err(|err| {
				Error::InvalidArgument(format!(
					"Failed to encode identifications for staged record {}: {err}.",
					seed.seed_id
				))
			})?;

		rows.push((seed, identifications));
	}

	let mut builder = QueryBuilder::new(
		"\
INSERT INTO scratch_candidates (
	op_id,
	seed_id,
	first_name,
	last_name,
	date_of_birth,
	sex,
	emails,
	address,
	unique_identifier,
	identifications
) ",
	);

	builder.push_values(rows, |mut b, (seed, identifications)| {
		b.push_bind(op_id)
			.push_bind(seed.seed_id)
			.push_bind(seed.draft.first_name.as_deref())
			.push_bind(seed.draft.last_name.as_deref())
			.push_bind(seed.draft.date_of_birth)
			.push_bind(seed.draft.sex.as_deref())
			.push_bind(&seed.draft.emails)
			.push_bind(seed.draft.address.as_deref())
			.push_bind(seed.draft.unique_identifier.as_deref())
			.push_bind(identifications);
	});

	builder.build().execute(&db.pool).await?;

	Ok(())
}

pub async fn teardown(db: &Db, op_id: Uuid) -> Result<()> {
	sqlx::query("DELETE FROM scratch_candidates WHERE op_id = $1")
		.bind(op_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Staged records paired with active population records sharing a unique
/// identifier or an identification document.
pub async fn exact_matches(
	db: &Db,
	op_id: Uuid,
	require_matching_sex: bool,
) -> Result<Vec<(Uuid, Uuid)>> {
	let mut builder = QueryBuilder::new(
		"\
SELECT s.seed_id, p.person_id
FROM scratch_candidates s
JOIN persons p
	ON p.status = 'active'
	AND p.person_id <> s.seed_id
	AND p.unique_identifier = s.unique_identifier
WHERE s.op_id = ",
	);

	builder.push_bind(op_id);
	builder.push(" AND s.unique_identifier IS NOT NULL");

	if require_matching_sex {
		builder.push(" AND (s.sex IS NULL OR p.sex IS NULL OR p.sex = s.sex)");
	}

	builder.push(
		"\
 UNION
SELECT s.seed_id, p.person_id
FROM scratch_candidates s
JOIN LATERAL jsonb_to_recordset(s.identifications)
	AS doc (kind TEXT, number TEXT) ON TRUE
JOIN person_identifications pi
	ON pi.kind = doc.kind
	AND pi.number = doc.number
JOIN persons p
	ON p.person_id = pi.person_id
	AND p.status = 'active'
	AND p.person_id <> s.seed_id
WHERE s.op_id = ",
	);
	builder.push_bind(op_id);

	if require_matching_sex {
		builder.push(" AND (s.sex IS NULL OR p.sex IS NULL OR p.sex = s.sex)");
	}

	builder.push(" ORDER BY 1, 2");

	let pairs = builder.build_query_as().fetch_all(&db.pool).await?;

	Ok(pairs)
}

/// Crosses the staged records against the active population in one query,
/// with the same exclusions and blocking signals as the page join over
/// persisted records.
pub async fn candidate_rows(
	db: &Db,
	op_id: Uuid,
	require_matching_sex: bool,
	prefilter_floor: f64,
	address_signal: bool,
) -> Result<Vec<CandidateRow>> {
	let mut builder = QueryBuilder::new(
		"\
SELECT
	s.seed_id AS seed_id,
	s.first_name AS seed_first_name,
	s.last_name AS seed_last_name,
	s.date_of_birth AS seed_date_of_birth,
	s.emails AS seed_emails,
	s.address AS seed_address,
	b.person_id AS other_id,
	b.first_name AS other_first_name,
	b.last_name AS other_last_name,
	b.date_of_birth AS other_date_of_birth,
	b.emails AS other_emails,
	b.address AS other_address,
	(s.date_of_birth IS NOT NULL AND b.date_of_birth IS NOT NULL
		AND s.date_of_birth = b.date_of_birth) AS dob_equal,
	EXISTS (
		SELECT 1
		FROM unnest(s.emails) ea
		JOIN unnest(b.emails) eb
			ON split_part(lower(eb), '@', 2) = split_part(lower(ea), '@', 2)
		WHERE split_part(lower(ea), '@', 2) <> ''
	) AS shared_email_domain,
	similarity(
		lower(coalesce(s.first_name, '') || ' ' || coalesce(s.last_name, '')),
		lower(coalesce(b.first_name, '') || ' ' || coalesce(b.last_name, ''))
	)::double precision AS name_prefilter
FROM scratch_candidates s
JOIN persons b
	ON b.person_id <> s.seed_id
	AND b.status = 'active'
WHERE s.op_id = ",
	);

	builder.push_bind(op_id);

	if require_matching_sex {
		builder.push(" AND (s.sex IS NULL OR b.sex IS NULL OR s.sex = b.sex)");
	}

	builder.push(
		"\
 AND (s.unique_identifier IS NULL OR b.unique_identifier IS NULL
		OR b.unique_identifier <> s.unique_identifier)
	AND NOT EXISTS (
		SELECT 1
		FROM jsonb_to_recordset(s.identifications) AS doc (kind TEXT, number TEXT)
		JOIN person_identifications pi
			ON pi.kind = doc.kind
			AND pi.number = doc.number
		WHERE pi.person_id = b.person_id
	)
	AND (
		(s.date_of_birth IS NOT NULL AND b.date_of_birth IS NOT NULL
			AND s.date_of_birth = b.date_of_birth)
		OR EXISTS (
			SELECT 1
			FROM unnest(s.emails) ea
			JOIN unnest(b.emails) eb
				ON split_part(lower(eb), '@', 2) = split_part(lower(ea), '@', 2)
			WHERE split_part(lower(ea), '@', 2) <> ''
		)
		OR similarity(
			lower(coalesce(s.first_name, '') || ' ' || coalesce(s.last_name, '')),
			lower(coalesce(b.first_name, '') || ' ' || coalesce(b.last_name, ''))
		) >= ",
	);
	builder.push_bind(prefilter_floor);

	if address_signal {
		builder.push(" OR similarity(lower(s.address), lower(b.address)) >= ");
		builder.push_bind(prefilter_floor);
	}

	builder.push(") ORDER BY s.seed_id, b.person_id");

	let rows = builder.build_query_as().fetch_all(&db.pool).await?;

	Ok(rows)
}
