use std::collections::HashMap;

use sqlx::{PgExecutor, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use roster_domain::{Identification, PersonPatch, PersonRecord, person};

use crate::{
	Error, Result,
	db::Db,
	models::{CandidateRow, PersonRow},
};

/// Parameters of the page-cross-population candidate join.
pub struct CandidateJoin<'a> {
	pub seed_ids: &'a [Uuid],
	/// Restrict to `seed < other`; set for full-population walks where every
	/// pair would otherwise surface from both sides.
	pub ordered: bool,
	pub require_matching_sex: bool,
	pub prefilter_floor: f64,
	/// Also admit pairs whose addresses clear the prefilter floor. Set when
	/// an address field is configured, so a pair matching on nothing but its
	/// address can still reach the scorer.
	pub address_signal: bool,
}

pub async fn get_record(db: &Db, person_id: Uuid) -> Result<Option<PersonRecord>> {
	let Some(row) = fetch_person_exec(&db.pool, person_id).await? else {
		return Ok(None);
	};
	let identifications = identifications_exec(&db.pool, person_id).await?;

	Ok(Some(row.into_record(identifications)))
}

pub async fn identifications_tx(
	tx: &mut Transaction<'_, Postgres>,
	person_id: Uuid,
) -> Result<Vec<Identification>> {
	identifications_exec(&mut **tx, person_id).await
}

pub async fn insert_person(db: &Db, record: &PersonRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO persons (
	person_id,
	first_name,
	last_name,
	date_of_birth,
	sex,
	nationality,
	emails,
	phones,
	address,
	unique_identifier,
	consent_given,
	status,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
	)
	.bind(record.person_id)
	.bind(record.first_name.as_deref())
	.bind(record.last_name.as_deref())
	.bind(record.date_of_birth)
	.bind(record.sex.as_deref())
	.bind(record.nationality.as_deref())
	.bind(&record.emails)
	.bind(&record.phones)
	.bind(record.address.as_deref())
	.bind(record.unique_identifier.as_deref())
	.bind(record.consent_given)
	.bind(record.status.as_str())
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(&db.pool)
	.await?;

	for identification in &record.identifications {
		sqlx::query(
			"\
INSERT INTO person_identifications (person_id, kind, number)
VALUES ($1, $2, $3)
ON CONFLICT DO NOTHING",
		)
		.bind(record.person_id)
		.bind(identification.kind.as_str())
		.bind(identification.number.as_str())
		.execute(&db.pool)
		.await?;
	}

	Ok(())
}

/// Applies a partial update and returns the updated row. `None` fields keep
/// their stored values; `updated_at` is always refreshed so watermark scans
/// revisit the record.
pub async fn update_person_tx(
	tx: &mut Transaction<'_, Postgres>,
	person_id: Uuid,
	patch: &PersonPatch,
) -> Result<PersonRow> {
	let mut builder = sqlx::QueryBuilder::new("UPDATE persons SET updated_at = now()");

	if let Some(first_name) = &patch.first_name {
		builder.push(", first_name = ");
		builder.push_bind(first_name);
	}
	if let Some(last_name) = &patch.last_name {
		builder.push(", last_name = ");
		builder.push_bind(last_name);
	}
	if let Some(date_of_birth) = patch.date_of_birth {
		builder.push(", date_of_birth = ");
		builder.push_bind(date_of_birth);
	}
	if let Some(sex) = &patch.sex {
		builder.push(", sex = ");
		builder.push_bind(sex);
	}
	if let Some(nationality) = &patch.nationality {
		builder.push(", nationality = ");
		builder.push_bind(nationality);
	}
	if let Some(emails) = &patch.emails {
		builder.push(", emails = ");
		builder.push_bind(emails);
	}
	if let Some(phones) = &patch.phones {
		builder.push(", phones = ");
		builder.push_bind(phones);
	}
	if let Some(address) = &patch.address {
		builder.push(", address = ");
		builder.push_bind(address);
	}
	if let Some(unique_identifier) = &patch.unique_identifier {
		builder.push(", unique_identifier = ");
		builder.push_bind(unique_identifier);
	}
	if let Some(consent_given) = patch.consent_given {
		builder.push(", consent_given = ");
		builder.push_bind(consent_given);
	}

	builder.push(" WHERE person_id = ");
	builder.push_bind(person_id);
	builder.push(
		" RETURNING person_id, first_name, last_name, date_of_birth, sex, nationality, emails, phones,
	address, unique_identifier, consent_given, status, created_at, updated_at",
	);

	let row: Option<PersonRow> = builder.build_query_as().fetch_optional(&mut **tx).await?;

	row.ok_or_else(|| Error::NotFound(format!("Person {person_id} does not exist.")))
}

/// Soft-retires a merged-away record: status flips to `merged`, contact and
/// consent fields are cleared, names and date of birth stay for audit.
pub async fn tombstone_person_tx(
	tx: &mut Transaction<'_, Postgres>,
	person_id: Uuid,
) -> Result<()> {
	let result = sqlx::query(
		"\
UPDATE persons
SET
	status = $1,
	emails = '{}'::text[],
	phones = '{}'::text[],
	address = NULL,
	unique_identifier = NULL,
	consent_given = NULL,
	updated_at = now()
WHERE person_id = $2",
	)
	.bind(person::STATUS_MERGED)
	.bind(person_id)
	.execute(&mut **tx)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Person {person_id} does not exist.")));
	}

	sqlx::query("DELETE FROM person_identifications WHERE person_id = $1")
		.bind(person_id)
		.execute(&mut **tx)
		.await?;

	Ok(())
}

pub async fn count_active(db: &Db) -> Result<i64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM persons WHERE status = 'active'")
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

pub async fn list_records(db: &Db, limit: i64, offset: i64) -> Result<Vec<PersonRecord>> {
	let rows: Vec<PersonRow> = sqlx::query_as(
		"\
SELECT person_id, first_name, last_name, date_of_birth, sex, nationality, emails, phones,
	address, unique_identifier, consent_given, status, created_at, updated_at
FROM persons
WHERE status = 'active'
ORDER BY person_id
LIMIT $1 OFFSET $2",
	)
	.bind(limit)
	.bind(offset)
	.fetch_all(&db.pool)
	.await?;
	let ids: Vec<Uuid> = rows.iter().map(|row| row.person_id).collect();
	let mut identifications = identifications_for(db, &ids).await?;
	let records = rows
		.into_iter()
		.map(|row| {
			let docs = identifications.remove(&row.person_id).unwrap_or_default();

			row.into_record(docs)
		})
		.collect();

	Ok(records)
}

/// One page of seed ids for the weighted pass, walked by keyset cursor.
/// `since` restricts seeds to records changed at or after the watermark.
pub async fn seed_page(
	db: &Db,
	after: Option<Uuid>,
	since: Option<OffsetDateTime>,
	limit: i64,
) -> Result<Vec<Uuid>> {
	let mut builder =
		sqlx::QueryBuilder::new("SELECT person_id FROM persons WHERE status = 'active'");

	if let Some(since) = since {
		builder.push(" AND updated_at >= ");
		builder.push_bind(since);
	}
	if let Some(after) = after {
		builder.push(" AND person_id > ");
		builder.push_bind(after);
	}

	builder.push(" ORDER BY person_id LIMIT ");
	builder.push_bind(limit);

	let ids = builder.build_query_scalar().fetch_all(&db.pool).await?;

	Ok(ids)
}

/// Crosses one seed page against the active population in a single query.
/// The join excludes self pairs, shared unique identifiers, and document
/// matches, and only passes pairs showing at least one blocking signal:
/// equal date of birth, a shared email domain, trigram name similarity at
/// or above the prefilter floor, or (with an address field configured)
/// trigram address similarity at or above the floor. The signals are
/// returned alongside the paired comparison columns; authoritative scoring
/// happens host-side.
pub async fn candidate_rows(db: &Db, join: &CandidateJoin<'_>) -> Result<Vec<CandidateRow>> {
	let mut builder = sqlx::QueryBuilder::new(
		"\
SELECT
	a.person_id AS seed_id,
	a.first_name AS seed_first_name,
	a.last_name AS seed_last_name,
	a.date_of_birth AS seed_date_of_birth,
	a.emails AS seed_emails,
	a.address AS seed_address,
	b.person_id AS other_id,
	b.first_name AS other_first_name,
	b.last_name AS other_last_name,
	b.date_of_birth AS other_date_of_birth,
	b.emails AS other_emails,
	b.address AS other_address,
	(a.date_of_birth IS NOT NULL AND b.date_of_birth IS NOT NULL
		AND a.date_of_birth = b.date_of_birth) AS dob_equal,
	EXISTS (
		SELECT 1
		FROM unnest(a.emails) ea
		JOIN unnest(b.emails) eb
			ON split_part(lower(eb), '@', 2) = split_part(lower(ea), '@', 2)
		WHERE split_part(lower(ea), '@', 2) <> ''
	) AS shared_email_domain,
	similarity(
		lower(coalesce(a.first_name, '') || ' ' || coalesce(a.last_name, '')),
		lower(coalesce(b.first_name, '') || ' ' || coalesce(b.last_name, ''))
	)::double precision AS name_prefilter
FROM persons a
JOIN persons b
	ON b.person_id <> a.person_id
	AND b.status = 'active'
WHERE a.status = 'active'
	AND a.person_id = ANY(",
	);

	builder.push_bind(join.seed_ids);
	builder.push(")");

	if join.ordered {
		builder.push(" AND b.person_id > a.person_id");
	}
	if join.require_matching_sex {
		builder.push(" AND (a.sex IS NULL OR b.sex IS NULL OR a.sex = b.sex)");
	}

	builder.push(
		"\
 AND (a.unique_identifier IS NULL OR b.unique_identifier IS NULL
		OR b.unique_identifier <> a.unique_identifier)
	AND NOT EXISTS (
		SELECT 1
		FROM person_identifications ia
		JOIN person_identifications ib
			ON ib.kind = ia.kind
			AND ib.number = ia.number
		WHERE ia.person_id = a.person_id
			AND ib.person_id = b.person_id
	)
	AND (
		(a.date_of_birth IS NOT NULL AND b.date_of_birth IS NOT NULL
			AND a.date_of_birth = b.date_of_birth)
		OR EXISTS (
			SELECT 1
			FROM unnest(a.emails) ea
			JOIN unnest(b.emails) eb
				ON split_part(lower(eb), '@', 2) = split_part(lower(ea), '@', 2)
			WHERE split_part(lower(ea), '@', 2) <> ''
		)
		OR similarity(
			lower(coalesce(a.first_name, '') || ' ' || coalesce(a.last_name, '')),
			lower(coalesce(b.first_name, '') || ' ' || coalesce(b.last_name, ''))
		) >= ",
	);
	builder.push_bind(join.prefilter_floor);

	// A NULL address on either side makes the comparison NULL, never true.
	if join.address_signal {
		builder.push(" OR similarity(lower(a.address), lower(b.address)) >= ");
		builder.push_bind(join.prefilter_floor);
	}

	builder.push(") ORDER BY a.person_id, b.person_id");

	let rows = builder.build_query_as().fetch_all(&db.pool).await?;

	Ok(rows)
}

/// All active pairs sharing a unique identifier or an identification
/// document, smaller id first.
pub async fn exact_pairs(db: &Db, require_matching_sex: bool) -> Result<Vec<(Uuid, Uuid)>> {
	let mut builder = sqlx::QueryBuilder::new(
		"\
SELECT a.person_id AS record_a, b.person_id AS record_b
FROM persons a
JOIN persons b
	ON b.person_id > a.person_id
	AND b.status = 'active'
	AND b.unique_identifier = a.unique_identifier
WHERE a.status = 'active'
	AND a.unique_identifier IS NOT NULL",
	);

	if require_matching_sex {
		builder.push(" AND (a.sex IS NULL OR b.sex IS NULL OR a.sex = b.sex)");
	}

	builder.push(
		"\
 UNION
SELECT ia.person_id AS record_a, ib.person_id AS record_b
FROM person_identifications ia
JOIN person_identifications ib
	ON ib.person_id > ia.person_id
	AND ib.kind = ia.kind
	AND ib.number = ia.number
JOIN persons a ON a.person_id = ia.person_id AND a.status = 'active'
JOIN persons b ON b.person_id = ib.person_id AND b.status = 'active'",
	);

	if require_matching_sex {
		builder.push(" WHERE (a.sex IS NULL OR b.sex IS NULL OR a.sex = b.sex)");
	}

	builder.push(" ORDER BY record_a, record_b");

	let pairs = builder.build_query_as().fetch_all(&db.pool).await?;

	Ok(pairs)
}

async fn fetch_person_exec<'e, E>(executor: E, person_id: Uuid) -> Result<Option<PersonRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as(
		"\
SELECT person_id, first_name, last_name, date_of_birth, sex, nationality, emails, phones,
	address, unique_identifier, consent_given, status, created_at, updated_at
FROM persons
WHERE person_id = $1",
	)
	.bind(person_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

async fn identifications_exec<'e, E>(executor: E, person_id: Uuid) -> Result<Vec<Identification>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<(String, String)> = sqlx::query_as(
		"\
SELECT kind, number
FROM person_identifications
WHERE person_id = $1
ORDER BY kind, number",
	)
	.bind(person_id)
	.fetch_all(executor)
	.await?;
	let identifications =
		rows.into_iter().map(|(kind, number)| Identification { kind, number }).collect();

	Ok(identifications)
}

async fn identifications_for(
	db: &Db,
	person_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Identification>>> {
	if person_ids.is_empty() {
		return Ok(HashMap::new());
	}

	let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
		"\
SELECT person_id, kind, number
FROM person_identifications
WHERE person_id = ANY($1)
ORDER BY person_id, kind, number",
	)
	.bind(person_ids)
	.fetch_all(&db.pool)
	.await?;
	let mut grouped: HashMap<Uuid, Vec<Identification>> = HashMap::new();

	for (person_id, kind, number) in rows {
		grouped.entry(person_id).or_default().push(Identification { kind, number });
	}

	Ok(grouped)
}
