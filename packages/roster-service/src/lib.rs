pub mod check;
pub mod denormalise;
pub mod list;
pub mod resolve;
pub mod scan;

use std::{future::Future, pin::Pin, sync::Arc};

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub use check::{CheckRequest, CheckResponse};
pub use denormalise::DenormalisedDuplicateRecord;
pub use list::{DuplicateRecord, ListDuplicatesRequest, ListDuplicatesResponse};
pub use resolve::{IgnoreRequest, MergeRequest, MergeResponse};
pub use scan::{ScanRequest, ScanSummary};

use roster_config::Config;
use roster_domain::{
	ExternalScores, Mechanism, PairScore, PersonPatch, PersonRecord, ScoringConfig, ScoringField,
	Strategy, similarity,
};
use roster_storage::{db::Db, models::CandidateRow, persons};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The entity CRUD engine that owns person records. The matcher reads and
/// mutates records only through this capability; the default implementation
/// is backed by the shared registry database, but a deployment fronted by a
/// separate entity service supplies its own.
pub trait EntityEngine
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PersonRecord>>>;

	/// Applies a partial update inside the caller's transaction and returns
	/// the updated record. Must fail with [`Error::NotFound`] when the record
	/// does not exist.
	fn update<'a>(
		&'a self,
		tx: &'a mut Transaction<'static, Postgres>,
		id: Uuid,
		patch: &'a PersonPatch,
	) -> BoxFuture<'a, Result<PersonRecord>>;

	/// Soft-retires a merged-away record inside the caller's transaction.
	fn tombstone<'a>(
		&'a self,
		tx: &'a mut Transaction<'static, Postgres>,
		id: Uuid,
	) -> BoxFuture<'a, Result<()>>;

	fn count<'a>(&'a self) -> BoxFuture<'a, Result<u64>>;

	fn list<'a>(&'a self, limit: i64, offset: i64) -> BoxFuture<'a, Result<Vec<PersonRecord>>>;
}

/// Pluggable residence comparison. Scores are in [0, 1]; one call covers a
/// whole page of pairs so an implementation backed by a remote service pays
/// one round trip per page.
pub trait AddressSimilarity
where
	Self: Send + Sync,
{
	fn score_batch<'a>(&'a self, pairs: &'a [(String, String)]) -> BoxFuture<'a, Result<Vec<f64>>>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Capability error: {message}")]
	Capability { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<roster_storage::Error> for Error {
	fn from(err: roster_storage::Error) -> Self {
		match err {
			roster_storage::Error::NotFound(message) => Self::NotFound { message },
			roster_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			roster_storage::Error::Sqlx(err) => Self::Storage { message: err.to_string() },
		}
	}
}

#[derive(Clone)]
pub struct Collaborators {
	pub entity: Arc<dyn EntityEngine>,
	pub address: Arc<dyn AddressSimilarity>,
}
impl Collaborators {
	pub fn new(entity: Arc<dyn EntityEngine>, address: Arc<dyn AddressSimilarity>) -> Self {
		Self { entity, address }
	}

	/// Defaults backed by the shared registry database: person rows for the
	/// entity engine, host-side Dice similarity for addresses.
	pub fn pg(pool: PgPool) -> Self {
		Self {
			entity: Arc::new(PgEntityEngine { pool }),
			address: Arc::new(DiceAddressSimilarity),
		}
	}
}

pub struct RosterService {
	pub cfg: Config,
	pub scoring: ScoringConfig,
	pub db: Db,
	pub collaborators: Collaborators,
}
impl RosterService {
	pub fn new(cfg: Config, db: Db) -> Result<Self> {
		let collaborators = Collaborators::pg(db.pool.clone());

		Self::with_collaborators(cfg, db, collaborators)
	}

	pub fn with_collaborators(cfg: Config, db: Db, collaborators: Collaborators) -> Result<Self> {
		let scoring = scoring_config(&cfg.matching)?;

		Ok(Self { cfg, scoring, db, collaborators })
	}
}

struct PgEntityEngine {
	pool: PgPool,
}
impl PgEntityEngine {
	fn db(&self) -> Db {
		Db { pool: self.pool.clone() }
	}
}
impl EntityEngine for PgEntityEngine {
	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PersonRecord>>> {
		Box::pin(async move {
			let db = self.db();
			let record = persons::get_record(&db, id).await?;

			Ok(record)
		})
	}

	fn update<'a>(
		&'a self,
		tx: &'a mut Transaction<'static, Postgres>,
		id: Uuid,
		patch: &'a PersonPatch,
	) -> BoxFuture<'a, Result<PersonRecord>> {
		Box::pin(async move {
			let row = persons::update_person_tx(tx, id, patch).await?;
			let identifications = persons::identifications_tx(tx, id).await?;

			Ok(row.into_record(identifications))
		})
	}

	fn tombstone<'a>(
		&'a self,
		tx: &'a mut Transaction<'static, Postgres>,
		id: Uuid,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			persons::tombstone_person_tx(tx, id).await?;

			Ok(())
		})
	}

	fn count<'a>(&'a self) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let db = self.db();
			let count = persons::count_active(&db).await?;

			Ok(count.max(0) as u64)
		})
	}

	fn list<'a>(&'a self, limit: i64, offset: i64) -> BoxFuture<'a, Result<Vec<PersonRecord>>> {
		Box::pin(async move {
			let db = self.db();
			let records = persons::list_records(&db, limit, offset).await?;

			Ok(records)
		})
	}
}

struct DiceAddressSimilarity;
impl AddressSimilarity for DiceAddressSimilarity {
	fn score_batch<'a>(&'a self, pairs: &'a [(String, String)]) -> BoxFuture<'a, Result<Vec<f64>>> {
		let scores = pairs.iter().map(|(a, b)| similarity::address_score(a, b)).collect();

		Box::pin(async move { Ok(scores) })
	}
}

pub(crate) struct ScoredPair {
	pub(crate) seed_id: Uuid,
	pub(crate) other_id: Uuid,
	pub(crate) score: PairScore,
}

pub(crate) struct ScoredRows {
	pub(crate) pairs: Vec<ScoredPair>,
	pub(crate) skipped: u64,
}

impl RosterService {
	/// Scores one join result host-side. Capability-backed address scores are
	/// gathered in a single batch call before aggregation; a pair whose
	/// capability score comes back non-finite is logged and skipped rather
	/// than failing the page.
	pub(crate) async fn score_candidate_rows(&self, rows: Vec<CandidateRow>) -> Result<ScoredRows> {
		let mut address_scores: Vec<Option<f64>> = vec![None; rows.len()];

		if self.scoring.wants_address() {
			let mut pairs = Vec::new();
			let mut indexes = Vec::new();

			for (index, row) in rows.iter().enumerate() {
				if let (Some(a), Some(b)) = (row.seed_address.as_deref(), row.other_address.as_deref())
				{
					pairs.push((a.to_string(), b.to_string()));
					indexes.push(index);
				}
			}

			if !pairs.is_empty() {
				let scores = self.collaborators.address.score_batch(&pairs).await?;

				if scores.len() != pairs.len() {
					return Err(Error::Capability {
						message: format!(
							"Address capability returned {} scores for {} pairs.",
							scores.len(),
							pairs.len()
						),
					});
				}

				for (index, score) in indexes.into_iter().zip(scores) {
					address_scores[index] = Some(score);
				}
			}
		}

		let mut scored = Vec::with_capacity(rows.len());
		let mut skipped = 0;

		for (row, address) in rows.into_iter().zip(address_scores) {
			if let Some(score) = address
				&& !score.is_finite()
			{
				tracing::warn!(
					seed = %row.seed_id,
					other = %row.other_id,
					score,
					"Address capability returned a non-finite score; skipping the pair.",
				);

				skipped += 1;

				continue;
			}

			let score = self.scoring.score_pair(
				&row.seed_fields(),
				&row.other_fields(),
				&ExternalScores { address },
			);

			scored.push(ScoredPair { seed_id: row.seed_id, other_id: row.other_id, score });
		}

		Ok(ScoredRows { pairs: scored, skipped })
	}
}

fn scoring_config(matching: &roster_config::Matching) -> Result<ScoringConfig> {
	let mut fields = Vec::with_capacity(matching.fields.len());

	for field in &matching.fields {
		let mechanism = match field.mechanism.as_str() {
			"exact_or_nothing" => Mechanism::ExactOrNothing,
			"weighted" => Mechanism::Weighted,
			"exact_or_weighted" => Mechanism::ExactOrWeighted,
			other =>
				return Err(Error::InvalidRequest {
					message: format!("Unknown scoring mechanism {other}."),
				}),
		};
		let strategy = match field.strategy.as_str() {
			"name" => Strategy::Name,
			"email" => Strategy::Email,
			"date_of_birth" => Strategy::DateOfBirth,
			"address" => Strategy::Address,
			other =>
				return Err(Error::InvalidRequest {
					message: format!("Unknown scoring strategy {other}."),
				}),
		};

		fields.push(ScoringField {
			key: field.key.clone(),
			weight: field.weight,
			mechanism,
			strategy,
		});
	}

	ScoringConfig::new(fields)
		.map_err(|err| Error::InvalidRequest { message: err.to_string() })
}
