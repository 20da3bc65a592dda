use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use roster_domain::{DuplicateCandidate, PairKey};
use roster_storage::{
	duplicates,
	models::CandidateRow,
	persons::{self, CandidateJoin},
};

use crate::{Error, Result, RosterService};

const RETRY_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// One matcher run. With `since` set, only records changed at or after the
/// watermark seed the comparison; without it, the full active population is
/// walked.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanRequest {
	#[serde(with = "roster_domain::time_serde::option")]
	pub since: Option<OffsetDateTime>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct ScanSummary {
	pub pages: u64,
	pub exact: u64,
	pub weighted: u64,
	pub skipped: u64,
}

impl RosterService {
	/// Runs the exact pre-pass and the paged weighted pass, upserting every
	/// candidate at or above the cutoff. Restart-safe: upserts are
	/// idempotent, so an interrupted run is simply re-run from the same
	/// watermark.
	pub async fn scan(&self, req: ScanRequest) -> Result<ScanSummary> {
		let matching = &self.cfg.matching;
		let flush_size = matching.flush_size as usize;
		let mut summary = ScanSummary::default();
		let mut buffer: Vec<DuplicateCandidate> = Vec::new();

		// Exact pre-pass: identical identifiers or identification documents
		// score 1 with no per-field breakdown, and are excluded from the
		// weighted pass below.
		let exact_pairs =
			persons::exact_pairs(&self.db, matching.require_matching_sex).await?;
		let mut exclusion: HashSet<PairKey> = HashSet::with_capacity(exact_pairs.len());

		for (record_a, record_b) in exact_pairs {
			let key = PairKey::new(record_a, record_b);

			if !exclusion.insert(key) {
				continue;
			}

			buffer.push(DuplicateCandidate::exact(record_a, record_b));

			summary.exact += 1;

			if buffer.len() >= flush_size {
				duplicates::upsert(&self.db, &buffer).await?;
				buffer.clear();
			}
		}

		tracing::info!(exact = summary.exact, "Exact pre-pass finished.");

		// Weighted pass: walk seed pages by keyset cursor, one join query per
		// page, authoritative scoring host-side. A full-population walk
		// restricts the join to seed < other so each pair surfaces once; a
		// watermark walk crosses changed records against the whole
		// population, and the run-level seen set drops the second sighting
		// when both members changed.
		let ordered = req.since.is_none();
		let page_size = matching.page_size as i64;
		let mut seen: HashSet<PairKey> = HashSet::new();
		let mut after: Option<Uuid> = None;

		loop {
			let seeds = persons::seed_page(&self.db, after, req.since, page_size).await?;

			if seeds.is_empty() {
				break;
			}

			after = seeds.last().copied();

			let rows = self.page_candidate_rows(&seeds, ordered, matching).await?;
			let scored = self.score_candidate_rows(rows).await?;
			let mut kept = 0u64;

			summary.skipped += scored.skipped;

			for pair in scored.pairs {
				let key = PairKey::new(pair.seed_id, pair.other_id);

				if exclusion.contains(&key) || !seen.insert(key) {
					continue;
				}
				if pair.score.weighted_score < matching.cutoff {
					continue;
				}

				buffer.push(DuplicateCandidate {
					record_a: Some(key.record_a()),
					record_b: key.record_b(),
					field_scores: pair.score.field_scores,
					weighted_score: pair.score.weighted_score,
				});

				kept += 1;
				summary.weighted += 1;

				if buffer.len() >= flush_size {
					duplicates::upsert(&self.db, &buffer).await?;
					buffer.clear();
				}
			}

			summary.pages += 1;

			tracing::info!(
				page = summary.pages,
				seeds = seeds.len(),
				kept,
				"Scored a seed page.",
			);

			if seeds.len() < page_size as usize {
				break;
			}
		}

		if !buffer.is_empty() {
			duplicates::upsert(&self.db, &buffer).await?;
		}

		tracing::info!(
			pages = summary.pages,
			exact = summary.exact,
			weighted = summary.weighted,
			skipped = summary.skipped,
			"Duplicate scan finished.",
		);

		Ok(summary)
	}

	/// Fetches one page's candidate join, retrying transient failures with
	/// exponential backoff before giving up on the run.
	async fn page_candidate_rows(
		&self,
		seeds: &[Uuid],
		ordered: bool,
		matching: &roster_config::Matching,
	) -> Result<Vec<CandidateRow>> {
		let join = CandidateJoin {
			seed_ids: seeds,
			ordered,
			require_matching_sex: matching.require_matching_sex,
			prefilter_floor: matching.prefilter_floor,
			address_signal: self.scoring.wants_address(),
		};
		let mut attempt = 0;

		loop {
			match persons::candidate_rows(&self.db, &join).await {
				Ok(rows) => return Ok(rows),
				Err(roster_storage::Error::Sqlx(err))
					if is_transient(&err) && attempt + 1 < RETRY_ATTEMPTS =>
				{
					attempt += 1;

					let backoff = backoff_for_attempt(attempt);

					tracing::warn!(
						error = %err,
						attempt,
						backoff_ms = backoff.as_millis() as u64,
						"Transient storage error on a candidate page; backing off.",
					);

					tokio::time::sleep(backoff).await;
				},
				Err(err) => return Err(Error::from(err)),
			}
		}
	}
}

fn is_transient(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

fn backoff_for_attempt(attempt: u32) -> Duration {
	let exponent = attempt.saturating_sub(1).min(6);
	let millis = (BASE_BACKOFF_MS << exponent).min(MAX_BACKOFF_MS);

	Duration::from_millis(millis)
}
