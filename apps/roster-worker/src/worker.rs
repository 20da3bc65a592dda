use std::time::Duration;

use color_eyre::Result;
use time::OffsetDateTime;
use tokio::time as tokio_time;

use roster_service::{RosterService, ScanRequest};
use roster_storage::state;

pub struct WorkerState {
	pub service: RosterService,
	pub interval: Duration,
}

/// The external scheduler the matcher expects: every interval, run a scan
/// seeded from the persisted watermark (the full population when none is
/// stored yet) and advance the watermark on success. A failed cycle keeps
/// the old watermark and is retried next interval; re-running a scan is safe
/// because upserts are idempotent.
pub async fn run_worker(state: WorkerState) -> Result<()> {
	tracing::info!(interval_secs = state.interval.as_secs(), "Matcher worker started.");

	loop {
		if let Err(err) = run_cycle(&state).await {
			tracing::error!(error = %err, "Matcher cycle failed; retrying next interval.");
		}

		tokio_time::sleep(state.interval).await;
	}
}

async fn run_cycle(state: &WorkerState) -> Result<()> {
	// Watermark advances to the cycle's start, not its end, so records that
	// change while the scan runs are revisited next cycle.
	let started_at = OffsetDateTime::now_utc();
	let since = state::watermark(&state.service.db, state::SCAN_WATERMARK).await?;
	let summary = state.service.scan(ScanRequest { since }).await?;

	state::set_watermark(&state.service.db, state::SCAN_WATERMARK, started_at).await?;

	tracing::info!(
		since = ?since,
		pages = summary.pages,
		exact = summary.exact,
		weighted = summary.weighted,
		skipped = summary.skipped,
		"Matcher cycle finished.",
	);

	Ok(())
}
