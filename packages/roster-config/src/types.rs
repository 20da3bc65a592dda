use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub matching: Matching,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Matching {
	/// Candidates scoring below this aggregate are never surfaced or stored.
	#[serde(default = "default_cutoff")]
	pub cutoff: f64,
	/// Seed records fetched per page during a scan.
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	/// Candidates buffered before a multi-row upsert.
	#[serde(default = "default_flush_size")]
	pub flush_size: u32,
	/// When set, records with differing recorded sex are never paired.
	#[serde(default = "default_require_matching_sex")]
	pub require_matching_sex: bool,
	/// Trigram similarity floor for the in-database candidate prefilter. Only
	/// gates which pairs reach the host-side scorer; never part of the score.
	#[serde(default = "default_prefilter_floor")]
	pub prefilter_floor: f64,
	pub fields: Vec<MatchField>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MatchField {
	pub key: String,
	pub weight: f64,
	pub mechanism: String,
	pub strategy: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Worker {
	#[serde(default = "default_scan_interval_secs")]
	pub scan_interval_secs: u64,
}
impl Default for Worker {
	fn default() -> Self {
		Self { scan_interval_secs: default_scan_interval_secs() }
	}
}

fn default_cutoff() -> f64 {
	0.1
}

fn default_page_size() -> u32 {
	1_000
}

fn default_flush_size() -> u32 {
	1_000
}

fn default_require_matching_sex() -> bool {
	true
}

fn default_prefilter_floor() -> f64 {
	0.05
}

fn default_scan_interval_secs() -> u64 {
	300
}
