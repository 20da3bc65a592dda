mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, MatchField, Matching, Postgres, Service, Storage, Worker};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.cutoff.is_finite() {
		return Err(Error::Validation {
			message: "matching.cutoff must be a finite number.".to_string(),
		});
	}
	if !(-1.0..=1.0).contains(&cfg.matching.cutoff) {
		return Err(Error::Validation {
			message: "matching.cutoff must be in the range -1.0-1.0.".to_string(),
		});
	}
	if cfg.matching.page_size == 0 {
		return Err(Error::Validation {
			message: "matching.page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.flush_size == 0 {
		return Err(Error::Validation {
			message: "matching.flush_size must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.prefilter_floor.is_finite() {
		return Err(Error::Validation {
			message: "matching.prefilter_floor must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.matching.prefilter_floor) {
		return Err(Error::Validation {
			message: "matching.prefilter_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.matching.fields.is_empty() {
		return Err(Error::Validation {
			message: "matching.fields must declare at least one field.".to_string(),
		});
	}

	let mut keys = HashSet::new();

	for field in &cfg.matching.fields {
		let key = field.key.as_str();

		if key.is_empty() {
			return Err(Error::Validation {
				message: "matching.fields entries must carry a non-empty key.".to_string(),
			});
		}
		if !keys.insert(key) {
			return Err(Error::Validation {
				message: format!("matching.fields key {key} is declared more than once."),
			});
		}
		if !field.weight.is_finite() || field.weight <= 0.0 {
			return Err(Error::Validation {
				message: format!("matching.fields.{key}.weight must be greater than zero."),
			});
		}
		if !matches!(
			field.mechanism.as_str(),
			"exact_or_nothing" | "weighted" | "exact_or_weighted"
		) {
			return Err(Error::Validation {
				message: format!(
					"matching.fields.{key}.mechanism must be one of exact_or_nothing, weighted, or exact_or_weighted."
				),
			});
		}
		if !matches!(field.strategy.as_str(), "name" | "email" | "date_of_birth" | "address") {
			return Err(Error::Validation {
				message: format!(
					"matching.fields.{key}.strategy must be one of name, email, date_of_birth, or address."
				),
			});
		}
	}

	if cfg.worker.scan_interval_secs == 0 {
		return Err(Error::Validation {
			message: "worker.scan_interval_secs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for field in &mut cfg.matching.fields {
		field.key = field.key.trim().to_string();
		field.mechanism = field.mechanism.trim().to_lowercase();
		field.strategy = field.strategy.trim().to_lowercase();
	}
}
