use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
	candidate::FieldScore,
	person::RecordFields,
	similarity,
};

/// Bounds of the aggregate score domain. Individual strategies stay within
/// [0, 1]; a pluggable field could in principle report a penalty, so the
/// aggregate is clamped to the documented [-1, 1] domain.
const SCORE_MIN: f64 = -1.0;
const SCORE_MAX: f64 = 1.0;

/// How a field's raw score turns into its weighted contribution.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
	/// The field contributes only a binary exact-match signal: full weight on
	/// an exact match, nothing otherwise.
	ExactOrNothing,
	/// The field always contributes raw × weight.
	Weighted,
	/// An exact match short-circuits to the full weight; otherwise the field
	/// contributes its normal partial weighted score.
	ExactOrWeighted,
}

/// Which comparison a field runs. Strategies are dispatched explicitly so a
/// configuration can never smuggle in a callable with a mismatched shape.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	Name,
	Email,
	DateOfBirth,
	/// Residence comparison delegated to the injected address capability;
	/// the capability's score arrives through [`ExternalScores`].
	Address,
}

#[derive(Clone, Debug)]
pub struct ScoringField {
	pub key: String,
	pub weight: f64,
	pub mechanism: Mechanism,
	pub strategy: Strategy,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
	#[error("Scoring configuration must declare at least one field.")]
	EmptyFields,
	#[error("Scoring field {key} has non-positive weight {weight}.")]
	NonPositiveWeight { key: String, weight: f64 },
	#[error("Scoring field {key} is declared more than once.")]
	DuplicateKey { key: String },
}

/// Validated, immutable set of field comparisons. Built once at startup; the
/// summed weight is cached and used as the sole normalizer for every
/// aggregate score.
#[derive(Clone, Debug)]
pub struct ScoringConfig {
	fields: Vec<ScoringField>,
	total_weight: f64,
}
impl ScoringConfig {
	pub fn new(fields: Vec<ScoringField>) -> Result<Self, ScoringError> {
		if fields.is_empty() {
			return Err(ScoringError::EmptyFields);
		}

		let mut seen = HashSet::new();

		for field in &fields {
			if !(field.weight > 0.0) || !field.weight.is_finite() {
				return Err(ScoringError::NonPositiveWeight {
					key: field.key.clone(),
					weight: field.weight,
				});
			}
			if !seen.insert(field.key.clone()) {
				return Err(ScoringError::DuplicateKey { key: field.key.clone() });
			}
		}

		let total_weight = fields.iter().map(|field| field.weight).sum();

		Ok(Self { fields, total_weight })
	}

	pub fn fields(&self) -> &[ScoringField] {
		&self.fields
	}

	pub fn total_weight(&self) -> f64 {
		self.total_weight
	}

	/// Whether any field needs the injected address capability.
	pub fn wants_address(&self) -> bool {
		self.fields.iter().any(|field| field.strategy == Strategy::Address)
	}

	/// Per-field raw and weighted scores plus the normalized aggregate for
	/// one record pair. Capability-backed scores are computed ahead of time
	/// and passed in, so the scorer itself stays synchronous.
	pub fn score_pair(
		&self,
		a: &RecordFields<'_>,
		b: &RecordFields<'_>,
		externals: &ExternalScores,
	) -> PairScore {
		let mut field_scores = BTreeMap::new();
		let mut sum = 0.0;

		for field in &self.fields {
			let exact = exact_match(field.strategy, a, b);
			let raw = match field.mechanism {
				Mechanism::ExactOrNothing =>
					if exact {
						1.0
					} else {
						0.0
					},
				Mechanism::Weighted => raw_score(field.strategy, a, b, externals),
				Mechanism::ExactOrWeighted =>
					if exact {
						1.0
					} else {
						raw_score(field.strategy, a, b, externals)
					},
			};
			let weighted = if raw >= 1.0 { field.weight } else { raw * field.weight };

			sum += weighted;

			field_scores.insert(field.key.clone(), FieldScore { raw, weighted });
		}

		let weighted_score = (sum / self.total_weight).clamp(SCORE_MIN, SCORE_MAX);

		PairScore { field_scores, weighted_score }
	}
}

/// Scores produced by injected capabilities ahead of aggregation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalScores {
	pub address: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct PairScore {
	pub field_scores: BTreeMap<String, FieldScore>,
	pub weighted_score: f64,
}

fn raw_score(
	strategy: Strategy,
	a: &RecordFields<'_>,
	b: &RecordFields<'_>,
	externals: &ExternalScores,
) -> f64 {
	match strategy {
		Strategy::Name => similarity::name_score(a, b),
		Strategy::Email => similarity::email_score(a.emails, b.emails),
		Strategy::DateOfBirth =>
			similarity::date_of_birth_score(a.date_of_birth, b.date_of_birth),
		Strategy::Address => externals.address.unwrap_or(0.0).clamp(0.0, 1.0),
	}
}

fn exact_match(strategy: Strategy, a: &RecordFields<'_>, b: &RecordFields<'_>) -> bool {
	match strategy {
		Strategy::Name => match (full_normalized_name(a), full_normalized_name(b)) {
			(Some(a), Some(b)) => a == b,
			_ => false,
		},
		Strategy::Email => a.emails.iter().any(|ea| {
			b.emails.iter().any(|eb| {
				let ea = ea.trim().to_lowercase();
				let eb = eb.trim().to_lowercase();

				!ea.is_empty() && ea == eb
			})
		}),
		Strategy::DateOfBirth => matches!(
			(a.date_of_birth, b.date_of_birth),
			(Some(a), Some(b)) if a == b
		),
		Strategy::Address => match (a.address, b.address) {
			(Some(a), Some(b)) => {
				let a = a.trim().to_lowercase();
				let b = b.trim().to_lowercase();

				!a.is_empty() && a == b
			},
			_ => false,
		},
	}
}

fn full_normalized_name(fields: &RecordFields<'_>) -> Option<String> {
	let parts: Vec<String> = fields
		.first_name
		.iter()
		.chain(fields.last_name.iter())
		.map(|part| part.trim().to_lowercase())
		.filter(|part| !part.is_empty())
		.collect();

	if parts.is_empty() {
		return None;
	}

	Some(parts.join(" "))
}
