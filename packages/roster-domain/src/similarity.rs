//! String similarity primitives for the weighted scorer.
//!
//! All fuzzy comparisons reduce to the Sørensen–Dice bigram coefficient over
//! normalized text, so a score of 1 means the normalized strings are equal
//! and 0 means they share no bigrams.

use strsim::sorensen_dice;
use time::Date;

use crate::person::RecordFields;

/// Number of components the name score averages over. Missing components
/// still count toward the divisor, which keeps sparse records conservative.
const NAME_COMPONENTS: f64 = 3.0;

/// Dice bigram similarity over case-folded, trimmed input.
pub fn bigram(a: &str, b: &str) -> f64 {
	sorensen_dice(&normalize(a), &normalize(b))
}

/// Average of first-vs-first, last-vs-last, and full-name-vs-full-name
/// similarity. A component with a missing side scores 0 and the average is
/// always taken over all three components.
pub fn name_score(a: &RecordFields<'_>, b: &RecordFields<'_>) -> f64 {
	let first = component(a.first_name, b.first_name);
	let last = component(a.last_name, b.last_name);
	let full = component(full_name(a).as_deref(), full_name(b).as_deref());

	(first + last + full) / NAME_COMPONENTS
}

/// Best score across the cross product of both records' email addresses.
/// Pairs on different domains score 0; pairs on the same domain score by
/// local-part similarity.
pub fn email_score(a: &[String], b: &[String]) -> f64 {
	let mut best = 0.0_f64;

	for ea in a {
		for eb in b {
			let score = email_pair_score(ea, eb);

			if score > best {
				best = score;
			}
		}
	}

	best
}

/// 1 when both dates are present and exactly equal, otherwise 0. No partial
/// credit for near dates.
pub fn date_of_birth_score(a: Option<Date>, b: Option<Date>) -> f64 {
	match (a, b) {
		(Some(a), Some(b)) if a == b => 1.0,
		_ => 0.0,
	}
}

/// Default residence comparison used when no external address capability is
/// wired in: Dice similarity over the normalized address lines.
pub fn address_score(a: &str, b: &str) -> f64 {
	bigram(a, b)
}

fn component(x: Option<&str>, y: Option<&str>) -> f64 {
	match (x, y) {
		(Some(x), Some(y)) if !x.trim().is_empty() && !y.trim().is_empty() => bigram(x, y),
		_ => 0.0,
	}
}

fn full_name(fields: &RecordFields<'_>) -> Option<String> {
	let parts: Vec<&str> = fields
		.first_name
		.iter()
		.chain(fields.last_name.iter())
		.map(|part| part.trim())
		.filter(|part| !part.is_empty())
		.collect();

	if parts.is_empty() {
		return None;
	}

	Some(parts.join(" "))
}

fn email_pair_score(a: &str, b: &str) -> f64 {
	let (local_a, domain_a) = split_email(a);
	let (local_b, domain_b) = split_email(b);

	if domain_a != domain_b {
		return 0.0;
	}

	sorensen_dice(&local_a, &local_b)
}

// Addresses without an '@' are treated as a bare local part with an empty
// domain, so two malformed values still compare by their text.
fn split_email(raw: &str) -> (String, String) {
	let normalized = normalize(raw);

	match normalized.split_once('@') {
		Some((local, domain)) => (local.to_string(), domain.to_string()),
		None => (normalized, String::new()),
	}
}

fn normalize(raw: &str) -> String {
	raw.trim().to_lowercase()
}
