use time::{Date, macros::date};

use roster_domain::{person::RecordFields, similarity};

fn close(actual: f64, expected: f64) -> bool {
	(actual - expected).abs() < 1e-9
}

fn fields<'a>(
	first: Option<&'a str>,
	last: Option<&'a str>,
	dob: Option<Date>,
	emails: &'a [String],
	address: Option<&'a str>,
) -> RecordFields<'a> {
	RecordFields { first_name: first, last_name: last, date_of_birth: dob, emails, address }
}

#[test]
fn bigram_is_case_and_whitespace_insensitive() {
	assert!(close(similarity::bigram("Jon", "JOHN"), 0.4));
	assert!(close(similarity::bigram("  jon  ", "jon"), 1.0));
	assert!(close(similarity::bigram("abc", "xyz"), 0.0));
}

#[test]
fn bigram_is_symmetric() {
	let forward = similarity::bigram("Jon", "John");
	let backward = similarity::bigram("John", "Jon");

	assert!(close(forward, backward));
}

#[test]
fn name_score_averages_three_components() {
	let emails = Vec::new();
	let a = fields(Some("Jon"), Some("Smith"), None, &emails, None);
	let b = fields(Some("John"), Some("Smith"), None, &emails, None);

	// first 0.4, last 1.0, full "jon smith"/"john smith" 0.8.
	assert!(close(similarity::name_score(&a, &b), (0.4 + 1.0 + 0.8) / 3.0));
}

#[test]
fn name_score_is_one_for_identical_names() {
	let emails = Vec::new();
	let a = fields(Some("Amina"), Some("Diallo"), None, &emails, None);

	assert!(close(similarity::name_score(&a, &a), 1.0));
}

#[test]
fn name_score_counts_missing_components_in_the_divisor() {
	let emails = Vec::new();
	let a = fields(Some("Jon"), None, None, &emails, None);
	let b = fields(Some("Jon"), Some("Smith"), None, &emails, None);

	// first 1.0, last 0.0 (one side missing), full "jon" vs "jon smith".
	let full = similarity::bigram("jon", "jon smith");

	assert!(close(similarity::name_score(&a, &b), (1.0 + 0.0 + full) / 3.0));
}

#[test]
fn name_score_treats_blank_parts_as_missing() {
	let emails = Vec::new();
	let a = fields(Some("   "), Some("Smith"), None, &emails, None);
	let b = fields(Some("Jon"), Some("Smith"), None, &emails, None);

	// first missing, last 1.0, full "smith" vs "jon smith".
	let full = similarity::bigram("smith", "jon smith");

	assert!(close(similarity::name_score(&a, &b), (0.0 + 1.0 + full) / 3.0));
}

#[test]
fn name_score_is_zero_when_both_names_are_absent() {
	let emails = Vec::new();
	let a = fields(None, None, None, &emails, None);
	let b = fields(Some("Jon"), Some("Smith"), None, &emails, None);

	assert!(close(similarity::name_score(&a, &b), 0.0));
}

#[test]
fn email_score_requires_a_shared_domain() {
	let a = vec!["jon.smith@example.org".to_string()];
	let b = vec!["jon.smith@other.org".to_string()];

	assert!(close(similarity::email_score(&a, &b), 0.0));
}

#[test]
fn email_score_compares_local_parts_on_a_shared_domain() {
	let a = vec!["jon.smith@example.org".to_string()];
	let b = vec!["john.smith@example.org".to_string()];

	assert!(close(similarity::email_score(&a, &b), 14.0 / 17.0));
}

#[test]
fn email_score_takes_the_best_pair() {
	let a = vec!["old.handle@legacy.net".to_string(), "jon.smith@example.org".to_string()];
	let b = vec!["jon.smith@example.org".to_string()];

	assert!(close(similarity::email_score(&a, &b), 1.0));
}

#[test]
fn email_score_is_zero_when_either_side_is_empty() {
	let a = vec!["jon.smith@example.org".to_string()];
	let none: Vec<String> = Vec::new();

	assert!(close(similarity::email_score(&a, &none), 0.0));
	assert!(close(similarity::email_score(&none, &none), 0.0));
}

#[test]
fn email_score_folds_case() {
	let a = vec!["Jon.Smith@Example.ORG".to_string()];
	let b = vec!["jon.smith@example.org".to_string()];

	assert!(close(similarity::email_score(&a, &b), 1.0));
}

#[test]
fn date_of_birth_score_is_binary() {
	let day = date!(1990 - 01 - 01);

	assert!(close(similarity::date_of_birth_score(Some(day), Some(day)), 1.0));
	assert!(close(
		similarity::date_of_birth_score(Some(day), Some(date!(1990 - 01 - 02))),
		0.0
	));
	assert!(close(similarity::date_of_birth_score(Some(day), None), 0.0));
	assert!(close(similarity::date_of_birth_score(None, None), 0.0));
}

#[test]
fn address_score_matches_on_normalized_text() {
	assert!(close(similarity::address_score("12 Harbour Lane", "12 HARBOUR LANE"), 1.0));
	assert!(similarity::address_score("12 Harbour Lane", "12 Harbour Ln") > 0.5);
}
