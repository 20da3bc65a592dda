use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::{Value, value::Table};

use roster_config::{Config, Error, Result};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn render(value: &Value) -> String {
	toml::to_string(value).expect("Failed to render template config.")
}

fn with_table(name: &str, mutate: impl FnOnce(&mut Table)) -> String {
	let mut value = sample_value();
	let root = value.as_table_mut().expect("Template config must be a table.");
	let table = root
		.get_mut(name)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Template config must include [{name}]."));

	mutate(table);

	render(&value)
}

fn with_first_field(mutate: impl FnOnce(&mut Table)) -> String {
	with_table("matching", |matching| {
		let fields = matching
			.get_mut("fields")
			.and_then(Value::as_array_mut)
			.expect("Template config must include matching.fields.");
		let first = fields[0].as_table_mut().expect("Field entries must be tables.");

		mutate(first);
	})
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("roster_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> Result<Config> {
	let path = write_temp_config(payload);
	let result = roster_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation_message(payload: String, needle: &str) {
	let err = load_payload(payload).expect_err("Expected a validation error.");
	let message = err.to_string();

	assert!(message.contains(needle), "Unexpected error message: {message}");
}

#[test]
fn loads_the_sample_config() {
	let cfg = load_payload(render(&sample_value())).expect("Sample config must load.");

	assert_eq!(cfg.matching.fields.len(), 4);
	assert_eq!(cfg.matching.cutoff, 0.1);
	assert_eq!(cfg.matching.page_size, 1_000);
	assert!(cfg.matching.require_matching_sex);
	assert_eq!(cfg.worker.scan_interval_secs, 300);
}

#[test]
fn applies_defaults_for_optional_knobs() {
	let payload = {
		let mut value = sample_value();
		let root = value.as_table_mut().expect("Template config must be a table.");
		let matching = root
			.get_mut("matching")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [matching].");

		for key in ["cutoff", "page_size", "flush_size", "require_matching_sex", "prefilter_floor"]
		{
			matching.remove(key);
		}

		root.insert("worker".to_string(), Value::Table(Table::new()));

		render(&value)
	};
	let cfg = load_payload(payload).expect("Defaults must satisfy validation.");

	assert_eq!(cfg.matching.cutoff, 0.1);
	assert_eq!(cfg.matching.page_size, 1_000);
	assert_eq!(cfg.matching.flush_size, 1_000);
	assert!(cfg.matching.require_matching_sex);
	assert_eq!(cfg.matching.prefilter_floor, 0.05);
	assert_eq!(cfg.worker.scan_interval_secs, 300);
}

#[test]
fn an_omitted_worker_table_falls_back_to_defaults() {
	let payload = {
		let mut value = sample_value();
		let root = value.as_table_mut().expect("Template config must be a table.");

		root.remove("worker");

		render(&value)
	};
	let cfg = load_payload(payload).expect("A config without [worker] must load.");

	assert_eq!(cfg.worker.scan_interval_secs, 300);
}

#[test]
fn normalizes_field_key_and_kind_casing() {
	let payload = with_first_field(|field| {
		field.insert("key".to_string(), Value::String("  name ".to_string()));
		field.insert("mechanism".to_string(), Value::String(" Weighted ".to_string()));
		field.insert("strategy".to_string(), Value::String("NAME".to_string()));
	});
	let cfg = load_payload(payload).expect("Normalized casing must load.");

	assert_eq!(cfg.matching.fields[0].key, "name");
	assert_eq!(cfg.matching.fields[0].mechanism, "weighted");
	assert_eq!(cfg.matching.fields[0].strategy, "name");
}

#[test]
fn rejects_an_empty_field_list() {
	let payload = with_table("matching", |matching| {
		matching.insert("fields".to_string(), Value::Array(Vec::new()));
	});

	expect_validation_message(payload, "matching.fields must declare at least one field.");
}

#[test]
fn rejects_unknown_mechanisms() {
	let payload = with_first_field(|field| {
		field.insert("mechanism".to_string(), Value::String("telepathy".to_string()));
	});

	expect_validation_message(payload, "matching.fields.name.mechanism must be one of");
}

#[test]
fn rejects_unknown_strategies() {
	let payload = with_first_field(|field| {
		field.insert("strategy".to_string(), Value::String("postcode".to_string()));
	});

	expect_validation_message(payload, "matching.fields.name.strategy must be one of");
}

#[test]
fn rejects_non_positive_weights() {
	let payload = with_first_field(|field| {
		field.insert("weight".to_string(), Value::Float(0.0));
	});

	expect_validation_message(
		payload,
		"matching.fields.name.weight must be greater than zero.",
	);
}

#[test]
fn rejects_duplicate_field_keys() {
	let payload = with_table("matching", |matching| {
		let fields = matching
			.get_mut("fields")
			.and_then(Value::as_array_mut)
			.expect("Template config must include matching.fields.");
		let duplicate = fields[0].clone();

		fields.push(duplicate);
	});

	expect_validation_message(payload, "matching.fields key name is declared more than once.");
}

#[test]
fn rejects_out_of_range_cutoffs() {
	let payload = with_table("matching", |matching| {
		matching.insert("cutoff".to_string(), Value::Float(1.5));
	});

	expect_validation_message(payload, "matching.cutoff must be in the range");
}

#[test]
fn rejects_a_zero_page_size() {
	let payload = with_table("matching", |matching| {
		matching.insert("page_size".to_string(), Value::Integer(0));
	});

	expect_validation_message(payload, "matching.page_size must be greater than zero.");
}

#[test]
fn rejects_a_blank_dsn() {
	let payload = {
		let mut value = sample_value();
		let postgres = value
			.as_table_mut()
			.and_then(|root| root.get_mut("storage"))
			.and_then(Value::as_table_mut)
			.and_then(|storage| storage.get_mut("postgres"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [storage.postgres].");

		postgres.insert("dsn".to_string(), Value::String("   ".to_string()));

		render(&value)
	};

	expect_validation_message(payload, "storage.postgres.dsn must be non-empty.");
}

#[test]
fn rejects_a_zero_scan_interval() {
	let payload = with_table("worker", |worker| {
		worker.insert("scan_interval_secs".to_string(), Value::Integer(0));
	});

	expect_validation_message(payload, "worker.scan_interval_secs must be greater than zero.");
}

#[test]
fn missing_config_files_surface_read_errors() {
	let mut path = env::temp_dir();

	path.push("roster_config_test_missing.toml");

	let err = roster_config::load(&path).expect_err("Expected a read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn malformed_toml_surfaces_parse_errors() {
	let err = load_payload("service = nope[".to_string()).expect_err("Expected a parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }));
}
