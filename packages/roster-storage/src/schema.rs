pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_persons.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_persons.sql")),
				"tables/002_person_identifications.sql" => out
					.push_str(include_str!("../../../sql/tables/002_person_identifications.sql")),
				"tables/003_duplicate_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_duplicate_records.sql")),
				"tables/004_resolution_log.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_resolution_log.sql")),
				"tables/005_scratch_candidates.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_scratch_candidates.sql")),
				"tables/006_matcher_state.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_matcher_state.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
