use std::collections::BTreeMap;

use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use roster_domain::{FieldScore, Identification, PersonRecord, RecordFields};

#[derive(Debug, sqlx::FromRow)]
pub struct PersonRow {
	pub person_id: Uuid,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub date_of_birth: Option<Date>,
	pub sex: Option<String>,
	pub nationality: Option<String>,
	pub emails: Vec<String>,
	pub phones: Vec<String>,
	pub address: Option<String>,
	pub unique_identifier: Option<String>,
	pub consent_given: Option<bool>,
	pub status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl PersonRow {
	/// Assembles the full record from the row plus its identification rows.
	pub fn into_record(self, identifications: Vec<Identification>) -> PersonRecord {
		PersonRecord {
			person_id: self.person_id,
			first_name: self.first_name,
			last_name: self.last_name,
			date_of_birth: self.date_of_birth,
			sex: self.sex,
			nationality: self.nationality,
			emails: self.emails,
			phones: self.phones,
			address: self.address,
			unique_identifier: self.unique_identifier,
			identifications,
			consent_given: self.consent_given,
			status: self.status,
			created_at: self.created_at,
			updated_at: self.updated_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct DuplicateRow {
	pub id: i64,
	pub record_a: Option<Uuid>,
	pub record_b: Uuid,
	pub weighted_score: f64,
	pub field_scores: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl DuplicateRow {
	pub fn decode_field_scores(&self) -> serde_json::Result<BTreeMap<String, FieldScore>> {
		serde_json::from_value(self.field_scores.clone())
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ResolutionLogRow {
	pub id: i64,
	pub record_a: Uuid,
	pub record_b: Uuid,
	pub resolution: String,
	pub resolved_at: OffsetDateTime,
}

/// One comparison pair produced by the candidate join: the seed side (a page
/// record or a staged draft) against one population record, with the
/// in-database blocking signals that let the pair through.
#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub seed_id: Uuid,
	pub seed_first_name: Option<String>,
	pub seed_last_name: Option<String>,
	pub seed_date_of_birth: Option<Date>,
	pub seed_emails: Vec<String>,
	pub seed_address: Option<String>,
	pub other_id: Uuid,
	pub other_first_name: Option<String>,
	pub other_last_name: Option<String>,
	pub other_date_of_birth: Option<Date>,
	pub other_emails: Vec<String>,
	pub other_address: Option<String>,
	pub dob_equal: bool,
	pub shared_email_domain: bool,
	pub name_prefilter: f64,
}
impl CandidateRow {
	pub fn seed_fields(&self) -> RecordFields<'_> {
		RecordFields {
			first_name: self.seed_first_name.as_deref(),
			last_name: self.seed_last_name.as_deref(),
			date_of_birth: self.seed_date_of_birth,
			emails: &self.seed_emails,
			address: self.seed_address.as_deref(),
		}
	}

	pub fn other_fields(&self) -> RecordFields<'_> {
		RecordFields {
			first_name: self.other_first_name.as_deref(),
			last_name: self.other_last_name.as_deref(),
			date_of_birth: self.other_date_of_birth,
			emails: &self.other_emails,
			address: self.other_address.as_deref(),
		}
	}
}
