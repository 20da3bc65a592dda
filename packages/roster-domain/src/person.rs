use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Lifecycle status of a live record.
pub const STATUS_ACTIVE: &str = "active";
/// Lifecycle status of a record retired by a merge. The row stays behind as a
/// soft tombstone; it never participates in matching again.
pub const STATUS_MERGED: &str = "merged";

/// One identification document attached to a record, e.g. a passport or a
/// national id card. Two records sharing the same kind and number are an
/// exact duplicate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Identification {
	pub kind: String,
	pub number: String,
}

/// A beneficiary record as owned by the entity engine. The matcher reads
/// these; it only ever mutates them through the `EntityEngine` capability.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PersonRecord {
	pub person_id: Uuid,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	#[serde(default, with = "crate::time_serde::date")]
	pub date_of_birth: Option<Date>,
	pub sex: Option<String>,
	pub nationality: Option<String>,
	#[serde(default)]
	pub emails: Vec<String>,
	#[serde(default)]
	pub phones: Vec<String>,
	pub address: Option<String>,
	/// Registry-issued code unique per person; sharing it makes two records
	/// an exact duplicate.
	pub unique_identifier: Option<String>,
	#[serde(default)]
	pub identifications: Vec<Identification>,
	pub consent_given: Option<bool>,
	pub status: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl PersonRecord {
	pub fn is_active(&self) -> bool {
		self.status == STATUS_ACTIVE
	}

	pub fn match_fields(&self) -> RecordFields<'_> {
		RecordFields {
			first_name: self.first_name.as_deref(),
			last_name: self.last_name.as_deref(),
			date_of_birth: self.date_of_birth,
			emails: &self.emails,
			address: self.address.as_deref(),
		}
	}
}

/// The comparison-relevant projection of a record. Persisted rows and
/// not-yet-persisted drafts both reduce to this view before scoring.
#[derive(Clone, Copy, Debug)]
pub struct RecordFields<'a> {
	pub first_name: Option<&'a str>,
	pub last_name: Option<&'a str>,
	pub date_of_birth: Option<Date>,
	pub emails: &'a [String],
	pub address: Option<&'a str>,
}

/// A record that has not been persisted yet, offered for an ad-hoc duplicate
/// check. Carries only the fields the matcher compares on.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DraftRecord {
	pub person_id: Option<Uuid>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	#[serde(with = "crate::time_serde::date")]
	pub date_of_birth: Option<Date>,
	pub sex: Option<String>,
	pub emails: Vec<String>,
	pub address: Option<String>,
	pub unique_identifier: Option<String>,
	pub identifications: Vec<Identification>,
}
impl DraftRecord {
	pub fn match_fields(&self) -> RecordFields<'_> {
		RecordFields {
			first_name: self.first_name.as_deref(),
			last_name: self.last_name.as_deref(),
			date_of_birth: self.date_of_birth,
			emails: &self.emails,
			address: self.address.as_deref(),
		}
	}
}

/// Partial update applied to the surviving record during a merge. `None`
/// leaves the stored value untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PersonPatch {
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	#[serde(default, with = "crate::time_serde::date")]
	pub date_of_birth: Option<Date>,
	pub sex: Option<String>,
	pub nationality: Option<String>,
	pub emails: Option<Vec<String>>,
	pub phones: Option<Vec<String>>,
	pub address: Option<String>,
	pub unique_identifier: Option<String>,
	pub consent_given: Option<bool>,
}
impl PersonPatch {
	pub fn is_empty(&self) -> bool {
		self.first_name.is_none()
			&& self.last_name.is_none()
			&& self.date_of_birth.is_none()
			&& self.sex.is_none()
			&& self.nationality.is_none()
			&& self.emails.is_none()
			&& self.phones.is_none()
			&& self.address.is_none()
			&& self.unique_identifier.is_none()
			&& self.consent_given.is_none()
	}
}
