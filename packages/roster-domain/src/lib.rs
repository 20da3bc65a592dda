pub mod candidate;
pub mod pair;
pub mod person;
pub mod scoring;
pub mod similarity;
pub mod time_serde;

pub use candidate::{DuplicateCandidate, FieldScore};
pub use pair::PairKey;
pub use person::{DraftRecord, Identification, PersonPatch, PersonRecord, RecordFields};
pub use scoring::{
	ExternalScores, Mechanism, PairScore, ScoringConfig, ScoringError, ScoringField, Strategy,
};
