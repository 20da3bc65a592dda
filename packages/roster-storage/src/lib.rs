pub mod db;
pub mod duplicates;
pub mod models;
pub mod persons;
pub mod schema;
pub mod scratch;
pub mod state;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
