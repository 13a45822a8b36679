//! Error types for fixture generation.
//!
//! Setup failures raised by the user factory are deliberately not part of
//! [`BuilderError`]; they are reported through
//! [`GenerateOutcome::SetupFailed`](crate::builder::GenerateOutcome::SetupFailed).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while cleaning, dumping or writing fixtures.
#[derive(Debug, Error)]
pub enum BuilderError {
	/// Database operation failed.
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// YAML serialization/deserialization error.
	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// A fixture file exists but its content is not a name-to-record mapping.
	#[error("Invalid fixture {path}: {message}")]
	InvalidFixture {
		/// File that failed to parse.
		path: PathBuf,
		/// What was wrong with it.
		message: String,
	},

	/// Two rows of the same table produced the same symbolic name.
	#[error("Duplicate record name '{name}' in table '{table}'")]
	DuplicateRecordName {
		/// Table being dumped.
		table: String,
		/// Name that was produced twice.
		name: String,
	},

	/// A record was explicitly named twice with different names.
	#[error("Record {table}#{id} is already named '{existing}', cannot rename it to '{requested}'")]
	ConflictingName {
		/// Table of the record.
		table: String,
		/// Raw identifier of the record.
		id: String,
		/// Name assigned first.
		existing: String,
		/// Name requested afterwards.
		requested: String,
	},

	/// A configured or referenced table does not exist in the database.
	#[error("Unknown table: {0}")]
	UnknownTable(String),

	/// Configuration is inconsistent.
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// Unsupported fixture file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),
}

/// Result type alias for fixture builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;
