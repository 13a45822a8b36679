//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use fixture_builder::prelude::*;
//! ```

// Error types
pub use crate::error::{BuilderError, BuilderResult};

// Database
pub use crate::backend::{
	ColumnKind, DatabaseBackend, QueryValue, RawId, Row, SqliteBackend, TableSchema,
};

// Configuration and models
pub use crate::config::{BuilderConfig, OpaqueColumns};
pub use crate::models::{ModelDescriptor, ModelRegistry, TableSource};

// Factories
pub use crate::factory::{FixtureFactory, NamedRecords, RecordHandle, SetupError, SqlScriptFactory};

// Generation
pub use crate::builder::{BuildReport, FixtureBuilder, GenerateOutcome, SetupFailure};
pub use crate::fixtures::{FixtureFormat, FixtureSet};
