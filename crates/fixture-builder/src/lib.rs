//! Factory-driven fixture generation.
//!
//! This crate snapshots a database into per-table fixture files. A test suite
//! describes the database state it wants once, in code (a [`FixtureFactory`]);
//! the builder runs that code against a live database and dumps every table to
//! a YAML or JSON file the test runner loads instead of re-running the setup.
//!
//! Output is made to be committed and diffed:
//!
//! - records are keyed by symbolic names (`alice`, `users_003`) instead of ids;
//! - foreign keys become references to those names (`author: alice`,
//!   `commentable: "welcome (Post)"`);
//! - rows are ordered deterministically;
//! - noise is removed: modification timestamps, auto-generated creation
//!   timestamps, nulls, ciphertexts (replaced by an expression over their
//!   plaintext).
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use fixture_builder::prelude::*;
//!
//! let backend = Arc::new(SqliteBackend::connect("sqlite://db/test.sqlite3").await?);
//! let factory = Arc::new(
//!     SqlScriptFactory::new()
//!         .with_script("tests/setup.sql")
//!         .with_record("alice", RecordHandle::new("users", 1)),
//! );
//! let config = BuilderConfig::new()
//!     .with_fixtures_dir("tests/fixtures")
//!     .with_model(ModelDescriptor::new("User", "users"))
//!     .with_file_to_check("tests/setup.sql");
//!
//! match FixtureBuilder::new(config, backend, factory).generate_if_stale().await? {
//!     GenerateOutcome::Built(report) => println!("wrote {} files", report.files.len()),
//!     GenerateOutcome::UpToDate => {}
//!     GenerateOutcome::SetupFailed(failure) => eprintln!("{failure}"),
//! }
//! ```
//!
//! # Architecture
//!
//! - [`Namer`](namer::Namer) - raw id to symbolic name mapping
//! - [`ValueTransformer`](transform::ValueTransformer) - per-attribute rewriting
//! - [`ReferenceResolver`](references::ReferenceResolver) - foreign keys to names
//! - [`TableDumper`](dumper::TableDumper) - one table to one [`FixtureSet`](fixtures::FixtureSet)
//! - [`FixtureWriter`](fixtures::FixtureWriter) - fixture sets to files
//! - [`FixtureBuilder`] - the generation driver

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backend;
pub mod builder;
pub mod config;
pub mod dumper;
pub mod error;
pub mod factory;
pub mod fixtures;
pub mod models;
pub mod namer;
pub mod prelude;
pub mod references;
pub mod signature;
pub mod transform;

// Re-export commonly used types at crate root
pub use backend::{DatabaseBackend, QueryValue, RawId, Row, SqliteBackend};
pub use builder::{
	BuildReport, FixtureBuilder, GenerateOutcome, SetupFailure, clean_fixtures, fixtures_stale,
};
pub use config::BuilderConfig;
pub use error::{BuilderError, BuilderResult};
pub use factory::{FixtureFactory, NamedRecords, RecordHandle, SqlScriptFactory};
pub use fixtures::{FixtureFormat, FixtureSet};
pub use models::{ModelDescriptor, ModelRegistry, TableSource};
