//! The generation driver.
//!
//! [`FixtureBuilder::generate`] runs one complete generation:
//!
//! 1. parse legacy fixtures;
//! 2. delete every row of the dumped tables;
//! 3. insert legacy records and run the factory, naming what they expose;
//! 4. delete the old fixture files and dump every table to a new one;
//! 5. call the post-generation hook.
//!
//! A failure in steps 1 or 3 is a setup failure: it is reported as
//! [`GenerateOutcome::SetupFailed`] before any fixture file is touched.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::backend::DatabaseBackend;
use crate::config::BuilderConfig;
use crate::dumper::TableDumper;
use crate::error::{BuilderError, BuilderResult};
use crate::factory::{FixtureFactory, NamedRecords};
use crate::fixtures::{FixtureFormat, FixtureSet, FixtureWriter, LegacyLoader};
use crate::namer::{Namer, sequence_index};
use crate::signature::{BuildSignature, SignatureStore};

/// Summary of a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
	/// Tables a fixture file was written for, in dump order.
	pub tables: Vec<String>,

	/// Files written, parallel to `tables`.
	pub files: Vec<PathBuf>,

	/// Total number of records written.
	pub records: usize,
}

/// Diagnostics of a setup routine that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupFailure {
	/// Top-level error message.
	pub message: String,

	/// Messages of the error and each of its sources, outermost first.
	pub diagnostics: Vec<String>,
}

impl SetupFailure {
	/// Captures `error` and its source chain.
	pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
		let mut diagnostics = Vec::new();
		let mut current = Some(error);
		while let Some(err) = current {
			diagnostics.push(err.to_string());
			current = err.source();
		}
		Self {
			message: error.to_string(),
			diagnostics,
		}
	}
}

impl fmt::Display for SetupFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fixture setup failed: {}", self.message)?;
		for cause in self.diagnostics.iter().skip(1) {
			write!(f, "\n  caused by: {}", cause)?;
		}
		Ok(())
	}
}

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
	/// Fixtures were written.
	Built(BuildReport),

	/// Watched files are unchanged; nothing was done.
	UpToDate,

	/// Legacy fixtures or the factory failed; no fixture file was touched.
	SetupFailed(SetupFailure),
}

impl GenerateOutcome {
	/// True unless setup failed.
	pub fn is_success(&self) -> bool {
		!matches!(self, GenerateOutcome::SetupFailed(_))
	}
}

/// Generates fixtures from a database populated by a factory.
pub struct FixtureBuilder {
	config: BuilderConfig,
	backend: Arc<dyn DatabaseBackend>,
	factory: Arc<dyn FixtureFactory>,
}

impl FixtureBuilder {
	/// Creates a builder. Nothing runs until [`generate`](Self::generate).
	pub fn new(
		config: BuilderConfig,
		backend: Arc<dyn DatabaseBackend>,
		factory: Arc<dyn FixtureFactory>,
	) -> Self {
		Self {
			config,
			backend,
			factory,
		}
	}

	/// Returns the configuration.
	pub fn config(&self) -> &BuilderConfig {
		&self.config
	}

	/// Returns the database backend.
	pub fn backend(&self) -> &dyn DatabaseBackend {
		self.backend.as_ref()
	}

	fn writer(&self) -> FixtureWriter {
		FixtureWriter::new(&self.config.fixtures_dir, self.config.format)
	}

	fn signature_store(&self) -> SignatureStore {
		SignatureStore::new(&self.config.fixtures_dir, self.config.format)
	}

	/// Runs a complete generation.
	///
	/// # Errors
	///
	/// Database, I/O and naming errors after setup abort the run and may leave
	/// a partial set of fixture files; rerun after fixing the cause.
	pub async fn generate(&self) -> BuilderResult<GenerateOutcome> {
		self.generate_at(Utc::now()).await
	}

	/// Like [`generate`](Self::generate), judging creation timestamps
	/// against `now`.
	pub async fn generate_at(&self, now: DateTime<Utc>) -> BuilderResult<GenerateOutcome> {
		let loader = LegacyLoader::new();
		let legacy = match loader.read(&self.config.legacy_fixtures) {
			Ok(legacy) => legacy,
			Err(e) => return Ok(self.setup_failed(&e)),
		};

		let tables = self.tables().await?;
		self.backend.delete_all(&tables).await?;
		info!("Cleaned {} table(s)", tables.len());

		let mut namer = Namer::new();
		if let Err(e) = loader
			.insert(self.backend.as_ref(), &self.config, &legacy, &mut namer, now)
			.await
		{
			return Ok(self.setup_failed(&e));
		}

		let records = match self.factory.build(self.backend.as_ref()).await {
			Ok(records) => records,
			Err(e) => return Ok(self.setup_failed(e.as_ref())),
		};
		self.assign_names(&records, &mut namer)?;
		info!("Factory finished; {} record(s) named", namer.len());

		let report = self.dump(&tables, &namer, now).await?;
		if let Some(hook) = &self.config.after_build {
			hook(&report);
		}
		info!("Built fixtures for: {}", report.tables.join(", "));
		Ok(GenerateOutcome::Built(report))
	}

	/// Runs [`generate`](Self::generate) only when the watched files changed
	/// or no fixture exists, recording the new signature after a build.
	pub async fn generate_if_stale(&self) -> BuilderResult<GenerateOutcome> {
		let store = self.signature_store();
		let signature = BuildSignature::compute(&self.config.files_to_check)?;
		if !store.must_rebuild(&signature)? {
			info!("Fixtures are up to date");
			return Ok(GenerateOutcome::UpToDate);
		}

		self.generate_and_sign(&store, &signature).await
	}

	/// Runs [`generate`](Self::generate) regardless of the watched files,
	/// recording their signature after a build.
	pub async fn regenerate(&self) -> BuilderResult<GenerateOutcome> {
		let signature = BuildSignature::compute(&self.config.files_to_check)?;
		self.generate_and_sign(&self.signature_store(), &signature).await
	}

	async fn generate_and_sign(
		&self,
		store: &SignatureStore,
		signature: &BuildSignature,
	) -> BuilderResult<GenerateOutcome> {
		let outcome = self.generate().await?;
		if let GenerateOutcome::Built(_) = outcome {
			store.save(signature)?;
		}
		Ok(outcome)
	}

	/// True when [`generate_if_stale`](Self::generate_if_stale) would build.
	pub fn must_rebuild(&self) -> BuilderResult<bool> {
		fixtures_stale(&self.config)
	}

	/// Deletes the generated fixtures; see [`clean_fixtures`].
	pub fn clean(&self) -> BuilderResult<usize> {
		clean_fixtures(&self.config)
	}

	/// Tables to clean and dump, in dump order.
	async fn tables(&self) -> BuilderResult<Vec<String>> {
		let tables = match &self.config.tables {
			Some(tables) => tables.clone(),
			None => self.backend.table_names().await?,
		};
		Ok(tables
			.into_iter()
			.filter(|table| !self.config.is_skipped(table))
			.collect())
	}

	/// Records the names of the factory's records.
	///
	/// A logical name holding several records names each one with a
	/// `_000`, `_001`, ... suffix.
	fn assign_names(&self, records: &NamedRecords, namer: &mut Namer) -> BuilderResult<()> {
		for (logical_name, handles) in records.iter() {
			for (position, handle) in handles.iter().enumerate() {
				let Some(name) = self.config.name_for_record(logical_name, handle) else {
					continue;
				};
				let name = if handles.len() > 1 {
					format!("{}_{}", name, sequence_index(position))
				} else {
					name
				};
				namer.assign_name(&handle.table, handle.id.clone(), name)?;
			}
		}
		Ok(())
	}

	async fn dump(
		&self,
		tables: &[String],
		namer: &Namer,
		now: DateTime<Utc>,
	) -> BuilderResult<BuildReport> {
		let writer = self.writer();
		for table in tables {
			remove_if_exists(&writer.path_for(table))?;
		}

		let dumper = TableDumper::new(self.backend.as_ref(), &self.config, namer, now);
		let mut report = BuildReport::default();
		for table in tables {
			let source = self.config.models.source_for(table);
			let Some(set) = dumper.dump(&source).await? else {
				continue;
			};
			self.record(&writer, &set, &mut report)?;
		}
		Ok(report)
	}

	fn record(
		&self,
		writer: &FixtureWriter,
		set: &FixtureSet,
		report: &mut BuildReport,
	) -> BuilderResult<()> {
		let path = writer.write(set)?;
		report.tables.push(set.table.clone());
		report.files.push(path);
		report.records += set.len();
		Ok(())
	}

	fn setup_failed(&self, error: &(dyn std::error::Error + 'static)) -> GenerateOutcome {
		let failure = SetupFailure::from_error(error);
		error!("{}", failure);
		GenerateOutcome::SetupFailed(failure)
	}
}

/// True when the watched files changed since the last build, or when no
/// fixture file exists yet.
///
/// Needs no database connection.
pub fn fixtures_stale(config: &BuilderConfig) -> BuilderResult<bool> {
	let signature = BuildSignature::compute(&config.files_to_check)?;
	SignatureStore::new(&config.fixtures_dir, config.format).must_rebuild(&signature)
}

/// Deletes every fixture file of the configured format, and the stored
/// signature, from the fixtures directory. Returns the number of fixture
/// files removed.
///
/// Needs no database connection.
pub fn clean_fixtures(config: &BuilderConfig) -> BuilderResult<usize> {
	let entries = match std::fs::read_dir(&config.fixtures_dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
		Err(e) => return Err(e.into()),
	};

	let mut removed = 0;
	for entry in entries {
		let path = entry?.path();
		if path.is_file() && FixtureFormat::from_path(&path) == Some(config.format) {
			remove_if_exists(&path)?;
			removed += 1;
		}
	}
	SignatureStore::new(&config.fixtures_dir, config.format).clear()?;
	info!(
		"Removed {} fixture file(s) from {}",
		removed,
		config.fixtures_dir.display()
	);
	Ok(removed)
}

fn remove_if_exists(path: &std::path::Path) -> BuilderResult<()> {
	match std::fs::remove_file(path) {
		Ok(()) => {
			debug!("Removed {}", path.display());
			Ok(())
		}
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(BuilderError::Io(e)),
	}
}
