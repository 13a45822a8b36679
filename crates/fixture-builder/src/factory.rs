//! The setup routine populating the database before it is dumped.
//!
//! A [`FixtureFactory`] creates rows and reports the ones worth naming as
//! [`NamedRecords`]: logical names mapped to [`RecordHandle`]s. Everything the
//! factory does not name gets a model or default name at dump time.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use crate::backend::{DatabaseBackend, RawId};
use crate::error::BuilderError;

/// Error raised by user setup code.
pub type SetupError = Box<dyn std::error::Error + Send + Sync>;

/// Reference to one row created by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordHandle {
	/// Table the row lives in.
	pub table: String,

	/// Primary key of the row.
	pub id: RawId,
}

impl RecordHandle {
	/// Creates a handle for row `id` of `table`.
	pub fn new(table: impl Into<String>, id: impl Into<RawId>) -> Self {
		Self {
			table: table.into(),
			id: id.into(),
		}
	}
}

impl fmt::Display for RecordHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.table, self.id)
	}
}

impl FromStr for RecordHandle {
	type Err = BuilderError;

	/// Parses `table#id`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.split_once('#') {
			Some((table, id)) if !table.is_empty() && !id.is_empty() => {
				Ok(Self::new(table, id))
			}
			_ => Err(BuilderError::Configuration(format!(
				"Record reference '{}' must look like 'table#id'",
				s
			))),
		}
	}
}

/// Records the factory exposes by logical name, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedRecords {
	records: IndexMap<String, Vec<RecordHandle>>,
}

impl NamedRecords {
	/// Creates an empty collection.
	pub fn new() -> Self {
		Self::default()
	}

	/// Exposes a single record under `logical_name`.
	pub fn insert(&mut self, logical_name: impl Into<String>, handle: RecordHandle) {
		self.records
			.entry(logical_name.into())
			.or_default()
			.push(handle);
	}

	/// Builder form of [`insert`](Self::insert).
	pub fn with(mut self, logical_name: impl Into<String>, handle: RecordHandle) -> Self {
		self.insert(logical_name, handle);
		self
	}

	/// Exposes a collection of records under one logical name.
	///
	/// Each record is named individually, see
	/// [`BuilderConfig::record_naming`](crate::BuilderConfig::record_naming).
	pub fn insert_all<I>(&mut self, logical_name: impl Into<String>, handles: I)
	where
		I: IntoIterator<Item = RecordHandle>,
	{
		self.records
			.entry(logical_name.into())
			.or_default()
			.extend(handles);
	}

	/// Returns an iterator over `(logical_name, handles)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[RecordHandle])> {
		self.records
			.iter()
			.map(|(name, handles)| (name.as_str(), handles.as_slice()))
	}

	/// Returns the number of logical names.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if nothing was exposed.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// User code populating the database.
///
/// A returned error is a setup failure: nothing is dumped and no fixture file
/// is touched.
#[async_trait]
pub trait FixtureFactory: Send + Sync {
	/// Creates the desired database state.
	async fn build(&self, backend: &dyn DatabaseBackend) -> Result<NamedRecords, SetupError>;
}

/// Factory running SQL scripts, then exposing a fixed set of records.
#[derive(Debug, Clone, Default)]
pub struct SqlScriptFactory {
	scripts: Vec<PathBuf>,
	statements: Vec<String>,
	records: NamedRecords,
}

impl SqlScriptFactory {
	/// Creates a factory without scripts.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a script file; files run in the order they are added.
	pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
		self.scripts.push(path.into());
		self
	}

	/// Adds inline SQL, run after every script file.
	pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
		self.statements.push(sql.into());
		self
	}

	/// Exposes `handle` under `logical_name`.
	pub fn with_record(mut self, logical_name: impl Into<String>, handle: RecordHandle) -> Self {
		self.records.insert(logical_name, handle);
		self
	}

	/// Records exposed after the scripts ran.
	pub fn records(&self) -> &NamedRecords {
		&self.records
	}
}

#[async_trait]
impl FixtureFactory for SqlScriptFactory {
	async fn build(&self, backend: &dyn DatabaseBackend) -> Result<NamedRecords, SetupError> {
		for path in &self.scripts {
			let sql = std::fs::read_to_string(path)
				.map_err(|e| format!("cannot read setup script {}: {}", path.display(), e))?;
			debug!("Running setup script {}", path.display());
			backend.execute_script(&sql).await?;
		}
		for sql in &self.statements {
			backend.execute_script(sql).await?;
		}
		Ok(self.records.clone())
	}
}
