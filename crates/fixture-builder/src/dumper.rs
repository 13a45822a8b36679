//! Turning one table into a named fixture set.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::backend::{DatabaseBackend, Row};
use crate::config::BuilderConfig;
use crate::error::BuilderResult;
use crate::fixtures::FixtureSet;
use crate::models::TableSource;
use crate::namer::{Namer, default_name, sequence_index};
use crate::references::ReferenceResolver;
use crate::transform::ValueTransformer;

/// Loads, names, transforms and resolves the rows of a table.
///
/// Must only run once the [`Namer`] is complete: references to records named
/// later would stay raw.
pub struct TableDumper<'a> {
	backend: &'a dyn DatabaseBackend,
	config: &'a BuilderConfig,
	namer: &'a Namer,
	now: DateTime<Utc>,
}

impl<'a> TableDumper<'a> {
	/// Creates a dumper judging timestamps against `now`.
	pub fn new(
		backend: &'a dyn DatabaseBackend,
		config: &'a BuilderConfig,
		namer: &'a Namer,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			backend,
			config,
			namer,
			now,
		}
	}

	/// Dumps the table behind `source`.
	///
	/// Returns `None` for a table without rows unless empty files are
	/// requested.
	///
	/// # Errors
	///
	/// Fails on database errors and on two rows sharing a name.
	pub async fn dump(&self, source: &TableSource) -> BuilderResult<Option<FixtureSet>> {
		let table = source.table();
		let schema = self.backend.table_schema(table).await?;
		let rows = source
			.load_rows(self.backend, &schema, self.config.order_column())
			.await?;

		if rows.is_empty() && !self.config.write_empty_files {
			debug!("Skipping empty table {}", table);
			return Ok(None);
		}

		let transformer = ValueTransformer::new(self.config, self.now);
		let resolver = ReferenceResolver::new(self.config, self.namer);
		let mut set = FixtureSet::new(table);
		for (position, row) in rows.iter().enumerate() {
			let index = sequence_index(position);
			let name = self.record_name(source, row, &index);
			let attributes = resolver.resolve(transformer.transform(source, &schema, row));
			set.insert(name, attributes)?;
		}
		debug!("Dumped {} row(s) from {}", set.len(), table);
		Ok(Some(set))
	}

	/// Explicit name, then model naming function, then `{table}_{index}`.
	fn record_name(&self, source: &TableSource, row: &Row, index: &str) -> String {
		let explicit = row
			.id(&self.config.primary_key)
			.and_then(|id| self.namer.record_name(source.table(), &id));
		if let Some(name) = explicit {
			return name.to_string();
		}
		source
			.model()
			.and_then(|model| model.name_record(row, index))
			.unwrap_or_else(|| default_name(source.table(), index))
	}
}
