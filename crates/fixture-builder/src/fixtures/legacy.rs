//! Pre-loading of existing fixture files.
//!
//! Legacy files are parsed before the database is cleaned, so a malformed file
//! stops the run before anything is deleted. Their records are inserted after
//! cleanup and their names recorded in the [`Namer`], letting rows created by
//! the factory reference them by name.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{FixtureParser, FixtureSet};
use crate::backend::{DatabaseBackend, QueryValue, RawId, Row, TableSchema};
use crate::config::BuilderConfig;
use crate::error::BuilderResult;
use crate::namer::Namer;

/// Upper bound (exclusive) of identifiers derived from labels.
pub const MAX_LABEL_ID: u32 = (1 << 30) - 1;

/// Derives a stable identifier from a record label.
///
/// Records without an explicit primary key get this id, and `author: alice`
/// style references are turned into `author_id: identify("alice")`.
pub fn identify(label: &str) -> i64 {
	let digest = Sha256::digest(label.as_bytes());
	let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
	i64::from(prefix % MAX_LABEL_ID)
}

/// Reads legacy fixture files and inserts their records.
#[derive(Debug, Default)]
pub struct LegacyLoader {
	parser: FixtureParser,
}

impl LegacyLoader {
	/// Creates a new loader.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses every file, failing on the first malformed one.
	pub fn read(&self, paths: &[PathBuf]) -> BuilderResult<Vec<FixtureSet>> {
		paths
			.iter()
			.map(|path| self.parser.parse_file(path))
			.collect()
	}

	/// Inserts the records of `sets`, in order, and names them in `namer`.
	///
	/// Returns the number of inserted rows.
	pub async fn insert(
		&self,
		backend: &dyn DatabaseBackend,
		config: &BuilderConfig,
		sets: &[FixtureSet],
		namer: &mut Namer,
		now: DateTime<Utc>,
	) -> BuilderResult<usize> {
		let mut inserted = 0;
		for set in sets {
			let schema = backend.table_schema(&set.table).await?;
			for (name, record) in set.iter() {
				let row = self.prepare_row(config, &schema, name, record, now);
				let raw_id = row.id(&config.primary_key);

				let columns: Vec<&str> = row.columns().collect();
				let sql = format!(
					"INSERT INTO {} ({}) VALUES ({})",
					backend.quote_identifier(&set.table),
					columns
						.iter()
						.map(|c| backend.quote_identifier(c))
						.collect::<Vec<_>>()
						.join(", "),
					(1..=columns.len())
						.map(|i| backend.placeholder(i))
						.collect::<Vec<_>>()
						.join(", ")
				);
				let params: Vec<QueryValue> = row.iter().map(|(_, value)| value.clone()).collect();
				let result = backend.execute(&sql, params).await?;

				let raw_id = raw_id.or_else(|| result.last_insert_id.map(RawId::from));
				if let Some(raw_id) = raw_id {
					namer.assign_name(&set.table, raw_id, name)?;
				}
				inserted += 1;
			}
			debug!("Loaded {} legacy record(s) into {}", set.len(), set.table);
		}
		Ok(inserted)
	}

	/// Maps a fixture record onto the table's columns.
	///
	/// Fills in the primary key from the label, resolves `<name>: label` and
	/// `<name>: "label (Type)"` references to `<name>_id` (and `<name>_type`),
	/// and stamps missing timestamps with `now`. Attributes matching no column
	/// are dropped.
	fn prepare_row(
		&self,
		config: &BuilderConfig,
		schema: &TableSchema,
		name: &str,
		record: &Row,
		now: DateTime<Utc>,
	) -> Row {
		let mut row = Row::new();
		if schema.has_column(&config.primary_key) && !record.contains(&config.primary_key) {
			row.insert(config.primary_key.clone(), identify(name));
		}

		for (attribute, value) in record.iter() {
			if schema.has_column(attribute) {
				row.insert(attribute, value.clone());
				continue;
			}

			let id_column = format!("{}_id", attribute);
			match value.as_str() {
				Some(label) if schema.has_column(&id_column) => {
					let type_column = format!("{}_type", attribute);
					match split_polymorphic(label) {
						Some((label, target_type)) if schema.has_column(&type_column) => {
							row.insert(id_column, identify(label));
							row.insert(type_column, target_type);
						}
						_ => row.insert(id_column, identify(label)),
					}
				}
				_ => warn!(
					"Legacy record {}.{} has attribute '{}' matching no column; ignored",
					schema.name, name, attribute
				),
			}
		}

		for column in [&config.created_at_column, &config.updated_at_column] {
			if schema.has_column(column) && !row.contains(column) {
				row.insert(column.clone(), now);
			}
		}
		row
	}
}

/// Splits `"alice (User)"` into `("alice", "User")`.
fn split_polymorphic(label: &str) -> Option<(&str, &str)> {
	let (name, rest) = label.rsplit_once(" (")?;
	let target_type = rest.strip_suffix(')')?;
	(!name.is_empty() && !target_type.is_empty()).then_some((name, target_type))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::SqliteBackend;
	use crate::fixtures::FixtureFormat;
	use chrono::TimeZone;
	use rstest::rstest;

	#[rstest]
	fn test_identify_is_stable_and_bounded() {
		assert_eq!(identify("alice"), identify("alice"));
		assert_ne!(identify("alice"), identify("bob"));
		assert!((0..i64::from(MAX_LABEL_ID)).contains(&identify("alice")));
	}

	#[rstest]
	#[case("alice (User)", Some(("alice", "User")))]
	#[case("a (b) (Post)", Some(("a (b)", "Post")))]
	#[case("alice", None)]
	#[case(" (User)", None)]
	fn test_split_polymorphic(#[case] label: &str, #[case] expected: Option<(&str, &str)>) {
		assert_eq!(split_polymorphic(label), expected);
	}

	#[rstest]
	#[tokio::test]
	async fn test_insert_names_records_and_resolves_labels() {
		let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
		backend
			.execute_script(
				"CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, created_at DATETIME);
				CREATE TABLE posts (
					id INTEGER PRIMARY KEY,
					author_id INTEGER REFERENCES users(id),
					title TEXT
				);",
			)
			.await
			.unwrap();

		let parser = FixtureParser::new();
		let users = parser
			.parse_string(
				"admin:\n  id: 7\n  name: Admin\nguest:\n  name: Guest\n",
				FixtureFormat::Yaml,
				"users",
			)
			.unwrap();
		let posts = parser
			.parse_string(
				"hello:\n  author: guest\n  title: Hello\n  rating: 5\n",
				FixtureFormat::Yaml,
				"posts",
			)
			.unwrap();

		let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		let mut namer = Namer::new();
		let inserted = LegacyLoader::new()
			.insert(&backend, &BuilderConfig::new(), &[users, posts], &mut namer, now)
			.await
			.unwrap();
		assert_eq!(inserted, 3);

		assert_eq!(namer.record_name("users", &RawId::from(7)), Some("admin"));
		let guest_id = identify("guest");
		assert_eq!(namer.record_name("users", &RawId::from(guest_id)), Some("guest"));

		let rows = backend
			.fetch_all("SELECT author_id, title FROM posts", vec![])
			.await
			.unwrap();
		assert_eq!(rows[0].get("author_id"), Some(&QueryValue::Int(guest_id)));

		let stamped = backend
			.fetch_all("SELECT created_at FROM users WHERE id = 7", vec![])
			.await
			.unwrap();
		assert_eq!(
			stamped[0].get("created_at"),
			Some(&QueryValue::String("2024-01-01 00:00:00".into()))
		);
	}
}
