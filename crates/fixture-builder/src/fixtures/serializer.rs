//! Fixture output.
//!
//! Converts named records into YAML or JSON documents and writes one file per
//! table. Date-like values use fixed `%Y-%m-%d %H:%M:%S` / `%Y-%m-%d` text so
//! output does not depend on locale or runtime defaults.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_yaml::value::{Tag, TaggedValue};
use tracing::debug;

use super::{FixtureFormat, FixtureSet};
use crate::backend::{QueryValue, Row};
use crate::error::BuilderResult;

/// Text form of timestamps in fixture files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text form of dates in fixture files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Converts a value to JSON. Binary data becomes a base64 string.
pub fn to_json(value: &QueryValue) -> serde_json::Value {
	use serde_json::Value;

	match value {
		QueryValue::Null => Value::Null,
		QueryValue::Bool(b) => Value::Bool(*b),
		QueryValue::Int(i) => Value::from(*i),
		QueryValue::Float(f) => float_to_json(*f),
		QueryValue::Decimal(d) => {
			use rust_decimal::prelude::ToPrimitive;
			d.to_f64()
				.map(float_to_json)
				.unwrap_or_else(|| Value::String(d.to_string()))
		}
		QueryValue::String(s) => Value::String(s.clone()),
		QueryValue::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
		QueryValue::Timestamp(ts) => Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
		QueryValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
		QueryValue::Json(json) => json.clone(),
	}
}

fn float_to_json(f: f64) -> serde_json::Value {
	serde_json::Number::from_f64(f)
		.map(serde_json::Value::Number)
		.unwrap_or(serde_json::Value::Null)
}

/// Converts a value to YAML. Binary data becomes a `!binary` base64 scalar.
pub fn to_yaml(value: &QueryValue) -> BuilderResult<serde_yaml::Value> {
	use serde_yaml::Value;

	Ok(match value {
		QueryValue::Null => Value::Null,
		QueryValue::Bool(b) => Value::Bool(*b),
		QueryValue::Int(i) => Value::Number((*i).into()),
		QueryValue::Float(f) => Value::Number((*f).into()),
		QueryValue::Bytes(bytes) => Value::Tagged(Box::new(TaggedValue {
			tag: Tag::new("binary"),
			value: Value::String(BASE64.encode(bytes)),
		})),
		QueryValue::Json(json) => serde_yaml::to_value(json)?,
		other => serde_yaml::to_value(to_json(other))?,
	})
}

fn row_to_json(row: &Row) -> serde_json::Value {
	serde_json::Value::Object(
		row.iter()
			.map(|(column, value)| (column.to_string(), to_json(value)))
			.collect(),
	)
}

fn row_to_yaml(row: &Row) -> BuilderResult<serde_yaml::Value> {
	let mut mapping = serde_yaml::Mapping::new();
	for (column, value) in row.iter() {
		mapping.insert(serde_yaml::Value::String(column.to_string()), to_yaml(value)?);
	}
	Ok(serde_yaml::Value::Mapping(mapping))
}

/// Writes fixture sets to per-table files.
#[derive(Debug, Clone)]
pub struct FixtureWriter {
	/// Output directory.
	dir: PathBuf,

	/// Output format.
	format: FixtureFormat,
}

impl FixtureWriter {
	/// Creates a writer for `dir` producing `format` files.
	pub fn new(dir: impl Into<PathBuf>, format: FixtureFormat) -> Self {
		Self {
			dir: dir.into(),
			format,
		}
	}

	/// Serializes a fixture set to a document.
	///
	/// An empty set yields an empty mapping (`{}`), not an empty file.
	pub fn serialize(&self, set: &FixtureSet) -> BuilderResult<String> {
		match self.format {
			FixtureFormat::Json => self.serialize_json(set),
			FixtureFormat::Yaml => self.serialize_yaml(set),
		}
	}

	fn serialize_json(&self, set: &FixtureSet) -> BuilderResult<String> {
		let document: serde_json::Map<String, serde_json::Value> = set
			.iter()
			.map(|(name, row)| (name.to_string(), row_to_json(row)))
			.collect();
		let mut output = serde_json::to_string_pretty(&document)?;
		output.push('\n');
		Ok(output)
	}

	fn serialize_yaml(&self, set: &FixtureSet) -> BuilderResult<String> {
		let mut document = serde_yaml::Mapping::new();
		for (name, row) in set.iter() {
			document.insert(serde_yaml::Value::String(name.to_string()), row_to_yaml(row)?);
		}
		Ok(serde_yaml::to_string(&document)?)
	}

	/// Path of the file for `table`.
	pub fn path_for(&self, table: &str) -> PathBuf {
		self.dir.join(format!("{}.{}", table, self.format.extension()))
	}

	/// Writes `set` to its table's file, replacing any previous content.
	pub fn write(&self, set: &FixtureSet) -> BuilderResult<PathBuf> {
		let content = self.serialize(set)?;
		std::fs::create_dir_all(&self.dir)?;
		let path = self.path_for(&set.table);
		std::fs::write(&path, content)?;
		debug!("Wrote {} record(s) to {}", set.len(), path.display());
		Ok(path)
	}

	/// Returns the output directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Returns the configured output format.
	pub fn format(&self) -> FixtureFormat {
		self.format
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{NaiveDate, TimeZone, Utc};
	use rstest::rstest;
	use serde_json::json;
	use tempfile::tempdir;

	fn sample_set() -> FixtureSet {
		let mut alice = Row::new();
		alice.insert("name", "Alice");
		alice.insert("score", 1.5);
		alice.insert(
			"created_at",
			Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
		);
		alice.insert("tags", QueryValue::Json(json!(["shading", "rooting", "seeding"])));
		let mut bob = Row::new();
		bob.insert("name", "Bob");
		bob.insert("manager", "alice");

		let mut set = FixtureSet::new("users");
		set.insert("alice", alice).unwrap();
		set.insert("bob", bob).unwrap();
		set
	}

	#[rstest]
	fn test_serialize_yaml() {
		let writer = FixtureWriter::new("unused", FixtureFormat::Yaml);
		let output = writer.serialize(&sample_set()).unwrap();

		let expected = "\
alice:
  name: Alice
  score: 1.5
  created_at: 2020-01-02 03:04:05
  tags:
  - shading
  - rooting
  - seeding
bob:
  name: Bob
  manager: alice
";
		assert_eq!(output, expected);
	}

	#[rstest]
	fn test_serialize_json() {
		let writer = FixtureWriter::new("unused", FixtureFormat::Json);
		let output = writer.serialize(&sample_set()).unwrap();

		let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
		assert_eq!(parsed["alice"]["created_at"], json!("2020-01-02 03:04:05"));
		assert_eq!(parsed["alice"]["tags"], json!(["shading", "rooting", "seeding"]));
		assert_eq!(parsed["bob"]["manager"], json!("alice"));
		assert!(output.find("\"alice\"").unwrap() < output.find("\"bob\"").unwrap());
		assert!(output.find("\"name\"").unwrap() < output.find("\"created_at\"").unwrap());
	}

	#[rstest]
	#[case(FixtureFormat::Yaml, "zed:", "amy:")]
	#[case(FixtureFormat::Json, "\"zed\":", "\"amy\":")]
	fn test_serialize_keeps_insertion_order(
		#[case] format: FixtureFormat,
		#[case] first: &str,
		#[case] second: &str,
	) {
		let mut zed = Row::new();
		zed.insert("title", "Z");
		zed.insert("author", "amy");
		let mut set = FixtureSet::new("posts");
		set.insert("zed", zed).unwrap();
		set.insert("amy", Row::new()).unwrap();

		let output = FixtureWriter::new("unused", format).serialize(&set).unwrap();

		let position = |needle: &str| output.find(needle).unwrap();
		assert!(position(first) < position(second), "record order lost:\n{}", output);
		assert!(position("title") < position("author"), "column order lost:\n{}", output);
	}

	#[rstest]
	#[case(FixtureFormat::Yaml, "{}\n")]
	#[case(FixtureFormat::Json, "{}\n")]
	fn test_serialize_empty_set(#[case] format: FixtureFormat, #[case] expected: &str) {
		let writer = FixtureWriter::new("unused", format);
		assert_eq!(writer.serialize(&FixtureSet::new("users")).unwrap(), expected);
	}

	#[rstest]
	fn test_binary_values() {
		let value = QueryValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
		assert_eq!(to_json(&value), json!("3q2+7w=="));

		let yaml = serde_yaml::to_string(&to_yaml(&value).unwrap()).unwrap();
		assert_eq!(yaml, "!binary 3q2+7w==\n");
	}

	#[rstest]
	fn test_date_format() {
		let date = QueryValue::Date(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap());
		assert_eq!(to_json(&date), json!("2021-12-31"));
	}

	#[rstest]
	fn test_write_replaces_existing_file() {
		let dir = tempdir().unwrap();
		let writer = FixtureWriter::new(dir.path().join("fixtures"), FixtureFormat::Yaml);
		let path = writer.path_for("users");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, "stale: {}\n").unwrap();

		let written = writer.write(&sample_set()).unwrap();

		assert_eq!(written, path);
		let content = std::fs::read_to_string(&path).unwrap();
		assert!(!content.contains("stale"));
		assert!(content.starts_with("alice:\n"));
	}
}
