//! Fixture format definitions.
//!
//! A fixture file holds one table: a mapping from symbolic record name to the
//! record's attributes.
//!
//! ```yaml
//! alice:
//!   name: Alice
//!   created_at: 2020-01-01 00:00:00
//! bob:
//!   name: Bob
//!   manager: alice
//! ```

use std::path::Path;

use indexmap::IndexMap;

use crate::backend::Row;
use crate::error::{BuilderError, BuilderResult};

/// Supported fixture file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FixtureFormat {
	/// YAML format (default).
	#[default]
	Yaml,

	/// JSON format.
	Json,
}

impl FixtureFormat {
	/// Determines the fixture format from a file extension.
	///
	/// ```
	/// # use fixture_builder::fixtures::FixtureFormat;
	/// assert_eq!(FixtureFormat::from_extension("json"), Some(FixtureFormat::Json));
	/// assert_eq!(FixtureFormat::from_extension("yaml"), Some(FixtureFormat::Yaml));
	/// assert_eq!(FixtureFormat::from_extension("yml"), Some(FixtureFormat::Yaml));
	/// assert_eq!(FixtureFormat::from_extension("xml"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the fixture format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}

	/// Returns the extension generated files are written with.
	pub fn extension(&self) -> &'static str {
		match self {
			Self::Json => "json",
			Self::Yaml => "yml",
		}
	}
}

impl std::fmt::Display for FixtureFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}

impl std::str::FromStr for FixtureFormat {
	type Err = BuilderError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_extension(s).ok_or_else(|| BuilderError::UnsupportedExtension(s.to_string()))
	}
}

/// Named records of one table, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSet {
	/// Table the records belong to.
	pub table: String,

	records: IndexMap<String, Row>,
}

impl FixtureSet {
	/// Creates an empty set for `table`.
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			records: IndexMap::new(),
		}
	}

	/// Appends a record.
	///
	/// # Errors
	///
	/// Returns [`BuilderError::DuplicateRecordName`] if `name` is already used
	/// in this table.
	pub fn insert(&mut self, name: impl Into<String>, record: Row) -> BuilderResult<()> {
		let name = name.into();
		if self.records.contains_key(&name) {
			return Err(BuilderError::DuplicateRecordName {
				table: self.table.clone(),
				name,
			});
		}
		self.records.insert(name, record);
		Ok(())
	}

	/// Returns the record called `name`.
	pub fn get(&self, name: &str) -> Option<&Row> {
		self.records.get(name)
	}

	/// Returns the number of records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if there are no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Record names in output order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.records.keys().map(String::as_str)
	}

	/// Returns an iterator over `(name, record)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
		self.records.iter().map(|(name, row)| (name.as_str(), row))
	}
}

impl<'a> IntoIterator for &'a FixtureSet {
	type Item = (&'a String, &'a Row);
	type IntoIter = indexmap::map::Iter<'a, String, Row>;

	fn into_iter(self) -> Self::IntoIter {
		self.records.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::path::PathBuf;

	#[rstest]
	#[case("json", Some(FixtureFormat::Json))]
	#[case("JSON", Some(FixtureFormat::Json))]
	#[case("yaml", Some(FixtureFormat::Yaml))]
	#[case("yml", Some(FixtureFormat::Yaml))]
	#[case("xml", None)]
	fn test_fixture_format_from_extension(
		#[case] ext: &str,
		#[case] expected: Option<FixtureFormat>,
	) {
		assert_eq!(FixtureFormat::from_extension(ext), expected);
	}

	#[rstest]
	fn test_fixture_format_from_path() {
		assert_eq!(
			FixtureFormat::from_path(&PathBuf::from("users.json")),
			Some(FixtureFormat::Json)
		);
		assert_eq!(
			FixtureFormat::from_path(&PathBuf::from("users.yml")),
			Some(FixtureFormat::Yaml)
		);
		assert_eq!(FixtureFormat::from_path(&PathBuf::from("no_extension")), None);
	}

	#[rstest]
	fn test_fixture_format_parse() {
		assert_eq!("yml".parse::<FixtureFormat>().unwrap(), FixtureFormat::Yaml);
		assert!(matches!(
			"csv".parse::<FixtureFormat>(),
			Err(BuilderError::UnsupportedExtension(_))
		));
	}

	#[rstest]
	fn test_fixture_set_keeps_insertion_order() {
		let mut set = FixtureSet::new("users");
		set.insert("zed", Row::new()).unwrap();
		set.insert("amy", Row::new()).unwrap();

		assert_eq!(set.names().collect::<Vec<_>>(), vec!["zed", "amy"]);
		assert_eq!(set.len(), 2);
	}

	#[rstest]
	fn test_fixture_set_rejects_duplicate_names() {
		let mut set = FixtureSet::new("users");
		set.insert("amy", Row::new()).unwrap();
		let result = set.insert("amy", Row::new());

		assert!(matches!(
			result,
			Err(BuilderError::DuplicateRecordName { ref table, ref name })
				if table == "users" && name == "amy"
		));
	}
}
