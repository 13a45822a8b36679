//! Fixture parsing functionality.
//!
//! Reads existing fixture files (YAML or JSON) back into [`FixtureSet`]s. The
//! table a file belongs to is its file stem: `fixtures/users.yml` holds
//! `users` records.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::{FixtureFormat, FixtureSet};
use crate::backend::{QueryValue, Row};
use crate::error::{BuilderError, BuilderResult};

/// Parser for fixture files.
#[derive(Debug, Default)]
pub struct FixtureParser;

impl FixtureParser {
	/// Creates a new fixture parser.
	pub fn new() -> Self {
		Self
	}

	/// Parses a fixture file from the given path.
	///
	/// The format is detected from the file extension and the table name is
	/// taken from the file stem.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The file extension is not recognized
	/// - The file cannot be read
	/// - The content is not a mapping of names to attribute mappings
	pub fn parse_file(&self, path: &Path) -> BuilderResult<FixtureSet> {
		let format = FixtureFormat::from_path(path).ok_or_else(|| {
			BuilderError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;
		let table = path
			.file_stem()
			.and_then(|stem| stem.to_str())
			.ok_or_else(|| invalid(path, "file name is not valid UTF-8"))?;

		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				invalid(path, "file not found")
			} else {
				BuilderError::Io(e)
			}
		})?;

		self.parse_string(&content, format, table)
			.map_err(|e| match e {
				BuilderError::InvalidFixture { message, .. } => invalid(path, message),
				BuilderError::Yaml(e) => invalid(path, e.to_string()),
				BuilderError::Json(e) => invalid(path, e.to_string()),
				other => other,
			})
	}

	/// Parses fixture content for `table`.
	///
	/// Empty documents yield an empty set.
	pub fn parse_string(
		&self,
		content: &str,
		format: FixtureFormat,
		table: &str,
	) -> BuilderResult<FixtureSet> {
		match format {
			FixtureFormat::Json => self.parse_json(content, table),
			FixtureFormat::Yaml => self.parse_yaml(content, table),
		}
	}

	fn parse_json(&self, content: &str, table: &str) -> BuilderResult<FixtureSet> {
		let value: serde_json::Value = serde_json::from_str(content)?;
		let mut set = FixtureSet::new(table);
		let records = match value {
			serde_json::Value::Null => return Ok(set),
			serde_json::Value::Object(records) => records,
			_ => return Err(invalid("", "expected a mapping of record names")),
		};

		for (name, attributes) in records {
			let serde_json::Value::Object(attributes) = attributes else {
				return Err(invalid("", format!("record '{}' is not a mapping", name)));
			};
			let row: Row = attributes
				.iter()
				.map(|(column, value)| (column.clone(), QueryValue::from(value)))
				.collect();
			set.insert(name, row)?;
		}
		Ok(set)
	}

	fn parse_yaml(&self, content: &str, table: &str) -> BuilderResult<FixtureSet> {
		let mut set = FixtureSet::new(table);
		if content.trim().is_empty() {
			return Ok(set);
		}
		let value: serde_yaml::Value = serde_yaml::from_str(content)?;
		let records = match value {
			serde_yaml::Value::Null => return Ok(set),
			serde_yaml::Value::Mapping(records) => records,
			_ => return Err(invalid("", "expected a mapping of record names")),
		};

		for (name, attributes) in records {
			let name = scalar_key(&name)
				.ok_or_else(|| invalid("", "record names must be scalars"))?;
			let attributes = match attributes {
				serde_yaml::Value::Mapping(attributes) => attributes,
				serde_yaml::Value::Null => serde_yaml::Mapping::new(),
				_ => return Err(invalid("", format!("record '{}' is not a mapping", name))),
			};

			let mut row = Row::new();
			for (column, value) in attributes {
				let column = scalar_key(&column).ok_or_else(|| {
					invalid("", format!("record '{}' has a non-scalar column name", name))
				})?;
				row.insert(column, yaml_to_value(value)?);
			}
			set.insert(name, row)?;
		}
		Ok(set)
	}
}

fn invalid(path: impl AsRef<Path>, message: impl Into<String>) -> BuilderError {
	BuilderError::InvalidFixture {
		path: path.as_ref().to_path_buf(),
		message: message.into(),
	}
}

fn scalar_key(value: &serde_yaml::Value) -> Option<String> {
	match value {
		serde_yaml::Value::String(s) => Some(s.clone()),
		serde_yaml::Value::Number(n) => Some(n.to_string()),
		serde_yaml::Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn yaml_to_value(value: serde_yaml::Value) -> BuilderResult<QueryValue> {
	use serde_yaml::Value;

	Ok(match value {
		Value::Null => QueryValue::Null,
		Value::Bool(b) => QueryValue::Bool(b),
		Value::Number(n) => match n.as_i64() {
			Some(i) => QueryValue::Int(i),
			None => QueryValue::Float(n.as_f64().unwrap_or_default()),
		},
		Value::String(s) => QueryValue::String(s),
		Value::Tagged(tagged) if tagged.tag == "binary" => match tagged.value {
			Value::String(encoded) => {
				let compact: String = encoded.split_whitespace().collect();
				let bytes = BASE64
					.decode(compact.as_bytes())
					.map_err(|e| invalid("", format!("invalid !binary value: {}", e)))?;
				QueryValue::Bytes(bytes)
			}
			_ => return Err(invalid("", "!binary value must be a string")),
		},
		Value::Tagged(tagged) => yaml_to_value(tagged.value)?,
		structured @ (Value::Sequence(_) | Value::Mapping(_)) => {
			QueryValue::Json(serde_json::to_value(structured)?)
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use tempfile::tempdir;

	#[rstest]
	fn test_parse_yaml() {
		let parser = FixtureParser::new();
		let content = r#"
admin:
  id: 1
  username: admin
  roles: [staff, owner]
guest:
  username: guest
  active: false
"#;

		let set = parser.parse_string(content, FixtureFormat::Yaml, "users").unwrap();
		assert_eq!(set.table, "users");
		assert_eq!(set.names().collect::<Vec<_>>(), vec!["admin", "guest"]);
		let admin = set.get("admin").unwrap();
		assert_eq!(admin.get("id"), Some(&QueryValue::Int(1)));
		assert_eq!(admin.get("roles"), Some(&QueryValue::Json(json!(["staff", "owner"]))));
		assert_eq!(
			set.get("guest").unwrap().get("active"),
			Some(&QueryValue::Bool(false))
		);
	}

	#[rstest]
	fn test_parse_json() {
		let parser = FixtureParser::new();
		let content = r#"{"admin": {"id": 1, "username": "admin"}}"#;

		let set = parser.parse_string(content, FixtureFormat::Json, "users").unwrap();
		assert_eq!(set.len(), 1);
		assert_eq!(
			set.get("admin").unwrap().get("username"),
			Some(&QueryValue::String("admin".into()))
		);
	}

	#[rstest]
	fn test_parse_json_keeps_document_order() {
		let content = r#"{"zoe": {"title": "Z", "author": "amy"}, "amy": {}}"#;

		let set = FixtureParser::new()
			.parse_string(content, FixtureFormat::Json, "users")
			.unwrap();
		assert_eq!(set.names().collect::<Vec<_>>(), vec!["zoe", "amy"]);
		let columns: Vec<&str> = set.get("zoe").unwrap().iter().map(|(c, _)| c).collect();
		assert_eq!(columns, vec!["title", "author"]);
	}

	#[rstest]
	fn test_parse_yaml_binary() {
		let parser = FixtureParser::new();
		let content = "logo:\n  data: !binary 3q2+7w==\n";

		let set = parser.parse_string(content, FixtureFormat::Yaml, "images").unwrap();
		assert_eq!(
			set.get("logo").unwrap().get("data"),
			Some(&QueryValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]))
		);
	}

	#[rstest]
	#[case(FixtureFormat::Yaml, "")]
	#[case(FixtureFormat::Yaml, "{}\n")]
	#[case(FixtureFormat::Json, "{}")]
	fn test_parse_empty_documents(#[case] format: FixtureFormat, #[case] content: &str) {
		let set = FixtureParser::new().parse_string(content, format, "users").unwrap();
		assert!(set.is_empty());
	}

	#[rstest]
	#[case(FixtureFormat::Yaml, "- a\n- b\n")]
	#[case(FixtureFormat::Yaml, "admin: 3\n")]
	#[case(FixtureFormat::Json, "[1, 2]")]
	#[case(FixtureFormat::Json, r#"{"admin": "x"}"#)]
	fn test_parse_rejects_non_mappings(#[case] format: FixtureFormat, #[case] content: &str) {
		let result = FixtureParser::new().parse_string(content, format, "users");
		assert!(matches!(result, Err(BuilderError::InvalidFixture { .. })));
	}

	#[rstest]
	fn test_parse_file_uses_stem_as_table() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("accounts.yml");
		std::fs::write(&path, "acme:\n  name: Acme\n").unwrap();

		let set = FixtureParser::new().parse_file(&path).unwrap();
		assert_eq!(set.table, "accounts");
		assert!(set.get("acme").is_some());
	}

	#[rstest]
	fn test_parse_file_reports_path() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("broken.yml");
		std::fs::write(&path, "admin: [unclosed\n").unwrap();

		let result = FixtureParser::new().parse_file(&path);
		assert!(matches!(
			result,
			Err(BuilderError::InvalidFixture { path: ref reported, .. }) if reported == &path
		));
	}

	#[rstest]
	fn test_parse_file_not_found() {
		let result = FixtureParser::new().parse_file(Path::new("/nonexistent/users.yml"));
		assert!(matches!(result, Err(BuilderError::InvalidFixture { .. })));
	}

	#[rstest]
	fn test_parse_unsupported_extension() {
		let result = FixtureParser::new().parse_file(Path::new("users.xml"));
		assert!(matches!(result, Err(BuilderError::UnsupportedExtension(_))));
	}
}
