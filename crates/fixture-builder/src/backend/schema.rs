//! Table schema as reported by backend introspection.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use super::types::QueryValue;

/// How values of a column are interpreted after they are read.
///
/// Derived from the declared SQL type using SQLite-style affinity rules,
/// refined by a few well-known type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
	/// Whole numbers.
	Integer,
	/// Floating point numbers.
	Real,
	/// Exact decimals stored as text or numbers.
	Decimal,
	/// `0`/`1` or `t`/`f` flags.
	Boolean,
	/// Plain text.
	Text,
	/// Binary data.
	Blob,
	/// Date and time, read as UTC.
	Timestamp,
	/// Calendar date.
	Date,
	/// Text holding a JSON document.
	Json,
}

impl ColumnKind {
	/// Classifies a declared column type such as `VARCHAR(255)` or `DECIMAL(10,2)`.
	pub fn from_declared_type(declared: &str) -> Self {
		let declared = declared.to_uppercase();

		// Order matters: "DATETIME" contains "DATE", "BIGINT" contains "INT".
		if declared.contains("BOOL") {
			ColumnKind::Boolean
		} else if declared.contains("JSON") {
			ColumnKind::Json
		} else if declared.contains("DATETIME") || declared.contains("TIMESTAMP") {
			ColumnKind::Timestamp
		} else if declared.contains("DATE") {
			ColumnKind::Date
		} else if declared.contains("DECIMAL")
			|| declared.contains("NUMERIC")
			|| declared.contains("MONEY")
		{
			ColumnKind::Decimal
		} else if declared.contains("INT") {
			ColumnKind::Integer
		} else if declared.contains("CHAR")
			|| declared.contains("CLOB")
			|| declared.contains("TEXT")
		{
			ColumnKind::Text
		} else if declared.contains("BLOB") || declared.contains("BINARY") {
			ColumnKind::Blob
		} else if declared.contains("REAL")
			|| declared.contains("FLOA")
			|| declared.contains("DOUB")
		{
			ColumnKind::Real
		} else {
			ColumnKind::Text
		}
	}

	/// Reinterprets a value decoded by storage class according to this kind.
	///
	/// Values that do not parse are returned unchanged.
	pub fn coerce(self, value: QueryValue) -> QueryValue {
		match (self, value) {
			(_, QueryValue::Null) => QueryValue::Null,
			(ColumnKind::Boolean, QueryValue::Int(i)) => QueryValue::Bool(i != 0),
			(ColumnKind::Boolean, QueryValue::String(s)) => match s.to_lowercase().as_str() {
				"t" | "true" | "1" => QueryValue::Bool(true),
				"f" | "false" | "0" => QueryValue::Bool(false),
				_ => QueryValue::String(s),
			},
			(ColumnKind::Decimal, QueryValue::Int(i)) => QueryValue::Decimal(Decimal::from(i)),
			(ColumnKind::Decimal, QueryValue::String(s)) => match Decimal::from_str(s.trim()) {
				Ok(d) => QueryValue::Decimal(d),
				Err(_) => QueryValue::String(s),
			},
			(ColumnKind::Timestamp, QueryValue::String(s)) => match parse_timestamp(&s) {
				Some(ts) => QueryValue::Timestamp(ts),
				None => QueryValue::String(s),
			},
			(ColumnKind::Timestamp, QueryValue::Int(secs)) => {
				match DateTime::<Utc>::from_timestamp(secs, 0) {
					Some(ts) => QueryValue::Timestamp(ts),
					None => QueryValue::Int(secs),
				}
			}
			(ColumnKind::Date, QueryValue::String(s)) => {
				match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
					Ok(d) => QueryValue::Date(d),
					Err(_) => match parse_timestamp(&s) {
						Some(ts) => QueryValue::Date(ts.date_naive()),
						None => QueryValue::String(s),
					},
				}
			}
			(ColumnKind::Json, QueryValue::String(s)) => {
				match serde_json::from_str::<serde_json::Value>(&s) {
					Ok(json) => QueryValue::Json(json),
					Err(_) => QueryValue::String(s),
				}
			}
			(_, value) => value,
		}
	}
}

/// Parses the timestamp text forms SQLite applications commonly store.
///
/// Offsets are converted to UTC; naive values are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
	const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

	let text = text.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
		return Some(ts.with_timezone(&Utc));
	}
	if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
		return Some(ts.with_timezone(&Utc));
	}
	NAIVE_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
		.map(|naive| naive.and_utc())
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
	/// Column name.
	pub name: String,
	/// Type as written in the table definition.
	pub declared_type: String,
	/// Interpretation derived from `declared_type`.
	pub kind: ColumnKind,
	/// Whether the column accepts NULL.
	pub nullable: bool,
	/// Whether the column is part of the primary key.
	pub primary_key: bool,
}

impl ColumnInfo {
	/// Creates a nullable, non-key column.
	pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
		let declared_type = declared_type.into();
		Self {
			name: name.into(),
			kind: ColumnKind::from_declared_type(&declared_type),
			declared_type,
			nullable: true,
			primary_key: false,
		}
	}

	/// Sets whether the column accepts NULL.
	pub fn with_nullable(mut self, nullable: bool) -> Self {
		self.nullable = nullable;
		self
	}

	/// Marks the column as (part of) the primary key.
	pub fn with_primary_key(mut self, primary_key: bool) -> Self {
		self.primary_key = primary_key;
		self
	}
}

/// Columns of one table, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
	/// Table name.
	pub name: String,
	/// Columns in declaration order.
	pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
	/// Creates a schema for `name`.
	pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
		Self {
			name: name.into(),
			columns,
		}
	}

	/// Looks up a column by name.
	pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
		self.columns.iter().find(|c| c.name == name)
	}

	/// Returns true if the table stores `name`.
	pub fn has_column(&self, name: &str) -> bool {
		self.column(name).is_some()
	}

	/// Column names in declaration order.
	pub fn column_names(&self) -> impl Iterator<Item = &str> {
		self.columns.iter().map(|c| c.name.as_str())
	}

	/// Name of the single-column primary key, if the table has exactly one.
	pub fn primary_key(&self) -> Option<&str> {
		let mut keys = self.columns.iter().filter(|c| c.primary_key);
		match (keys.next(), keys.next()) {
			(Some(key), None) => Some(key.name.as_str()),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("INTEGER", ColumnKind::Integer)]
	#[case("bigint", ColumnKind::Integer)]
	#[case("VARCHAR(255)", ColumnKind::Text)]
	#[case("DECIMAL(10,2)", ColumnKind::Decimal)]
	#[case("numeric", ColumnKind::Decimal)]
	#[case("BOOLEAN", ColumnKind::Boolean)]
	#[case("DATETIME", ColumnKind::Timestamp)]
	#[case("timestamp", ColumnKind::Timestamp)]
	#[case("DATE", ColumnKind::Date)]
	#[case("JSON", ColumnKind::Json)]
	#[case("BLOB", ColumnKind::Blob)]
	#[case("DOUBLE PRECISION", ColumnKind::Real)]
	#[case("", ColumnKind::Text)]
	fn test_from_declared_type(#[case] declared: &str, #[case] expected: ColumnKind) {
		assert_eq!(ColumnKind::from_declared_type(declared), expected);
	}

	#[rstest]
	fn test_coerce_boolean_and_decimal() {
		assert_eq!(ColumnKind::Boolean.coerce(QueryValue::Int(1)), QueryValue::Bool(true));
		assert_eq!(
			ColumnKind::Decimal.coerce(QueryValue::String("12.50".into())),
			QueryValue::Decimal(Decimal::new(1250, 2))
		);
		assert_eq!(ColumnKind::Text.coerce(QueryValue::Int(1)), QueryValue::Int(1));
	}

	#[rstest]
	#[case("2020-01-02 03:04:05")]
	#[case("2020-01-02T03:04:05")]
	#[case("2020-01-02 03:04:05.000")]
	#[case("2020-01-02T03:04:05Z")]
	#[case("2020-01-02T05:04:05+02:00")]
	fn test_parse_timestamp_forms(#[case] text: &str) {
		let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
			.and_then(|d| d.and_hms_opt(3, 4, 5))
			.map(|naive| naive.and_utc());
		assert_eq!(parse_timestamp(text), expected);
	}

	#[rstest]
	fn test_coerce_unparseable_keeps_text() {
		let value = QueryValue::String("yesterday-ish".into());
		assert_eq!(ColumnKind::Timestamp.coerce(value.clone()), value);
		let value = QueryValue::String("{broken".into());
		assert_eq!(ColumnKind::Json.coerce(value.clone()), value);
	}

	#[rstest]
	fn test_coerce_json_list_keeps_order() {
		let value = QueryValue::String(r#"["shading","rooting","seeding"]"#.into());
		assert_eq!(
			ColumnKind::Json.coerce(value),
			QueryValue::Json(serde_json::json!(["shading", "rooting", "seeding"]))
		);
	}

	#[rstest]
	fn test_primary_key_single_column() {
		let schema = TableSchema::new(
			"users",
			vec![
				ColumnInfo::new("id", "INTEGER").with_primary_key(true),
				ColumnInfo::new("name", "TEXT"),
			],
		);
		assert_eq!(schema.primary_key(), Some("id"));
		assert!(schema.has_column("name"));
		assert!(!schema.has_column("email"));
	}

	#[rstest]
	fn test_primary_key_composite_is_none() {
		let schema = TableSchema::new(
			"memberships",
			vec![
				ColumnInfo::new("user_id", "INTEGER").with_primary_key(true),
				ColumnInfo::new("group_id", "INTEGER").with_primary_key(true),
			],
		);
		assert_eq!(schema.primary_key(), None);
	}
}
