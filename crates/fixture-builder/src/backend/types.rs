//! Value and row types shared by backends, transformers and writers.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// A single column value as read from (or written to) the database.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
	/// SQL NULL.
	Null,
	/// Boolean.
	Bool(bool),
	/// 64-bit integer.
	Int(i64),
	/// Double precision float.
	Float(f64),
	/// Exact decimal.
	Decimal(Decimal),
	/// Text.
	String(String),
	/// Binary data.
	Bytes(Vec<u8>),
	/// UTC timestamp.
	Timestamp(DateTime<Utc>),
	/// Calendar date.
	Date(NaiveDate),
	/// Structured JSON document.
	Json(serde_json::Value),
}

impl QueryValue {
	/// Returns true for SQL `NULL`.
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}

	/// Returns the string payload, if this is a text value.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			QueryValue::String(s) => Some(s),
			_ => None,
		}
	}

	/// Interprets the value as a row identifier.
	///
	/// Integers and non-empty strings qualify; everything else does not.
	pub fn as_raw_id(&self) -> Option<RawId> {
		match self {
			QueryValue::Int(i) => Some(RawId::from(*i)),
			QueryValue::String(s) if !s.is_empty() => Some(RawId::from(s.as_str())),
			_ => None,
		}
	}
}

impl From<&str> for QueryValue {
	fn from(s: &str) -> Self {
		QueryValue::String(s.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(s: String) -> Self {
		QueryValue::String(s)
	}
}

impl From<i64> for QueryValue {
	fn from(i: i64) -> Self {
		QueryValue::Int(i)
	}
}

impl From<i32> for QueryValue {
	fn from(i: i32) -> Self {
		QueryValue::Int(i as i64)
	}
}

impl From<f64> for QueryValue {
	fn from(f: f64) -> Self {
		QueryValue::Float(f)
	}
}

impl From<bool> for QueryValue {
	fn from(b: bool) -> Self {
		QueryValue::Bool(b)
	}
}

impl From<Decimal> for QueryValue {
	fn from(d: Decimal) -> Self {
		QueryValue::Decimal(d)
	}
}

impl From<DateTime<Utc>> for QueryValue {
	fn from(dt: DateTime<Utc>) -> Self {
		QueryValue::Timestamp(dt)
	}
}

impl From<NaiveDate> for QueryValue {
	fn from(d: NaiveDate) -> Self {
		QueryValue::Date(d)
	}
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(QueryValue::Null)
	}
}

impl From<&serde_json::Value> for QueryValue {
	/// Scalars map onto their native variant; arrays and objects stay JSON.
	fn from(value: &serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => QueryValue::Null,
			serde_json::Value::Bool(b) => QueryValue::Bool(*b),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(i) => QueryValue::Int(i),
				None => QueryValue::Float(n.as_f64().unwrap_or_default()),
			},
			serde_json::Value::String(s) => QueryValue::String(s.clone()),
			other => QueryValue::Json(other.clone()),
		}
	}
}

/// Database-generated identifier of a row, normalized to its text form.
///
/// Integer and string keys compare equal when their text matches, so an
/// `author_id` read as `INTEGER` finds a record registered with `"7"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(String);

impl RawId {
	/// Returns the identifier text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<i64> for RawId {
	fn from(id: i64) -> Self {
		RawId(id.to_string())
	}
}

impl From<i32> for RawId {
	fn from(id: i32) -> Self {
		RawId(id.to_string())
	}
}

impl From<&str> for RawId {
	fn from(id: &str) -> Self {
		RawId(id.to_string())
	}
}

impl From<String> for RawId {
	fn from(id: String) -> Self {
		RawId(id)
	}
}

impl fmt::Display for RawId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Result of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResult {
	/// Number of rows changed.
	pub rows_affected: u64,
	/// Rowid of the last inserted row, when the backend reports one.
	pub last_insert_id: Option<i64>,
}

/// Row from a query result, columns kept in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
	data: IndexMap<String, QueryValue>,
}

impl Row {
	/// Creates an empty row.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key`, keeping its position when it already exists.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
		self.data.insert(key.into(), value.into());
	}

	/// Returns the value of column `key`.
	pub fn get(&self, key: &str) -> Option<&QueryValue> {
		self.data.get(key)
	}

	/// Returns true if the row has column `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.data.contains_key(key)
	}

	/// Number of columns.
	pub fn len(&self) -> usize {
		self.data.len()
	}

	/// Returns true if the row has no columns.
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Column names in select order.
	pub fn columns(&self) -> impl Iterator<Item = &str> {
		self.data.keys().map(String::as_str)
	}

	/// `(column, value)` pairs in select order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
		self.data.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Identifier stored under `primary_key`, if any.
	pub fn id(&self, primary_key: &str) -> Option<RawId> {
		self.get(primary_key).and_then(QueryValue::as_raw_id)
	}

	/// Consumes the row, returning its columns.
	pub fn into_inner(self) -> IndexMap<String, QueryValue> {
		self.data
	}
}

impl FromIterator<(String, QueryValue)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, QueryValue)>>(iter: I) -> Self {
		Self {
			data: iter.into_iter().collect(),
		}
	}
}

impl IntoIterator for Row {
	type Item = (String, QueryValue);
	type IntoIter = indexmap::map::IntoIter<String, QueryValue>;

	fn into_iter(self) -> Self::IntoIter {
		self.data.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(QueryValue::Int(7), Some("7"))]
	#[case(QueryValue::String("a1b2".to_string()), Some("a1b2"))]
	#[case(QueryValue::String(String::new()), None)]
	#[case(QueryValue::Null, None)]
	#[case(QueryValue::Float(1.5), None)]
	fn test_as_raw_id(#[case] value: QueryValue, #[case] expected: Option<&str>) {
		assert_eq!(value.as_raw_id().as_ref().map(RawId::as_str), expected);
	}

	#[rstest]
	fn test_raw_id_int_and_text_agree() {
		assert_eq!(RawId::from(42), RawId::from("42"));
	}

	#[rstest]
	fn test_row_preserves_column_order() {
		let mut row = Row::new();
		row.insert("id", 1);
		row.insert("name", "alice");
		row.insert("email", "alice@example.com");

		let columns: Vec<&str> = row.columns().collect();
		assert_eq!(columns, vec!["id", "name", "email"]);
		assert_eq!(row.id("id"), Some(RawId::from(1)));
	}

	#[rstest]
	fn test_from_json_value() {
		assert_eq!(QueryValue::from(&json!(3)), QueryValue::Int(3));
		assert_eq!(QueryValue::from(&json!(2.5)), QueryValue::Float(2.5));
		assert_eq!(QueryValue::from(&json!(null)), QueryValue::Null);
		assert_eq!(
			QueryValue::from(&json!(["a", "b"])),
			QueryValue::Json(json!(["a", "b"]))
		);
	}

	#[rstest]
	fn test_from_option() {
		assert_eq!(QueryValue::from(None::<i64>), QueryValue::Null);
		assert_eq!(QueryValue::from(Some("x")), QueryValue::String("x".into()));
	}
}
