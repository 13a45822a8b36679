//! Per-attribute rewriting of loaded rows.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::backend::{ColumnKind, QueryValue, Row, TableSchema};
use crate::config::BuilderConfig;
use crate::fixtures::serializer::to_json;
use crate::models::TableSource;

/// Rewrites raw row values into their portable fixture form.
///
/// Rules, applied in order:
///
/// 1. decimals become floats;
/// 2. opaque columns become a template expression over their plaintext
///    attribute, or are dropped when no plaintext is available;
/// 3. the modification timestamp is dropped;
/// 4. the creation timestamp is kept only when it is at least
///    `recent_window` old and not in the future;
/// 5. null attributes are dropped;
/// 6. attributes the schema does not store are dropped;
/// 7. JSON-typed text is parsed into structured values.
///
/// Every rule is total: a value that cannot be interpreted is left as it is.
#[derive(Debug, Clone, Copy)]
pub struct ValueTransformer<'a> {
	config: &'a BuilderConfig,
	now: DateTime<Utc>,
}

impl<'a> ValueTransformer<'a> {
	/// Creates a transformer judging timestamps against `now`.
	pub fn new(config: &'a BuilderConfig, now: DateTime<Utc>) -> Self {
		Self { config, now }
	}

	/// Transforms one row of the table described by `source` and `schema`.
	pub fn transform(&self, source: &TableSource, schema: &TableSchema, row: &Row) -> Row {
		let mut output = Row::new();
		for (column, value) in row.iter() {
			let value = match value {
				QueryValue::Decimal(d) => match d.to_f64() {
					Some(f) => QueryValue::Float(f),
					None => QueryValue::String(d.to_string()),
				},
				other => other.clone(),
			};

			let value = match self.config.opaque.attribute_for(column) {
				Some(attribute) if !value.is_null() => {
					match self.opaque_expression(source, column, attribute, row) {
						Some(expression) => QueryValue::String(expression),
						None => continue,
					}
				}
				_ => value,
			};

			if column == self.config.updated_at_column {
				continue;
			}
			let value = if column == self.config.created_at_column {
				match self.intentional_creation(value) {
					Some(value) => value,
					None => continue,
				}
			} else {
				value
			};
			if value.is_null() {
				continue;
			}
			if !schema.has_column(column) {
				continue;
			}

			let value = match (source.column_kind(schema, column), value) {
				(Some(ColumnKind::Json), value @ QueryValue::String(_)) => {
					ColumnKind::Json.coerce(value)
				}
				(_, value) => value,
			};
			output.insert(column, value);
		}
		output
	}

	fn opaque_expression(
		&self,
		source: &TableSource,
		column: &str,
		attribute: &str,
		row: &Row,
	) -> Option<String> {
		let plaintext = row.get(attribute)?;
		let quoted = to_json(plaintext).to_string();
		Some(
			self.config
				.opaque
				.render(source.model_name(), column, attribute, &quoted),
		)
	}

	/// Returns the creation timestamp when it was set on purpose rather than
	/// stamped automatically at insert time.
	///
	/// Text and epoch-second values are read as timestamps, so a historical
	/// value survives whatever column type stores it.
	fn intentional_creation(&self, value: QueryValue) -> Option<QueryValue> {
		let value = match value {
			value @ QueryValue::String(_) => match ColumnKind::Timestamp.coerce(value) {
				value @ QueryValue::String(_) => ColumnKind::Date.coerce(value),
				value => value,
			},
			value @ QueryValue::Int(_) => ColumnKind::Timestamp.coerce(value),
			value => value,
		};
		let created = match &value {
			QueryValue::Timestamp(ts) => *ts,
			QueryValue::Date(d) => d.and_hms_opt(0, 0, 0)?.and_utc(),
			_ => return None,
		};
		(created <= self.now && created <= self.now - self.config.recent_window).then_some(value)
	}
}
