//! Model descriptors and per-table row loading.
//!
//! A table is dumped either through a registered [`ModelDescriptor`]
//! ([`TableSource::Typed`]) or as a plain table ([`TableSource::Raw`]). The
//! choice is made once, when tables are enumerated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::backend::{ColumnKind, DatabaseBackend, QueryValue, Row, TableSchema};
use crate::error::BuilderResult;
use crate::namer::NamingFn;

/// Computes attributes a loaded record exposes without storing them,
/// such as the plaintext behind an encrypted column.
pub type VirtualAttributesFn = Arc<dyn Fn(&Row) -> Vec<(String, QueryValue)> + Send + Sync>;

/// Structured description of a model governing one table.
#[derive(Clone)]
pub struct ModelDescriptor {
	name: String,
	table: String,
	attributes: Option<Vec<String>>,
	column_kinds: HashMap<String, ColumnKind>,
	naming: Option<NamingFn>,
	virtual_attributes: Option<VirtualAttributesFn>,
}

impl ModelDescriptor {
	/// Creates a descriptor for model `name` stored in `table`.
	pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: table.into(),
			attributes: None,
			column_kinds: HashMap::new(),
			naming: None,
			virtual_attributes: None,
		}
	}

	/// Restricts loading to these attributes. Defaults to every schema column.
	pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.attributes = Some(attributes.into_iter().map(Into::into).collect());
		self
	}

	/// Overrides how a column is interpreted, e.g. a `TEXT` column holding JSON.
	pub fn with_column_kind(mut self, column: impl Into<String>, kind: ColumnKind) -> Self {
		self.column_kinds.insert(column.into(), kind);
		self
	}

	/// Registers the naming function for this model's records.
	pub fn with_naming<F>(mut self, naming: F) -> Self
	where
		F: Fn(&Row, &str) -> String + Send + Sync + 'static,
	{
		self.naming = Some(Arc::new(naming));
		self
	}

	/// Registers the computation of virtual attributes.
	pub fn with_virtual_attributes<F>(mut self, reader: F) -> Self
	where
		F: Fn(&Row) -> Vec<(String, QueryValue)> + Send + Sync + 'static,
	{
		self.virtual_attributes = Some(Arc::new(reader));
		self
	}

	/// Model name, e.g. `BlogPost`.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Table the model is stored in.
	pub fn table(&self) -> &str {
		&self.table
	}

	/// Declared attributes, in dump order. `None` means every column.
	pub fn attributes(&self) -> Option<&[String]> {
		self.attributes.as_deref()
	}

	/// Kind overriding the declared column type, if any.
	pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
		self.column_kinds.get(column).copied()
	}

	/// Custom record naming function, if any.
	pub fn naming(&self) -> Option<&NamingFn> {
		self.naming.as_ref()
	}

	/// Names a row with the registered naming function, if there is one.
	pub fn name_record(&self, row: &Row, sequence_index: &str) -> Option<String> {
		self.naming.as_ref().map(|naming| naming(row, sequence_index))
	}
}

impl fmt::Debug for ModelDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ModelDescriptor")
			.field("name", &self.name)
			.field("table", &self.table)
			.field("attributes", &self.attributes)
			.field("column_kinds", &self.column_kinds)
			.field("naming", &self.naming.is_some())
			.field("virtual_attributes", &self.virtual_attributes.is_some())
			.finish()
	}
}

/// Model descriptors keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
	models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a descriptor, replacing any previous one for the same table.
	pub fn register(&mut self, model: ModelDescriptor) {
		self.models.insert(model.table.clone(), model);
	}

	/// Finds the descriptor for `table`.
	pub fn get(&self, table: &str) -> Option<&ModelDescriptor> {
		self.models.get(table)
	}

	/// Finds a descriptor by model name, e.g. the type of a polymorphic reference.
	pub fn by_name(&self, name: &str) -> Option<&ModelDescriptor> {
		self.models.values().find(|model| model.name == name)
	}

	/// Finds a descriptor whose model name matches a snake_case reference
	/// name: `blog_post` matches `BlogPost`.
	pub fn by_reference_name(&self, reference: &str) -> Option<&ModelDescriptor> {
		let wanted: String = reference.chars().filter(|c| *c != '_').collect();
		self.models
			.values()
			.find(|model| model.name.eq_ignore_ascii_case(&wanted))
	}

	/// Returns true if `table` has a descriptor.
	pub fn has_model(&self, table: &str) -> bool {
		self.models.contains_key(table)
	}

	/// Number of registered models.
	pub fn len(&self) -> usize {
		self.models.len()
	}

	/// Returns true if no model is registered.
	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}

	/// Chooses how `table` is dumped.
	pub fn source_for(&self, table: &str) -> TableSource {
		match self.get(table) {
			Some(model) => TableSource::Typed(model.clone()),
			None => TableSource::Raw(table.to_string()),
		}
	}
}

/// How rows of one table are obtained.
#[derive(Debug, Clone)]
pub enum TableSource {
	/// Loaded through a model: declared columns only, in a stable order.
	Typed(ModelDescriptor),
	/// Read as-is: every column, no ordering, no filtering.
	Raw(String),
}

impl TableSource {
	/// Table being dumped.
	pub fn table(&self) -> &str {
		match self {
			TableSource::Typed(model) => model.table(),
			TableSource::Raw(table) => table,
		}
	}

	/// The model, for typed sources.
	pub fn model(&self) -> Option<&ModelDescriptor> {
		match self {
			TableSource::Typed(model) => Some(model),
			TableSource::Raw(_) => None,
		}
	}

	/// Model name, or the table name for raw tables.
	pub fn model_name(&self) -> &str {
		match self {
			TableSource::Typed(model) => model.name(),
			TableSource::Raw(table) => table,
		}
	}

	/// Kind used to interpret `column`, honouring model overrides.
	pub fn column_kind(&self, schema: &TableSchema, column: &str) -> Option<ColumnKind> {
		self.model()
			.and_then(|model| model.column_kind(column))
			.or_else(|| schema.column(column).map(|c| c.kind))
	}

	/// Loads every row of the table.
	///
	/// Typed tables select the model's attributes that exist in the schema,
	/// ordered by `order_by` (falling back to the primary key, then to no
	/// ordering, when the column is missing) with the primary key as a
	/// tie-breaker, and gain the model's virtual attributes. Raw tables are
	/// read with `SELECT *`. Values are coerced by column kind in both cases.
	pub async fn load_rows(
		&self,
		backend: &dyn DatabaseBackend,
		schema: &TableSchema,
		order_by: &str,
	) -> BuilderResult<Vec<Row>> {
		let table = backend.quote_identifier(self.table());
		let sql = match self {
			TableSource::Raw(_) => format!("SELECT * FROM {}", table),
			TableSource::Typed(model) => {
				let columns = self.selected_columns(model, schema);
				let select_list = if columns.is_empty() {
					"*".to_string()
				} else {
					columns
						.iter()
						.map(|c| backend.quote_identifier(c))
						.collect::<Vec<_>>()
						.join(", ")
				};
				let mut sql = format!("SELECT {} FROM {}", select_list, table);
				if let Some(order) = Self::order_clause(backend, schema, order_by) {
					sql.push_str(" ORDER BY ");
					sql.push_str(&order);
				}
				sql
			}
		};

		let rows = backend.fetch_all(&sql, vec![]).await?;
		Ok(rows
			.into_iter()
			.map(|row| self.coerce_row(schema, row))
			.collect())
	}

	fn selected_columns<'a>(
		&self,
		model: &'a ModelDescriptor,
		schema: &'a TableSchema,
	) -> Vec<&'a str> {
		match model.attributes() {
			None => schema.column_names().collect(),
			Some(attributes) => attributes
				.iter()
				.filter(|attribute| {
					let known = schema.has_column(attribute);
					if !known {
						warn!(
							"Model {} declares attribute '{}' that table {} does not store",
							model.name(),
							attribute,
							schema.name
						);
					}
					known
				})
				.map(String::as_str)
				.collect(),
		}
	}

	fn order_clause(
		backend: &dyn DatabaseBackend,
		schema: &TableSchema,
		order_by: &str,
	) -> Option<String> {
		let primary_key = schema.primary_key();
		match (schema.has_column(order_by), primary_key) {
			(true, Some(pk)) if pk != order_by => Some(format!(
				"{} ASC, {} ASC",
				backend.quote_identifier(order_by),
				backend.quote_identifier(pk)
			)),
			(true, _) => Some(format!("{} ASC", backend.quote_identifier(order_by))),
			(false, Some(pk)) => {
				warn!(
					"Table {} has no '{}' column; ordering by {}",
					schema.name, order_by, pk
				);
				Some(format!("{} ASC", backend.quote_identifier(pk)))
			}
			(false, None) => {
				warn!(
					"Table {} has neither '{}' nor a primary key; row order is unspecified",
					schema.name, order_by
				);
				None
			}
		}
	}

	fn coerce_row(&self, schema: &TableSchema, row: Row) -> Row {
		let mut coerced: Row = row
			.into_iter()
			.map(|(column, value)| {
				let value = match self.column_kind(schema, &column) {
					Some(kind) => kind.coerce(value),
					None => value,
				};
				(column, value)
			})
			.collect();

		if let Some(reader) = self.model().and_then(|m| m.virtual_attributes.as_ref()) {
			for (name, value) in reader(&coerced) {
				if !coerced.contains(&name) {
					coerced.insert(name, value);
				}
			}
		}
		coerced
	}
}
