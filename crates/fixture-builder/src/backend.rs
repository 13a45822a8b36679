//! Database access used by the dump engine.
//!
//! The engine only needs a narrow contract from the database: enumerate and
//! introspect tables, run statements, read rows, and bulk-delete everything
//! with referential integrity temporarily relaxed. [`DatabaseBackend`] is that
//! contract; [`SqliteBackend`] implements it over `sqlx`.

pub mod schema;
pub mod sqlite;
pub mod types;

use async_trait::async_trait;

use crate::error::BuilderResult;

pub use schema::{ColumnInfo, ColumnKind, TableSchema};
pub use sqlite::SqliteBackend;
pub use types::{QueryResult, QueryValue, RawId, Row};

/// Database operations required to populate, clean and dump fixtures.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
	/// Returns every user table, sorted by name.
	async fn table_names(&self) -> BuilderResult<Vec<String>>;

	/// Introspects the columns of `table`.
	///
	/// Fails with [`BuilderError::UnknownTable`](crate::BuilderError::UnknownTable)
	/// when the table does not exist.
	async fn table_schema(&self, table: &str) -> BuilderResult<TableSchema>;

	/// Executes a single statement with positional parameters.
	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> BuilderResult<QueryResult>;

	/// Executes a script that may contain several statements.
	async fn execute_script(&self, sql: &str) -> BuilderResult<()>;

	/// Runs a query and returns the rows, decoded by storage class.
	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> BuilderResult<Vec<Row>>;

	/// Deletes every row of `tables`, in any order, ignoring foreign keys.
	async fn delete_all(&self, tables: &[String]) -> BuilderResult<()>;

	/// Quotes an identifier for interpolation into SQL text.
	fn quote_identifier(&self, identifier: &str) -> String {
		format!("\"{}\"", identifier.replace('"', "\"\""))
	}

	/// Returns the positional parameter marker for `index` (1-based).
	fn placeholder(&self, _index: usize) -> String {
		"?".to_string()
	}
}
