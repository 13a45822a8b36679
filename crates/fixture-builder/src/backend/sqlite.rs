//! SQLite backend implementation

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as SqlxRow, Sqlite, SqliteConnection, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

use super::schema::{ColumnInfo, TableSchema};
use super::types::{QueryResult, QueryValue, Row};
use super::DatabaseBackend;
use crate::error::{BuilderError, BuilderResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQLite database backend
pub struct SqliteBackend {
	pool: SqlitePool,
}

impl SqliteBackend {
	/// Wraps an existing pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Opens `url` (e.g. `sqlite::memory:` or `sqlite://db/test.sqlite3`).
	///
	/// The pool holds a single long-lived connection: generation is strictly
	/// sequential, per-connection pragmas must stick, and an in-memory database
	/// only exists for as long as its connection does.
	pub async fn connect(url: &str) -> BuilderResult<Self> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await?;
		Ok(Self::new(pool))
	}

	/// Returns the underlying pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	fn bind_value<'q>(
		query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
		value: &QueryValue,
	) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
		match value {
			QueryValue::Null => query.bind(None::<i64>),
			QueryValue::Bool(b) => query.bind(*b),
			QueryValue::Int(i) => query.bind(*i),
			QueryValue::Float(f) => query.bind(*f),
			// Decimals are stored as text so no precision is lost to REAL.
			QueryValue::Decimal(d) => query.bind(d.to_string()),
			QueryValue::String(s) => query.bind(s.clone()),
			QueryValue::Bytes(b) => query.bind(b.clone()),
			QueryValue::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
			QueryValue::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
			QueryValue::Json(json) => query.bind(json.to_string()),
		}
	}

	/// Decodes a row by the storage class of each value.
	///
	/// Declared-type interpretation (booleans, decimals, timestamps, JSON) is
	/// left to [`ColumnKind::coerce`](super::ColumnKind::coerce), which needs the
	/// table schema this function does not have.
	fn convert_row(sqlite_row: &SqliteRow) -> BuilderResult<Row> {
		let mut row = Row::new();
		for (index, column) in sqlite_row.columns().iter().enumerate() {
			let raw = sqlite_row.try_get_raw(index)?;
			let value = if raw.is_null() {
				QueryValue::Null
			} else {
				let storage = raw.type_info().name().to_uppercase();
				match storage.as_str() {
					"INTEGER" => QueryValue::Int(sqlite_row.try_get_unchecked::<i64, _>(index)?),
					"REAL" => QueryValue::Float(sqlite_row.try_get_unchecked::<f64, _>(index)?),
					"BLOB" => {
						QueryValue::Bytes(sqlite_row.try_get_unchecked::<Vec<u8>, _>(index)?)
					}
					_ => QueryValue::String(sqlite_row.try_get_unchecked::<String, _>(index)?),
				}
			};
			row.insert(column.name(), value);
		}
		Ok(row)
	}

	async fn delete_rows(conn: &mut SqliteConnection, tables: &[String]) -> BuilderResult<()> {
		for table in tables {
			let sql = format!("DELETE FROM {}", quote(table));
			let result = sqlx::query(&sql).execute(&mut *conn).await?;
			debug!("Deleted {} row(s) from {}", result.rows_affected(), table);
		}

		let has_sequence: Option<String> = sqlx::query_scalar(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
		)
		.fetch_optional(&mut *conn)
		.await?;
		if has_sequence.is_some() {
			for table in tables {
				sqlx::query("DELETE FROM sqlite_sequence WHERE name = ?")
					.bind(table.clone())
					.execute(&mut *conn)
					.await?;
			}
		}
		Ok(())
	}
}

fn quote(identifier: &str) -> String {
	format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
	async fn table_names(&self) -> BuilderResult<Vec<String>> {
		let names: Vec<String> = sqlx::query_scalar(
			"SELECT name FROM sqlite_master \
			 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
			 ORDER BY name",
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(names)
	}

	async fn table_schema(&self, table: &str) -> BuilderResult<TableSchema> {
		let sql = format!("PRAGMA table_info({})", quote(table));
		let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
		if rows.is_empty() {
			return Err(BuilderError::UnknownTable(table.to_string()));
		}

		let mut columns = Vec::with_capacity(rows.len());
		for row in &rows {
			let name: String = row.try_get_unchecked("name")?;
			let declared: String = row.try_get_unchecked("type")?;
			let not_null: i64 = row.try_get_unchecked("notnull")?;
			let pk: i64 = row.try_get_unchecked("pk")?;
			columns.push(
				ColumnInfo::new(name, declared)
					.with_nullable(not_null == 0)
					.with_primary_key(pk > 0),
			);
		}
		Ok(TableSchema::new(table, columns))
	}

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> BuilderResult<QueryResult> {
		let mut query = sqlx::query(sql);
		for param in &params {
			query = Self::bind_value(query, param);
		}
		let result = query.execute(&self.pool).await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
			last_insert_id: Some(result.last_insert_rowid()),
		})
	}

	async fn execute_script(&self, sql: &str) -> BuilderResult<()> {
		sqlx::raw_sql(sql).execute(&self.pool).await?;
		Ok(())
	}

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> BuilderResult<Vec<Row>> {
		let mut query = sqlx::query(sql);
		for param in &params {
			query = Self::bind_value(query, param);
		}
		let rows = query.fetch_all(&self.pool).await?;
		rows.iter().map(Self::convert_row).collect()
	}

	async fn delete_all(&self, tables: &[String]) -> BuilderResult<()> {
		let mut conn = self.pool.acquire().await?;

		let enforced: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
			.fetch_one(&mut *conn)
			.await?;
		sqlx::query("PRAGMA foreign_keys = OFF")
			.execute(&mut *conn)
			.await?;

		let result = Self::delete_rows(&mut *conn, tables).await;

		let restore = format!("PRAGMA foreign_keys = {}", if enforced != 0 { "ON" } else { "OFF" });
		sqlx::query(&restore).execute(&mut *conn).await?;
		result
	}
}
