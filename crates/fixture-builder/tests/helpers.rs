//! Shared setup for fixture-builder integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use fixture_builder::prelude::*;

/// Reference time for every generation in these tests.
pub fn now() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub const SCHEMA: &str = "
	CREATE TABLE users (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		name TEXT NOT NULL,
		email_ciphertext TEXT,
		balance DECIMAL(10,2),
		created_at DATETIME,
		updated_at DATETIME
	);
	CREATE TABLE posts (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER REFERENCES users(id),
		title TEXT NOT NULL,
		tags TEXT,
		created_at DATETIME,
		updated_at DATETIME
	);
	CREATE TABLE comments (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		commentable_id INTEGER,
		commentable_type TEXT,
		body TEXT
	);
	CREATE TABLE labels (id INTEGER PRIMARY KEY, text TEXT);
";

/// Rows the factory creates. Alice is created "now", Bob explicitly in 2020.
pub const DATA: &str = r#"
	INSERT INTO users (id, name, email_ciphertext, balance, created_at, updated_at) VALUES
		(1, 'Alice', 'v1:QUxJQ0U=', 12.50, '2024-06-15 11:30:00', '2024-06-15 11:30:00'),
		(2, 'Bob', NULL, NULL, '2020-01-01 00:00:00', '2024-06-15 11:45:00');
	INSERT INTO posts (id, user_id, title, tags, created_at, updated_at) VALUES
		(1, 1, 'Welcome', '["shading","rooting","seeding"]',
			'2024-06-15 11:31:00', '2024-06-15 11:31:00'),
		(2, 2, 'Archive', NULL, '2019-05-05 10:00:00', '2024-06-15 11:31:00');
	INSERT INTO comments (id, commentable_id, commentable_type, body) VALUES
		(1, 1, 'Post', 'Nice post'),
		(2, 2, 'User', 'Hi Bob'),
		(3, 77, 'Post', 'Orphan');
"#;

/// In-memory database with the test schema and no rows.
pub async fn backend() -> Arc<SqliteBackend> {
	let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
	backend.execute_script(SCHEMA).await.unwrap();
	Arc::new(backend)
}

/// Factory inserting [`DATA`] and naming the main records.
pub fn factory() -> Arc<SqlScriptFactory> {
	Arc::new(
		SqlScriptFactory::new()
			.with_sql(DATA)
			.with_record("alice", RecordHandle::new("users", 1))
			.with_record("bob", RecordHandle::new("users", 2))
			.with_record("welcome", RecordHandle::new("posts", 1)),
	)
}

/// Configuration writing to `dir` with models for users and posts.
pub fn config(dir: &Path) -> BuilderConfig {
	BuilderConfig::new()
		.with_fixtures_dir(dir)
		.with_model(
			ModelDescriptor::new("User", "users").with_virtual_attributes(|row| {
				// Stand-in for decryption.
				let email = row
					.get("name")
					.and_then(QueryValue::as_str)
					.map(|name| format!("{}@example.com", name.to_lowercase()));
				vec![("email".to_string(), QueryValue::from(email))]
			}),
		)
		.with_model(
			ModelDescriptor::new("Post", "posts").with_column_kind("tags", ColumnKind::Json),
		)
}

/// Parses a generated YAML fixture.
pub fn read_yaml(path: &Path) -> serde_yaml::Value {
	let content = std::fs::read_to_string(path).unwrap();
	serde_yaml::from_str(&content).unwrap()
}

/// Record names of a YAML fixture, in file order.
pub fn record_names(fixture: &serde_yaml::Value) -> Vec<String> {
	fixture
		.as_mapping()
		.unwrap()
		.keys()
		.map(|key| key.as_str().unwrap().to_string())
		.collect()
}
