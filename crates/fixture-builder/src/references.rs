//! Rewriting of foreign keys into symbolic references.

use std::collections::HashSet;

use tracing::warn;

use crate::backend::{QueryValue, RawId, Row};
use crate::config::BuilderConfig;
use crate::namer::Namer;

const FOREIGN_KEY_SUFFIX: &str = "_id";
const TYPE_SUFFIX: &str = "_type";

/// Replaces `<name>_id` columns with `<name>` references to named records.
///
/// With identifier substitution enabled, the primary key is dropped and every
/// `<name>_id` column whose value the [`Namer`] knows becomes `<name>: target`
/// (or `<name>: "target (Type)"` when a non-empty `<name>_type` column sits
/// beside it, which is then dropped as well). Unknown ids and excluded columns
/// are kept raw, as is a key whose `<name>` column already exists. Column
/// order is preserved, the reference taking the place of the id column.
///
/// Names are looked up in the referenced table first (`user_id` looks in
/// `users`, `commentable_type: Post` in the `Post` model's table), so ids
/// repeated across tables still resolve; other columns use the global lookup.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
	config: &'a BuilderConfig,
	namer: &'a Namer,
}

enum Rewrite {
	Keep(QueryValue),
	Reference { key: String, value: String },
}

impl<'a> ReferenceResolver<'a> {
	/// Creates a resolver reading names from `namer`.
	pub fn new(config: &'a BuilderConfig, namer: &'a Namer) -> Self {
		Self { config, namer }
	}

	/// Resolves the references of one transformed row.
	pub fn resolve(&self, row: Row) -> Row {
		if !self.config.substitute_identifiers {
			return row;
		}

		let mut consumed_types = HashSet::new();
		let mut rewrites = Vec::with_capacity(row.len());
		for (column, value) in row.iter() {
			if column == self.config.primary_key {
				continue;
			}
			match self.reference(&row, column, value) {
				Some((key, target, type_column)) => {
					if let Some(type_column) = type_column {
						consumed_types.insert(type_column);
					}
					rewrites.push((column.to_string(), Rewrite::Reference { key, value: target }));
				}
				None => rewrites.push((column.to_string(), Rewrite::Keep(value.clone()))),
			}
		}

		let mut resolved = Row::new();
		for (column, rewrite) in rewrites {
			match rewrite {
				Rewrite::Keep(_) if consumed_types.contains(&column) => {}
				Rewrite::Keep(value) => resolved.insert(column, value),
				Rewrite::Reference { key, value } => resolved.insert(key, value),
			}
		}
		resolved
	}

	/// Returns `(logical_name, resolved_value, consumed_type_column)` for a
	/// resolvable foreign key.
	fn reference(
		&self,
		row: &Row,
		column: &str,
		value: &QueryValue,
	) -> Option<(String, String, Option<String>)> {
		let logical = column.strip_suffix(FOREIGN_KEY_SUFFIX)?;
		if logical.is_empty() || self.config.excluded_foreign_keys.contains(column) {
			return None;
		}
		let raw_id = value.as_raw_id()?;
		if row.contains(logical) {
			warn!(
				"Column {} would replace the existing {} column; keeping the raw id",
				column, logical
			);
			return None;
		}

		let type_column = format!("{}{}", logical, TYPE_SUFFIX);
		let target_type = row
			.get(&type_column)
			.and_then(QueryValue::as_str)
			.filter(|t| !t.is_empty());

		match target_type {
			Some(target_type) => {
				let name = self.polymorphic_name(target_type, &raw_id)?;
				Some((
					logical.to_string(),
					format!("{} ({})", name, target_type),
					Some(type_column),
				))
			}
			None => {
				let name = self.simple_name(column, logical, &raw_id)?;
				Some((logical.to_string(), name.to_string(), None))
			}
		}
	}

	/// Prefers the record of the table the column points at, falling back to
	/// the global id lookup.
	fn simple_name(&self, column: &str, logical: &str, raw_id: &RawId) -> Option<&'a str> {
		self.candidate_tables(column, logical)
			.iter()
			.find_map(|table| self.namer.record_name(table, raw_id))
			.or_else(|| self.namer.lookup(raw_id))
	}

	/// Tables `<logical>_id` plausibly references: a configured table, the
	/// table of a model named after it, then common plural forms.
	fn candidate_tables(&self, column: &str, logical: &str) -> Vec<String> {
		if let Some(table) = self.config.reference_tables.get(column) {
			return vec![table.clone()];
		}
		let mut tables = Vec::new();
		if let Some(model) = self.config.models.by_reference_name(logical) {
			tables.push(model.table().to_string());
		}
		tables.push(format!("{}s", logical));
		tables.push(format!("{}es", logical));
		if let Some(stem) = logical.strip_suffix('y') {
			tables.push(format!("{}ies", stem));
		}
		tables.push(logical.to_string());
		tables
	}

	/// Prefers the record of the table the type names, falling back to the
	/// global id lookup.
	fn polymorphic_name(&self, target_type: &str, raw_id: &RawId) -> Option<&'a str> {
		let table = match self.config.models.by_name(target_type) {
			Some(model) => model.table().to_string(),
			None => format!("{}s", snake_case(target_type)),
		};
		self.namer
			.record_name(&table, raw_id)
			.or_else(|| self.namer.lookup(raw_id))
	}
}

/// `BlogPost` to `blog_post`.
fn snake_case(name: &str) -> String {
	let mut snake = String::with_capacity(name.len() + 4);
	for (i, c) in name.chars().enumerate() {
		if c.is_ascii_uppercase() {
			if i > 0 {
				snake.push('_');
			}
			snake.push(c.to_ascii_lowercase());
		} else {
			snake.push(c);
		}
	}
	snake
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::ModelDescriptor;
	use rstest::{fixture, rstest};

	#[fixture]
	fn namer() -> Namer {
		let mut namer = Namer::new();
		namer.assign_name("users", RawId::from(1), "alice").unwrap();
		namer.assign_name("posts", RawId::from(10), "welcome").unwrap();
		namer
	}

	fn row(pairs: &[(&str, QueryValue)]) -> Row {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[rstest]
	fn test_simple_reference(namer: Namer) {
		let config = BuilderConfig::new();
		let input = row(&[
			("id", QueryValue::Int(5)),
			("body", "hi".into()),
			("author_id", QueryValue::Int(1)),
			("position", QueryValue::Int(2)),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(
			output.columns().collect::<Vec<_>>(),
			vec!["body", "author", "position"]
		);
		assert_eq!(output.get("author"), Some(&QueryValue::String("alice".into())));
	}

	#[rstest]
	fn test_reference_never_overwrites_a_column(namer: Namer) {
		let config = BuilderConfig::new();
		let input = row(&[
			("author", "Anonymous".into()),
			("author_id", QueryValue::Int(1)),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(output.get("author"), Some(&QueryValue::String("Anonymous".into())));
		assert_eq!(output.get("author_id"), Some(&QueryValue::Int(1)));
	}

	#[rstest]
	fn test_polymorphic_reference(namer: Namer) {
		let config = BuilderConfig::new();
		let input = row(&[
			("commentable_type", "Post".into()),
			("commentable_id", QueryValue::Int(10)),
			("body", "nice".into()),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(output.columns().collect::<Vec<_>>(), vec!["commentable", "body"]);
		assert_eq!(
			output.get("commentable"),
			Some(&QueryValue::String("welcome (Post)".into()))
		);
	}

	#[rstest]
	fn test_polymorphic_reference_uses_model_table() {
		let mut namer = Namer::new();
		namer.assign_name("users", RawId::from(1), "alice").unwrap();
		namer.assign_name("posts", RawId::from(1), "welcome").unwrap();
		let config = BuilderConfig::new().with_model(ModelDescriptor::new("Post", "posts"));
		let input = row(&[
			("commentable_id", QueryValue::Int(1)),
			("commentable_type", "Post".into()),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(
			output.get("commentable"),
			Some(&QueryValue::String("welcome (Post)".into()))
		);
	}

	#[rstest]
	#[case("Post", "post")]
	#[case("BlogPost", "blog_post")]
	#[case("user", "user")]
	fn test_snake_case(#[case] name: &str, #[case] expected: &str) {
		assert_eq!(snake_case(name), expected);
	}

	#[rstest]
	fn test_simple_reference_prefers_implied_table() {
		let mut namer = Namer::new();
		namer.assign_name("users", RawId::from(1), "alice").unwrap();
		namer.assign_name("posts", RawId::from(1), "welcome").unwrap();
		namer.assign_name("categories", RawId::from(1), "news").unwrap();
		let config = BuilderConfig::new().with_reference_table("writer_id", "users");
		let input = row(&[
			("user_id", QueryValue::Int(1)),
			("post_id", QueryValue::Int(1)),
			("category_id", QueryValue::Int(1)),
			("writer_id", QueryValue::Int(1)),
			("editor_id", QueryValue::Int(1)),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(output.get("user"), Some(&QueryValue::String("alice".into())));
		assert_eq!(output.get("post"), Some(&QueryValue::String("welcome".into())));
		assert_eq!(output.get("category"), Some(&QueryValue::String("news".into())));
		assert_eq!(output.get("writer"), Some(&QueryValue::String("alice".into())));
		// No implied table and ambiguous globally.
		assert_eq!(output.get("editor_id"), Some(&QueryValue::Int(1)));
	}

	#[rstest]
	fn test_unknown_and_excluded_ids_stay_raw(namer: Namer) {
		let config = BuilderConfig::new().with_excluded_foreign_key("editor_id");
		let input = row(&[
			("author_id", QueryValue::Int(99)),
			("editor_id", QueryValue::Int(1)),
			("owner_type", "User".into()),
			("owner_id", QueryValue::Int(42)),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(output.get("author_id"), Some(&QueryValue::Int(99)));
		assert_eq!(output.get("editor_id"), Some(&QueryValue::Int(1)));
		assert_eq!(output.get("owner_id"), Some(&QueryValue::Int(42)));
		assert_eq!(output.get("owner_type"), Some(&QueryValue::String("User".into())));
	}

	#[rstest]
	fn test_empty_type_is_simple_reference(namer: Namer) {
		let config = BuilderConfig::new();
		let input = row(&[
			("owner_id", QueryValue::Int(1)),
			("owner_type", "".into()),
		]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input);
		assert_eq!(output.get("owner"), Some(&QueryValue::String("alice".into())));
		assert_eq!(output.get("owner_type"), Some(&QueryValue::String("".into())));
	}

	#[rstest]
	fn test_substitution_disabled_keeps_row(namer: Namer) {
		let config = BuilderConfig::new().with_substitute_identifiers(false);
		let input = row(&[("id", QueryValue::Int(5)), ("author_id", QueryValue::Int(1))]);

		let output = ReferenceResolver::new(&config, &namer).resolve(input.clone());
		assert_eq!(output, input);
	}
}
