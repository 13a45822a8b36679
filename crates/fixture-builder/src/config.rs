//! Configuration for one fixture generation run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;

use crate::builder::BuildReport;
use crate::factory::RecordHandle;
use crate::fixtures::FixtureFormat;
use crate::models::{ModelDescriptor, ModelRegistry};

/// Callback invoked once after every fixture file has been written.
pub type AfterBuildHook = Arc<dyn Fn(&BuildReport) + Send + Sync>;

/// Picks the symbolic name of a record the factory exposed under `logical_name`.
///
/// Returning `None` leaves the record to the model naming function or the
/// default name.
pub type RecordNamingFn = Arc<dyn Fn(&str, &RecordHandle) -> Option<String> + Send + Sync>;

/// Default template for opaque columns, e.g. `{{ email_ciphertext("a@b.c") }}`.
pub const DEFAULT_OPAQUE_TEMPLATE: &str = "{{ {column}({plaintext}) }}";

/// Column naming conventions marking ciphertext or blind-index companions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueColumns {
	/// Suffixes such as `_ciphertext` in `email_ciphertext`.
	pub suffixes: Vec<String>,

	/// Prefixes such as `encrypted_` in `encrypted_ssn`.
	pub prefixes: Vec<String>,

	/// Replacement text with `{model}`, `{column}`, `{attribute}` and
	/// `{plaintext}` placeholders.
	pub template: String,
}

impl Default for OpaqueColumns {
	fn default() -> Self {
		Self {
			suffixes: vec!["_ciphertext".to_string(), "_bidx".to_string()],
			prefixes: vec!["encrypted_".to_string()],
			template: DEFAULT_OPAQUE_TEMPLATE.to_string(),
		}
	}
}

impl OpaqueColumns {
	/// Returns the plaintext attribute an opaque column derives from.
	///
	/// ```
	/// # use fixture_builder::config::OpaqueColumns;
	/// let opaque = OpaqueColumns::default();
	/// assert_eq!(opaque.attribute_for("email_ciphertext"), Some("email"));
	/// assert_eq!(opaque.attribute_for("encrypted_ssn"), Some("ssn"));
	/// assert_eq!(opaque.attribute_for("email"), None);
	/// ```
	pub fn attribute_for<'a>(&self, column: &'a str) -> Option<&'a str> {
		self.suffixes
			.iter()
			.find_map(|suffix| column.strip_suffix(suffix.as_str()))
			.or_else(|| {
				self.prefixes
					.iter()
					.find_map(|prefix| column.strip_prefix(prefix.as_str()))
			})
			.filter(|attribute| !attribute.is_empty())
	}

	/// Fills the template for one column.
	pub fn render(&self, model: &str, column: &str, attribute: &str, plaintext: &str) -> String {
		self.template
			.replace("{model}", model)
			.replace("{column}", column)
			.replace("{attribute}", attribute)
			.replace("{plaintext}", plaintext)
	}
}

/// Everything the dump engine needs to know, passed explicitly to
/// [`FixtureBuilder::new`](crate::FixtureBuilder::new).
#[derive(Clone)]
pub struct BuilderConfig {
	/// Directory the fixture files are written to.
	pub fixtures_dir: PathBuf,

	/// Output format of generated fixtures.
	pub format: FixtureFormat,

	/// Tables to dump, in order. `None` dumps every table the database reports.
	pub tables: Option<Vec<String>>,

	/// Tables never cleaned or dumped.
	pub skip_tables: Vec<String>,

	/// Model descriptors governing typed tables.
	pub models: ModelRegistry,

	/// Replace primary keys and foreign keys with symbolic names.
	pub substitute_identifiers: bool,

	/// Foreign-key columns left raw.
	pub excluded_foreign_keys: HashSet<String>,

	/// Target table of foreign-key columns whose name does not imply it,
	/// e.g. `author_id` pointing at `users`.
	pub reference_tables: HashMap<String, String>,

	/// Write an empty mapping for tables without rows.
	pub write_empty_files: bool,

	/// Fixture files loaded before the factory runs.
	pub legacy_fixtures: Vec<PathBuf>,

	/// Creation timestamps newer than `now - recent_window` are dropped.
	pub recent_window: Duration,

	/// Primary key column name.
	pub primary_key: String,

	/// Creation timestamp column name.
	pub created_at_column: String,

	/// Modification timestamp column name.
	pub updated_at_column: String,

	/// Opaque column conventions.
	pub opaque: OpaqueColumns,

	/// Source files whose changes require a rebuild.
	pub files_to_check: Vec<PathBuf>,

	/// Names records exposed by the factory.
	pub record_naming: Option<RecordNamingFn>,

	/// Called once after all files are written.
	pub after_build: Option<AfterBuildHook>,
}

impl Default for BuilderConfig {
	fn default() -> Self {
		Self {
			fixtures_dir: PathBuf::from("tests/fixtures"),
			format: FixtureFormat::Yaml,
			tables: None,
			skip_tables: vec!["_sqlx_migrations".to_string(), "schema_migrations".to_string()],
			models: ModelRegistry::new(),
			substitute_identifiers: true,
			excluded_foreign_keys: HashSet::new(),
			reference_tables: HashMap::new(),
			write_empty_files: false,
			legacy_fixtures: Vec::new(),
			recent_window: Duration::days(1),
			primary_key: "id".to_string(),
			created_at_column: "created_at".to_string(),
			updated_at_column: "updated_at".to_string(),
			opaque: OpaqueColumns::default(),
			files_to_check: Vec::new(),
			record_naming: None,
			after_build: None,
		}
	}
}

impl BuilderConfig {
	/// Creates a configuration with default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the fixtures directory.
	pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.fixtures_dir = dir.into();
		self
	}

	/// Sets the output format.
	pub fn with_format(mut self, format: FixtureFormat) -> Self {
		self.format = format;
		self
	}

	/// Dumps exactly these tables, in this order.
	pub fn with_tables<I, S>(mut self, tables: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tables = Some(tables.into_iter().map(Into::into).collect());
		self
	}

	/// Adds a table that is neither cleaned nor dumped.
	pub fn with_skip_table(mut self, table: impl Into<String>) -> Self {
		self.skip_tables.push(table.into());
		self
	}

	/// Registers a model descriptor.
	pub fn with_model(mut self, model: ModelDescriptor) -> Self {
		self.models.register(model);
		self
	}

	/// Enables or disables identifier substitution.
	pub fn with_substitute_identifiers(mut self, enabled: bool) -> Self {
		self.substitute_identifiers = enabled;
		self
	}

	/// Excludes a foreign-key column from reference resolution.
	pub fn with_excluded_foreign_key(mut self, column: impl Into<String>) -> Self {
		self.excluded_foreign_keys.insert(column.into());
		self
	}

	/// Declares the table a foreign-key column points at.
	pub fn with_reference_table(
		mut self,
		column: impl Into<String>,
		table: impl Into<String>,
	) -> Self {
		self.reference_tables.insert(column.into(), table.into());
		self
	}

	/// Enables or disables writing empty files for tables without rows.
	pub fn with_write_empty_files(mut self, enabled: bool) -> Self {
		self.write_empty_files = enabled;
		self
	}

	/// Adds a legacy fixture file to pre-load.
	pub fn with_legacy_fixture(mut self, path: impl Into<PathBuf>) -> Self {
		self.legacy_fixtures.push(path.into());
		self
	}

	/// Sets the window in which creation timestamps count as auto-generated.
	pub fn with_recent_window(mut self, window: Duration) -> Self {
		self.recent_window = window;
		self
	}

	/// Sets the primary key column name.
	pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
		self.primary_key = column.into();
		self
	}

	/// Sets the creation and modification timestamp column names.
	pub fn with_timestamp_columns(
		mut self,
		created_at: impl Into<String>,
		updated_at: impl Into<String>,
	) -> Self {
		self.created_at_column = created_at.into();
		self.updated_at_column = updated_at.into();
		self
	}

	/// Replaces the opaque column conventions.
	pub fn with_opaque_columns(mut self, opaque: OpaqueColumns) -> Self {
		self.opaque = opaque;
		self
	}

	/// Adds a file watched by change detection.
	pub fn with_file_to_check(mut self, path: impl Into<PathBuf>) -> Self {
		self.files_to_check.push(path.into());
		self
	}

	/// Sets the callback naming records exposed by the factory.
	pub fn with_record_naming<F>(mut self, naming: F) -> Self
	where
		F: Fn(&str, &RecordHandle) -> Option<String> + Send + Sync + 'static,
	{
		self.record_naming = Some(Arc::new(naming));
		self
	}

	/// Sets the post-generation callback.
	pub fn with_after_build<F>(mut self, hook: F) -> Self
	where
		F: Fn(&BuildReport) + Send + Sync + 'static,
	{
		self.after_build = Some(Arc::new(hook));
		self
	}

	/// Column that orders typed tables.
	pub fn order_column(&self) -> &str {
		if self.substitute_identifiers {
			&self.created_at_column
		} else {
			&self.primary_key
		}
	}

	/// Returns true when `table` must be left alone.
	pub fn is_skipped(&self, table: &str) -> bool {
		self.skip_tables.iter().any(|skipped| skipped == table)
	}

	/// Path of the fixture file for `table`.
	pub fn fixture_path(&self, table: &str) -> PathBuf {
		self.fixtures_dir
			.join(format!("{}.{}", table, self.format.extension()))
	}

	/// Symbolic name for a record the factory exposed under `logical_name`.
	pub fn name_for_record(&self, logical_name: &str, handle: &RecordHandle) -> Option<String> {
		match &self.record_naming {
			Some(naming) => naming(logical_name, handle),
			None => Some(logical_name.to_string()),
		}
	}

	/// Fixtures directory.
	pub fn fixtures_dir(&self) -> &Path {
		&self.fixtures_dir
	}
}

impl fmt::Debug for BuilderConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BuilderConfig")
			.field("fixtures_dir", &self.fixtures_dir)
			.field("format", &self.format)
			.field("tables", &self.tables)
			.field("skip_tables", &self.skip_tables)
			.field("models", &self.models)
			.field("substitute_identifiers", &self.substitute_identifiers)
			.field("excluded_foreign_keys", &self.excluded_foreign_keys)
			.field("reference_tables", &self.reference_tables)
			.field("write_empty_files", &self.write_empty_files)
			.field("legacy_fixtures", &self.legacy_fixtures)
			.field("recent_window", &self.recent_window)
			.field("primary_key", &self.primary_key)
			.field("created_at_column", &self.created_at_column)
			.field("updated_at_column", &self.updated_at_column)
			.field("opaque", &self.opaque)
			.field("files_to_check", &self.files_to_check)
			.field("record_naming", &self.record_naming.is_some())
			.field("after_build", &self.after_build.is_some())
			.finish()
	}
}
