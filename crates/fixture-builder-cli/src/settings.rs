//! `fixture_builder.toml` settings.
//!
//! ```toml
//! database_url = "sqlite://db/development.sqlite3"
//! fixtures_dir = "tests/fixtures"
//! setup_scripts = ["db/seeds/fixtures.sql"]
//! files_to_check = ["db/seeds/fixtures.sql", "db/schema.sql"]
//!
//! [names]
//! alice = "users#1"
//! admins = ["users#2", "users#3"]
//!
//! [[models]]
//! name = "Post"
//! table = "posts"
//! json_columns = ["tags"]
//! ```
//!
//! Relative paths are resolved against the directory of the settings file.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fixture_builder::backend::ColumnKind;
use fixture_builder::config::OpaqueColumns;
use fixture_builder::{
	BuilderConfig, FixtureFormat, ModelDescriptor, RecordHandle, SqlScriptFactory,
};
use serde::Deserialize;

fn default_fixtures_dir() -> PathBuf {
	PathBuf::from("tests/fixtures")
}

fn default_format() -> String {
	"yaml".to_string()
}

fn default_true() -> bool {
	true
}

fn default_recent_window_hours() -> i64 {
	24
}

/// Contents of the settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
	pub database_url: String,

	#[serde(default = "default_fixtures_dir")]
	pub fixtures_dir: PathBuf,

	#[serde(default = "default_format")]
	pub format: String,

	/// Tables to dump; every table when absent.
	#[serde(default)]
	pub tables: Option<Vec<String>>,

	#[serde(default)]
	pub skip_tables: Vec<String>,

	#[serde(default = "default_true")]
	pub substitute_identifiers: bool,

	#[serde(default)]
	pub excluded_foreign_keys: Vec<String>,

	/// Foreign key column to referenced table.
	#[serde(default)]
	pub reference_tables: HashMap<String, String>,

	#[serde(default)]
	pub write_empty_files: bool,

	#[serde(default)]
	pub legacy_fixtures: Vec<PathBuf>,

	#[serde(default = "default_recent_window_hours")]
	pub recent_window_hours: i64,

	/// SQL files run, in order, to populate the database.
	#[serde(default)]
	pub setup_scripts: Vec<PathBuf>,

	#[serde(default)]
	pub files_to_check: Vec<PathBuf>,

	/// Logical record names to `table#id` handles.
	#[serde(default)]
	pub names: BTreeMap<String, NameTarget>,

	#[serde(default)]
	pub models: Vec<ModelSettings>,

	#[serde(default)]
	pub opaque: Option<OpaqueSettings>,

	#[serde(skip)]
	base_dir: PathBuf,
}

/// One handle or several under the same logical name.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NameTarget {
	One(String),
	Many(Vec<String>),
}

impl NameTarget {
	fn handles(&self) -> Vec<&str> {
		match self {
			NameTarget::One(handle) => vec![handle.as_str()],
			NameTarget::Many(handles) => handles.iter().map(String::as_str).collect(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
	pub name: String,
	pub table: String,
	#[serde(default)]
	pub attributes: Option<Vec<String>>,
	/// Text columns holding JSON documents.
	#[serde(default)]
	pub json_columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpaqueSettings {
	pub suffixes: Option<Vec<String>>,
	pub prefixes: Option<Vec<String>>,
	pub template: Option<String>,
}

impl Settings {
	/// Reads and parses the settings file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read settings from {}", path.display()))?;
		let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
		Self::parse(&content, base_dir)
			.with_context(|| format!("Invalid settings in {}", path.display()))
	}

	/// Parses settings, resolving relative paths against `base_dir`.
	pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
		let mut settings: Settings = toml::from_str(content)?;
		settings.base_dir = base_dir.into();
		Ok(settings)
	}

	fn resolve(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_dir.join(path)
		}
	}

	/// Builds the generation configuration.
	pub fn to_config(&self) -> Result<BuilderConfig> {
		let format: FixtureFormat = self.format.parse()?;
		if self.recent_window_hours < 0 {
			bail!(
				"recent_window_hours must not be negative, got {}",
				self.recent_window_hours
			);
		}
		let recent_window =
			chrono::Duration::try_hours(self.recent_window_hours).with_context(|| {
				format!("recent_window_hours {} is too large", self.recent_window_hours)
			})?;
		let mut config = BuilderConfig::new()
			.with_fixtures_dir(self.resolve(&self.fixtures_dir))
			.with_format(format)
			.with_substitute_identifiers(self.substitute_identifiers)
			.with_write_empty_files(self.write_empty_files)
			.with_recent_window(recent_window);

		if let Some(tables) = &self.tables {
			config = config.with_tables(tables.iter().cloned());
		}
		for table in &self.skip_tables {
			config = config.with_skip_table(table);
		}
		for column in &self.excluded_foreign_keys {
			config = config.with_excluded_foreign_key(column);
		}
		for (column, table) in &self.reference_tables {
			config = config.with_reference_table(column, table);
		}
		for path in &self.legacy_fixtures {
			config = config.with_legacy_fixture(self.resolve(path));
		}
		for path in &self.files_to_check {
			config = config.with_file_to_check(self.resolve(path));
		}
		for model in &self.models {
			let mut descriptor = ModelDescriptor::new(&model.name, &model.table);
			if let Some(attributes) = &model.attributes {
				descriptor = descriptor.with_attributes(attributes.iter().cloned());
			}
			for column in &model.json_columns {
				descriptor = descriptor.with_column_kind(column, ColumnKind::Json);
			}
			config = config.with_model(descriptor);
		}
		if let Some(opaque) = &self.opaque {
			let mut columns = OpaqueColumns::default();
			if let Some(suffixes) = &opaque.suffixes {
				columns.suffixes = suffixes.clone();
			}
			if let Some(prefixes) = &opaque.prefixes {
				columns.prefixes = prefixes.clone();
			}
			if let Some(template) = &opaque.template {
				columns.template = template.clone();
			}
			config = config.with_opaque_columns(columns);
		}
		Ok(config)
	}

	/// Builds the factory running the setup scripts and exposing `[names]`.
	pub fn factory(&self) -> Result<SqlScriptFactory> {
		let mut factory = SqlScriptFactory::new();
		for script in &self.setup_scripts {
			factory = factory.with_script(self.resolve(script));
		}
		for (logical_name, target) in &self.names {
			for handle in target.handles() {
				let handle: RecordHandle = handle
					.parse()
					.with_context(|| format!("Invalid record for name '{}'", logical_name))?;
				factory = factory.with_record(logical_name, handle);
			}
		}
		Ok(factory)
	}
}
