//! Symbolic names for database rows.
//!
//! The [`Namer`] is filled while the factory runs and while legacy fixtures
//! are loaded, then consulted read-only by the dump step: record keys come
//! from [`Namer::record_name`], foreign keys are rewritten through
//! [`Namer::lookup`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::warn;

use crate::backend::{RawId, Row};
use crate::error::{BuilderError, BuilderResult};

/// Naming function registered for a model: `(row, sequence_index) -> name`.
///
/// `sequence_index` is the zero-padded position of the row within its table
/// (`"000"`, `"001"`, ...).
pub type NamingFn = std::sync::Arc<dyn Fn(&Row, &str) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdName {
	Unique(String),
	/// The same raw id was given different names in different tables.
	Ambiguous,
}

/// Mapping from raw row identifiers to chosen symbolic names.
#[derive(Debug, Default, Clone)]
pub struct Namer {
	records: HashMap<(String, RawId), String>,
	ids: HashMap<RawId, IdName>,
}

impl Namer {
	/// Creates a namer with no names assigned.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records that row `raw_id` of `table` is called `name`.
	///
	/// Re-assigning the same name is a no-op; assigning a different name to an
	/// already-named record is an error.
	pub fn assign_name(
		&mut self,
		table: &str,
		raw_id: RawId,
		name: impl Into<String>,
	) -> BuilderResult<()> {
		let name = name.into();
		match self.records.entry((table.to_string(), raw_id.clone())) {
			Entry::Occupied(existing) if existing.get() == &name => return Ok(()),
			Entry::Occupied(existing) => {
				return Err(BuilderError::ConflictingName {
					table: table.to_string(),
					id: raw_id.to_string(),
					existing: existing.get().clone(),
					requested: name,
				});
			}
			Entry::Vacant(slot) => {
				slot.insert(name.clone());
			}
		}

		match self.ids.entry(raw_id) {
			Entry::Vacant(slot) => {
				slot.insert(IdName::Unique(name));
			}
			Entry::Occupied(mut slot) => {
				let differs = matches!(slot.get(), IdName::Unique(existing) if existing != &name);
				if differs {
					warn!(
						"Raw id {} names different records in several tables; references stay raw",
						slot.key()
					);
					slot.insert(IdName::Ambiguous);
				}
			}
		}
		Ok(())
	}

	/// Returns the symbolic name for `raw_id`, if one is known.
	///
	/// Never fails: unknown and ambiguous ids yield `None` and the caller
	/// leaves the raw value in place.
	pub fn lookup(&self, raw_id: &RawId) -> Option<&str> {
		match self.ids.get(raw_id) {
			Some(IdName::Unique(name)) => Some(name),
			_ => None,
		}
	}

	/// Returns the name explicitly assigned to row `raw_id` of `table`.
	pub fn record_name(&self, table: &str, raw_id: &RawId) -> Option<&str> {
		self.records
			.get(&(table.to_string(), raw_id.clone()))
			.map(String::as_str)
	}

	/// Number of named records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if nothing was named.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// Zero-padded three-digit sequence index used as default naming input.
pub fn sequence_index(position: usize) -> String {
	format!("{:03}", position)
}

/// Name used when neither an explicit name nor a model naming function applies.
pub fn default_name(table: &str, sequence_index: &str) -> String {
	format!("{}_{}", table, sequence_index)
}
