//! Fixture files: format, reading, writing and legacy pre-loading.

pub mod format;
pub mod legacy;
pub mod parser;
pub mod serializer;

pub use format::{FixtureFormat, FixtureSet};
pub use legacy::LegacyLoader;
pub use parser::FixtureParser;
pub use serializer::FixtureWriter;
