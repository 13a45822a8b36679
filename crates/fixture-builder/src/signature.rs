//! Change detection for watched source files.
//!
//! A [`BuildSignature`] is a SHA-256 digest over the watched files' paths and
//! contents. The signature of the last successful build is kept next to the
//! fixtures; a rebuild is due when it no longer matches or when no fixture
//! file exists at all.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::BuilderResult;
use crate::fixtures::FixtureFormat;

/// File name of the stored signature inside the fixtures directory.
pub const SIGNATURE_FILE: &str = ".fixture_builder_signature";

/// Digest of the watched files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSignature(String);

impl BuildSignature {
	/// Hashes `files` in sorted path order. Missing files hash as absent
	/// rather than failing, so deleting a watched file triggers a rebuild.
	pub fn compute(files: &[PathBuf]) -> BuilderResult<Self> {
		let mut sorted: Vec<&PathBuf> = files.iter().collect();
		sorted.sort();
		sorted.dedup();

		let mut hasher = Sha256::new();
		for path in sorted {
			hasher.update(path.to_string_lossy().as_bytes());
			hasher.update([0u8]);
			match std::fs::read(path) {
				Ok(content) => {
					hasher.update((content.len() as u64).to_be_bytes());
					hasher.update(&content);
				}
				Err(e) if e.kind() == ErrorKind::NotFound => hasher.update(b"<missing>"),
				Err(e) => return Err(e.into()),
			}
		}

		let digest = hasher.finalize();
		let mut hex = String::with_capacity(digest.len() * 2);
		for byte in digest {
			let _ = write!(hex, "{:02x}", byte);
		}
		Ok(Self(hex))
	}

	/// Hex form of the digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Persists build signatures in a fixtures directory.
#[derive(Debug, Clone)]
pub struct SignatureStore {
	dir: PathBuf,
	format: FixtureFormat,
}

impl SignatureStore {
	/// Creates a store for fixtures of `format` kept in `dir`.
	pub fn new(dir: impl Into<PathBuf>, format: FixtureFormat) -> Self {
		Self {
			dir: dir.into(),
			format,
		}
	}

	fn path(&self) -> PathBuf {
		self.dir.join(SIGNATURE_FILE)
	}

	/// Reads the stored signature, if any.
	pub fn load(&self) -> BuilderResult<Option<BuildSignature>> {
		match std::fs::read_to_string(self.path()) {
			Ok(content) => Ok(Some(BuildSignature(content.trim().to_string()))),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Stores `signature`, replacing the previous one.
	pub fn save(&self, signature: &BuildSignature) -> BuilderResult<()> {
		std::fs::create_dir_all(&self.dir)?;
		std::fs::write(self.path(), format!("{}\n", signature.as_str()))?;
		Ok(())
	}

	/// Deletes the stored signature. A missing file is not an error.
	pub fn clear(&self) -> BuilderResult<()> {
		match std::fs::remove_file(self.path()) {
			Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
			_ => Ok(()),
		}
	}

	/// True when no fixture file exists or `current` differs from the stored
	/// signature.
	pub fn must_rebuild(&self, current: &BuildSignature) -> BuilderResult<bool> {
		if !has_fixture_files(&self.dir, self.format)? {
			debug!("No fixture files in {}", self.dir.display());
			return Ok(true);
		}
		Ok(self.load()?.as_ref() != Some(current))
	}
}

fn has_fixture_files(dir: &Path, format: FixtureFormat) -> BuilderResult<bool> {
	let entries = match std::fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
		Err(e) => return Err(e.into()),
	};
	for entry in entries {
		let path = entry?.path();
		if path.is_file() && FixtureFormat::from_path(&path) == Some(format) {
			return Ok(true);
		}
	}
	Ok(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tempfile::tempdir;

	#[rstest]
	fn test_signature_ignores_listing_order() {
		let dir = tempdir().unwrap();
		let a = dir.path().join("a.sql");
		let b = dir.path().join("b.sql");
		std::fs::write(&a, "one").unwrap();
		std::fs::write(&b, "two").unwrap();

		let forward = BuildSignature::compute(&[a.clone(), b.clone()]).unwrap();
		let backward = BuildSignature::compute(&[b, a]).unwrap();
		assert_eq!(forward, backward);
		assert_eq!(forward.as_str().len(), 64);
	}

	#[rstest]
	fn test_signature_tracks_content_and_presence() {
		let dir = tempdir().unwrap();
		let file = dir.path().join("setup.sql");
		std::fs::write(&file, "one").unwrap();
		let first = BuildSignature::compute(&[file.clone()]).unwrap();

		std::fs::write(&file, "two").unwrap();
		let changed = BuildSignature::compute(&[file.clone()]).unwrap();
		assert_ne!(first, changed);

		std::fs::remove_file(&file).unwrap();
		let missing = BuildSignature::compute(&[file]).unwrap();
		assert_ne!(changed, missing);
	}

	#[rstest]
	fn test_must_rebuild() {
		let dir = tempdir().unwrap();
		let store = SignatureStore::new(dir.path(), FixtureFormat::Yaml);
		let signature = BuildSignature::compute(&[]).unwrap();

		// Nothing generated yet.
		store.save(&signature).unwrap();
		assert!(store.must_rebuild(&signature).unwrap());

		std::fs::write(dir.path().join("users.yml"), "{}\n").unwrap();
		assert!(!store.must_rebuild(&signature).unwrap());

		store.clear().unwrap();
		assert!(store.must_rebuild(&signature).unwrap());
		store.clear().unwrap();
	}

	#[rstest]
	fn test_other_format_files_do_not_count() {
		let dir = tempdir().unwrap();
		std::fs::write(dir.path().join("users.json"), "{}").unwrap();
		let store = SignatureStore::new(dir.path(), FixtureFormat::Yaml);
		let signature = BuildSignature::compute(&[]).unwrap();
		store.save(&signature).unwrap();

		assert!(store.must_rebuild(&signature).unwrap());
	}
}
