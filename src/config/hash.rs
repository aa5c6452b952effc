//! Source fingerprinting for verification reports.
//!
//! This module provides deterministic hashing of the source files handed to
//! a verification run, so a report can be tied to the exact code it checked.

use sha2::{Digest, Sha256};

use crate::deployer::SourceFile;

/// Hasher for computing source fingerprints.
#[derive(Debug, Default)]
pub struct SourceHasher;

impl SourceHasher {
    /// Creates a new source hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash over a set of source files.
    ///
    /// Files are hashed in path order, so the input order does not matter.
    /// Path and content lengths are mixed in to keep boundaries unambiguous.
    #[must_use]
    pub fn hash_sources(&self, files: &[SourceFile]) -> String {
        let mut sorted: Vec<&SourceFile> = files.iter().collect();
        sorted.sort_by(|a, b| a.relative_path().cmp(b.relative_path()));

        let mut hasher = Sha256::new();
        for file in sorted {
            let path = file.relative_path().to_string_lossy();
            hasher.update((path.len() as u64).to_be_bytes());
            hasher.update(path.as_bytes());
            hasher.update((file.content().len() as u64).to_be_bytes());
            hasher.update(file.content());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}
