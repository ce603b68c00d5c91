//! One-shot expectation bootstrap from disk.
//!
//! At startup the server can seed its expectation store from a directory of
//! `*.json` files, each holding a single expectation in the management wire
//! format. The directory is scanned once; changes on disk during runtime are
//! not observed. A malformed file is logged and skipped so one bad fixture
//! never prevents the server from booting.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::{expectation::Expectation, store::ExpectationStore};

/// A source of boot-time expectations.
///
/// The default implementation reads from disk; tests inject in-memory
/// sources.
pub trait ExpectationSource {
    /// Produces every expectation the source holds.
    fn load_all(&self) -> anyhow::Result<Vec<Expectation>>;
}

/// Loads `*.json` expectation files from a directory, non-recursively.
#[derive(Debug)]
pub struct DiskExpectationSource {
    dir: PathBuf,
}

impl DiskExpectationSource {
    /// Creates a source reading from the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn parse_file(path: &Path) -> anyhow::Result<Expectation> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let expectation: Expectation = serde_json::from_str(&content)
            .with_context(|| format!("invalid expectation in {}", path.display()))?;
        if let Err(details) = expectation.validate() {
            anyhow::bail!("invalid expectation in {}: {}", path.display(), details.join("; "));
        }
        Ok(expectation)
    }
}

impl ExpectationSource for DiskExpectationSource {
    fn load_all(&self) -> anyhow::Result<Vec<Expectation>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("cannot scan {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == "json")
            })
            .collect();
        // Scan order is file-system dependent; sort so insertion order (and
        // with it priority tie-breaking) is reproducible.
        paths.sort();

        let mut expectations = Vec::new();
        for path in paths {
            match Self::parse_file(&path) {
                Ok(expectation) => {
                    debug!("loaded expectation from {}", path.display());
                    expectations.push(expectation);
                }
                Err(err) => warn!("skipping expectation file: {err:#}"),
            }
        }
        Ok(expectations)
    }
}

/// Feeds every expectation from a source into the store. Returns how many
/// were inserted.
pub fn load_into(source: &dyn ExpectationSource, store: &ExpectationStore) -> anyhow::Result<usize> {
    let expectations = source.load_all()?;
    let count = expectations.len();
    for expectation in expectations {
        store.add(expectation);
    }
    Ok(count)
}
