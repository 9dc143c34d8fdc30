//! JSON-shaped metadata for a methylome: creation environment, the
//! integrity hash of its own count array, and the identity (`index_hash`,
//! `genome_name`, `n_cpgs`) of the genome index it was built against.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment;
use crate::error::{Error, Result};
use crate::genome_index::GenomeIndexMetadata;

pub const DATA_EXTENSION: &str = "m16";
pub const META_EXTENSION: &str = "m16.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethylomeMetadata {
    pub version: String,
    pub host: String,
    pub user: String,
    pub creation_time: String,
    pub methylome_hash: u64,
    pub index_hash: u64,
    pub genome_name: String,
    pub n_cpgs: u32,
    pub is_compressed: bool,
}

impl MethylomeMetadata {
    pub fn new(genome_name: String, n_cpgs: u32, index_hash: u64, is_compressed: bool) -> Self {
        Self {
            version: environment::tool_version(),
            host: environment::hostname(),
            user: environment::username(),
            creation_time: environment::now_as_string(),
            methylome_hash: 0,
            index_hash,
            genome_name,
            n_cpgs,
            is_compressed,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.version.is_empty()
            && !self.host.is_empty()
            && !self.user.is_empty()
            && !self.creation_time.is_empty()
            && !self.genome_name.is_empty()
    }

    /// A methylome and an index are consistent iff version, index_hash,
    /// genome_name, and n_cpgs all match (spec.md §3).
    pub fn is_consistent_with_index(&self, index: &GenomeIndexMetadata) -> bool {
        index.is_consistent_with(self.index_hash, &self.genome_name, self.n_cpgs, &self.version)
    }

    pub fn data_filename(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.{DATA_EXTENSION}"))
    }

    pub fn meta_filename(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.{META_EXTENSION}"))
    }

    pub fn read(dir: &Path, name: &str) -> Result<Self> {
        let path = Self::meta_filename(dir, name);
        let bytes = crate::codec::read_whole_file(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::json(path, e))
    }

    pub fn write(&self, dir: &Path, name: &str) -> Result<()> {
        let path = Self::meta_filename(dir, name);
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| Error::json(path.clone(), e))?;
        crate::codec::write_whole_file(&path, &bytes)
    }
}

lazy_static::lazy_static! {
    static ref NAME_RE: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// Syntactic validity check used by the request handler before any name is
/// used to touch the filesystem or the cache (spec.md §4.6 step 3).
pub fn is_valid_methylome_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(is_valid_methylome_name("sample_1"));
        assert!(is_valid_methylome_name("A1"));
        assert!(!is_valid_methylome_name("sample 1"));
        assert!(!is_valid_methylome_name("sample/1"));
        assert!(!is_valid_methylome_name(""));
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = MethylomeMetadata::new("hg38".to_string(), 4, 999, false);
        meta.methylome_hash = 42;
        meta.write(dir.path(), "sample1").unwrap();
        let back = MethylomeMetadata::read(dir.path(), "sample1").unwrap();
        assert_eq!(meta, back);
    }
}
