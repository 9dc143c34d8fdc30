//! JSON-shaped metadata for a genome index: tool version, creation
//! environment, and the per-chromosome layout table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment;
use crate::error::{Error, Result};

pub const DATA_EXTENSION: &str = "cpg_idx";
pub const META_EXTENSION: &str = "cpg_idx.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeIndexMetadata {
    pub version: String,
    pub host: String,
    pub user: String,
    pub creation_time: String,
    pub genome_name: String,
    pub n_cpgs: u32,
    pub index_hash: u64,
    pub chrom_order: Vec<String>,
    pub chrom_size: Vec<u32>,
    pub chrom_offset: Vec<u32>,
}

impl GenomeIndexMetadata {
    pub fn new(genome_name: String, chrom_order: Vec<String>, chrom_size: Vec<u32>) -> Self {
        // Filled in once positions are known; placeholder here.
        let chrom_offset = vec![0u32; chrom_size.len()];
        Self {
            version: environment::tool_version(),
            host: environment::hostname(),
            user: environment::username(),
            creation_time: environment::now_as_string(),
            genome_name,
            n_cpgs: 0,
            index_hash: 0,
            chrom_order,
            chrom_size,
            chrom_offset,
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
    pub fn is_consistent_with(&self, index_hash: u64, genome_name: &str, n_cpgs: u32, version: &str) -> bool {
        self.index_hash == index_hash
            && self.genome_name == genome_name
            && self.n_cpgs == n_cpgs
            && self.version == version
    }

    pub fn chrom_id(&self, name: &str) -> Option<i32> {
        self.chrom_order.iter().position(|n| n == name).map(|i| i as i32)
    }

    /// Number of CpGs on chromosome `chrom_id`.
    pub fn n_cpgs_for_chrom(&self, chrom_id: usize) -> u32 {
        let next = self
            .chrom_offset
            .get(chrom_id + 1)
            .copied()
            .unwrap_or(self.n_cpgs);
        next - self.chrom_offset[chrom_id]
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

    /// Total bin count across every chromosome: `sum(ceil(chrom_size /
    /// bin_size))`. Some bin-count formulas floor-divide here, which
    /// silently drops the final short bin whenever `chrom_size` isn't an
    /// exact multiple of `bin_size`; this always rounds up instead.
    pub fn n_bins(&self, bin_size: u32) -> u32 {
        self.chrom_size
            .iter()
            .map(|&size| size.div_ceil(bin_size))
            .sum()
    }
}
