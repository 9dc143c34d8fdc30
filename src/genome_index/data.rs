//! Binary payload of a genome index: for each chromosome, in
//! `chrom_order`, a packed array of strictly increasing `u32` CpG start
//! positions.

use std::path::Path;

use crate::codec;
use crate::error::Result;
use crate::genome_index::metadata::GenomeIndexMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenomeIndexData {
    /// One `Vec<u32>` of CpG positions per chromosome, in `chrom_order`.
    pub positions: Vec<Vec<u32>>,
}

impl GenomeIndexData {
    pub fn n_cpgs(&self) -> u32 {
        self.positions.iter().map(|p| p.len() as u32).sum()
    }

    /// Concatenated byte image in file order -- the thing the Adler-32
    /// hash and the on-disk data file are both computed from.
    pub fn to_flat_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.n_cpgs() as usize * 4);
        for chrom in &self.positions {
            for &p in chrom {
                out.extend_from_slice(&p.to_le_bytes());
            }
        }
        out
    }

    pub fn hash(&self) -> u64 {
        codec::adler32_hash(&self.to_flat_bytes())
    }

    pub fn read(dir: &Path, name: &str, meta: &GenomeIndexMetadata) -> Result<Self> {
        let path = GenomeIndexMetadata::data_filename(dir, name);
        let flat = codec::read_u32_array(&path, meta.n_cpgs as usize)?;
        let mut positions = Vec::with_capacity(meta.chrom_order.len());
        for (i, _) in meta.chrom_order.iter().enumerate() {
            let begin = meta.chrom_offset[i] as usize;
            let end = meta
                .chrom_offset
                .get(i + 1)
                .copied()
                .unwrap_or(meta.n_cpgs) as usize;
            positions.push(flat[begin..end].to_vec());
        }
        Ok(Self { positions })
    }

    pub fn write(&self, dir: &Path, name: &str) -> Result<()> {
        let path = GenomeIndexMetadata::data_filename(dir, name);
        let as_u32: Vec<u32> = self.positions.iter().flatten().copied().collect();
        codec::write_u32_array(&path, &as_u32)
    }

    pub fn is_consistent(&self, meta: &GenomeIndexMetadata) -> bool {
        self.hash() == meta.index_hash
    }
}
