//! Methylome: a flat vector of per-CpG `(n_meth, n_unmeth)` counts aligned
//! to a specific genome index, plus the aggregation kernels that turn that
//! vector into level elements over intervals, bins, and sliding windows.

pub mod data;
pub mod metadata;

pub use data::{saturate_pair, MethylomeData};
pub use metadata::{is_valid_methylome_name, MethylomeMetadata};

use std::path::Path;

use crate::error::{Error, Result};
use crate::genome_index::GenomeIndex;
use crate::levels::LevelElement;
use crate::query::Query;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Methylome {
    pub metadata: MethylomeMetadata,
    pub data: MethylomeData,
}

impl Methylome {
    pub fn new(metadata: MethylomeMetadata, data: MethylomeData) -> Self {
        Self { metadata, data }
    }

    /// Read both files and verify the count array's hash against the
    /// metadata's declared `methylome_hash`; a mismatch is treated as
    /// fatal for this entry (spec.md §4.5 "inconsistent_hash").
    pub fn read(dir: &Path, name: &str) -> Result<Self> {
        let metadata = MethylomeMetadata::read(dir, name)?;
        let data = MethylomeData::read(dir, name, &metadata)?;
        let computed = data.hash();
        if computed != metadata.methylome_hash {
            return Err(Error::HashMismatch { what: "methylome", expected: metadata.methylome_hash, actual: computed });
        }
        Ok(Self { metadata, data })
    }

    /// Fatal version of `is_consistent_with_index`, for call sites (the
    /// `xfr` CLI, the merge path) that want a propagating error rather
    /// than a bare bool.
    pub fn require_consistent_with_index(&self, index: &GenomeIndex) -> Result<()> {
        if self.is_consistent_with_index(index) {
            Ok(())
        } else {
            Err(Error::Inconsistent)
        }
    }

    pub fn write(&self, dir: &Path, name: &str, compress: bool) -> Result<()> {
        let data_path = MethylomeMetadata::data_filename(dir, name);
        let meta_path = MethylomeMetadata::meta_filename(dir, name);
        if let Err(e) = self.data.write(dir, name, compress) {
            crate::codec::remove_artifact_pair(&data_path, &meta_path);
            return Err(e);
        }
        let mut meta = self.metadata.clone();
        meta.is_compressed = compress;
        if let Err(e) = meta.write(dir, name) {
            crate::codec::remove_artifact_pair(&data_path, &meta_path);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_consistent(&self) -> bool {
        self.data.is_consistent(&self.metadata)
    }

    pub fn is_consistent_with_index(&self, index: &GenomeIndex) -> bool {
        self.metadata.is_consistent_with_index(&index.metadata)
    }

    /// Sum over every CpG in the methylome.
    pub fn global_levels<L: LevelElement>(&self) -> L {
        self.data.global_levels::<L>()
    }

    /// Pairwise-sum with `other`, applying the saturating-ratio rule;
    /// `metadata` of the result retains `self`'s genome/index identity
    /// with a freshly computed `methylome_hash`.
    pub fn merge(&self, other: &Self) -> Self {
        let data = self.data.add(&other.data);
        let mut metadata = self.metadata.clone();
        metadata.methylome_hash = data.hash();
        Self { metadata, data }
    }

    /// Aggregate counts over each range in `query`, writing one level
    /// element per range in query order. No allocation beyond the output
    /// vector.
    pub fn levels_for_query<L: LevelElement>(&self, query: &Query) -> Vec<L> {
        let mut out = Vec::with_capacity(query.len());
        for range in query.iter() {
            let mut elem = L::default();
            let slice = &self.data.counts[range.start as usize..range.stop as usize];
            for &(m, u) in slice {
                elem.accumulate(m, u);
            }
            out.push(elem);
        }
        out
    }

    /// Bin aggregation: iterate chromosomes in index order; for each
    /// chromosome walk a CpG-position cursor and a parallel count cursor,
    /// both only moving forward, and emit one level element per genomic
    /// bin `[bin_beg, bin_end)`. Emits exactly `index.n_bins(bin_size)`
    /// elements.
    pub fn levels_for_bins<L: LevelElement>(&self, bin_size: u32, index: &GenomeIndex) -> Vec<L> {
        debug_assert!(bin_size > 0);
        let n_bins_total = index.n_bins(bin_size) as usize;
        let mut out = Vec::with_capacity(n_bins_total);
        for (chrom_id, positions) in index.data.positions.iter().enumerate() {
            let chrom_size = index.metadata.chrom_size[chrom_id];
            let chrom_offset = index.metadata.chrom_offset[chrom_id] as usize;
            let mut cursor = 0usize; // index into positions / counts for this chrom
            let mut bin_beg = 0u32;
            while bin_beg < chrom_size {
                let bin_end = (bin_beg + bin_size).min(chrom_size);
                let mut elem = L::default();
                while cursor < positions.len() && positions[cursor] < bin_end {
                    let (m, u) = self.data.counts[chrom_offset + cursor];
                    elem.accumulate(m, u);
                    cursor += 1;
                }
                out.push(elem);
                bin_beg = bin_end;
            }
        }
        out
    }

    /// Sliding-window aggregation: as `levels_for_bins`, but with leading
    /// and lagging cursor pairs. When the window advances, counts for CpGs
    /// that fall out the lagging edge are subtracted and counts for CpGs
    /// that enter the leading edge are added. `window_step` need not equal
    /// `window_size`.
    pub fn levels_for_windows<L: LevelElement>(
        &self,
        window_size: u32,
        window_step: u32,
        index: &GenomeIndex,
    ) -> Vec<L>
    where
        L: std::ops::AddAssign + std::ops::SubAssign,
    {
        debug_assert!(window_size > 0 && window_step > 0);
        let mut out = Vec::new();
        for (chrom_id, positions) in index.data.positions.iter().enumerate() {
            let chrom_size = index.metadata.chrom_size[chrom_id];
            let chrom_offset = index.metadata.chrom_offset[chrom_id] as usize;
            let mut lag_cursor = 0usize;
            let mut lead_cursor = 0usize;
            let mut current = L::default();
            let mut win_beg = 0u32;
            // prime the first window
            let mut win_end = window_size.min(chrom_size);
            while lead_cursor < positions.len() && positions[lead_cursor] < win_end {
                let (m, u) = self.data.counts[chrom_offset + lead_cursor];
                current.accumulate(m, u);
                lead_cursor += 1;
            }
            loop {
                out.push(current);
                win_beg += window_step;
                if win_beg >= chrom_size {
                    break;
                }
                win_end = (win_beg + window_size).min(chrom_size);
                while lag_cursor < positions.len() && positions[lag_cursor] < win_beg {
                    let (m, u) = self.data.counts[chrom_offset + lag_cursor];
                    let mut sub = L::default();
                    sub.accumulate(m, u);
                    current -= sub;
                    lag_cursor += 1;
                }
                while lead_cursor < positions.len() && positions[lead_cursor] < win_end {
                    let (m, u) = self.data.counts[chrom_offset + lead_cursor];
                    current.accumulate(m, u);
                    lead_cursor += 1;
                }
            }
        }
        out
    }
}
