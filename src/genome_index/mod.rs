//! Genome index: the sorted CpG-position table for one reference assembly,
//! its chromosome layout, and the query-building algorithm that turns
//! sorted genomic intervals into CpG-index ranges.

pub mod data;
pub mod metadata;

pub use data::GenomeIndexData;
pub use metadata::GenomeIndexMetadata;

use std::path::Path;

use crate::error::{Error, Result};
use crate::interval::GenomicInterval;
use crate::query::{Query, QueryRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeIndex {
    pub metadata: GenomeIndexMetadata,
    pub data: GenomeIndexData,
}

impl GenomeIndex {
    pub fn new(metadata: GenomeIndexMetadata, data: GenomeIndexData) -> Self {
        Self { metadata, data }
    }

    /// Read both files and verify the data payload's hash against the
    /// metadata's declared `index_hash`; a mismatch is treated as fatal
    /// for this entry (spec.md §4.5 "inconsistent_hash"), not a value the
    /// caller is left to notice later.
    pub fn read(dir: &Path, name: &str) -> Result<Self> {
        let metadata = GenomeIndexMetadata::read(dir, name)?;
        let data = GenomeIndexData::read(dir, name, &metadata)?;
        let computed = data.hash();
        if computed != metadata.index_hash {
            return Err(Error::HashMismatch { what: "genome index", expected: metadata.index_hash, actual: computed });
        }
        Ok(Self { metadata, data })
    }

    pub fn write(&self, dir: &Path, name: &str) -> Result<()> {
        let data_path = GenomeIndexMetadata::data_filename(dir, name);
        let meta_path = GenomeIndexMetadata::meta_filename(dir, name);
        if let Err(e) = self.data.write(dir, name) {
            crate::codec::remove_artifact_pair(&data_path, &meta_path);
            return Err(e);
        }
        if let Err(e) = self.metadata.write(dir, name) {
            crate::codec::remove_artifact_pair(&data_path, &meta_path);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_consistent(&self) -> bool {
        self.data.is_consistent(&self.metadata)
    }

    pub fn chrom_id(&self, name: &str) -> Option<i32> {
        self.metadata.chrom_id(name)
    }

    pub fn n_bins(&self, bin_size: u32) -> u32 {
        self.metadata.n_bins(bin_size)
    }

    /// Build a `Query` from a list of intervals that are already sorted:
    /// grouped by chromosome (groups may appear in any order) and, within
    /// each group, ascending by `start`.
    ///
    /// Walks a forward-only cursor per chromosome: for interval `[s, e)`,
    /// advance to the first position `>= s` (lower bound), then advance a
    /// second cursor from there to the first position `>= e`. Both cursors
    /// only ever move forward within a chromosome's position array, giving
    /// `O(|intervals| + |CpGs visited|)` in the monotone case.
    pub fn make_query(&self, intervals: &[GenomicInterval]) -> Query {
        let mut ranges = Vec::with_capacity(intervals.len());
        let mut i = 0;
        while i < intervals.len() {
            let chrom_id = intervals[i].chrom_id;
            let positions = &self.data.positions[chrom_id as usize];
            let chrom_offset = self.metadata.chrom_offset[chrom_id as usize];
            let mut cursor = 0usize;
            while i < intervals.len() && intervals[i].chrom_id == chrom_id {
                let iv = intervals[i];
                // advance cursor to first position >= start
                while cursor < positions.len() && positions[cursor] < iv.start {
                    cursor += 1;
                }
                let range_start = cursor;
                // advance a second cursor from there to first position >= stop
                while cursor < positions.len() && positions[cursor] < iv.stop {
                    cursor += 1;
                }
                let range_stop = cursor;
                ranges.push(QueryRange {
                    start: chrom_offset + range_start as u32,
                    stop: chrom_offset + range_stop as u32,
                });
                i += 1;
            }
        }
        Query::from_ranges(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_index() -> GenomeIndex {
        // c1 = AACGTACG (CpGs at 2, 6), c2 = CGCG (CpGs at 0, 2)
        let mut metadata = GenomeIndexMetadata::new(
            "toy".to_string(),
            vec!["c1".to_string(), "c2".to_string()],
            vec![8, 4],
        );
        metadata.n_cpgs = 4;
        metadata.chrom_offset = vec![0, 2];
        let data = GenomeIndexData { positions: vec![vec![2, 6], vec![0, 2]] };
        metadata.index_hash = data.hash();
        GenomeIndex::new(metadata, data)
    }

    #[test]
    fn scenario_1_index_build_shape() {
        let idx = toy_index();
        assert_eq!(idx.metadata.n_cpgs, 4);
        assert_eq!(idx.metadata.chrom_order, vec!["c1", "c2"]);
        assert_eq!(idx.metadata.chrom_size, vec![8, 4]);
        assert_eq!(idx.metadata.chrom_offset, vec![0, 2]);
        assert_eq!(idx.data.positions, vec![vec![2, 6], vec![0, 2]]);
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let idx = toy_index();
        let dir = tempfile::tempdir().unwrap();
        idx.write(dir.path(), "toy").unwrap();
        let back = GenomeIndex::read(dir.path(), "toy").unwrap();
        similar_asserts::assert_eq!(idx, back);
        assert!(back.is_consistent());
    }

    #[test]
    fn scenario_2_interval_query() {
        let idx = toy_index();
        let ivs = vec![
            GenomicInterval::new(0, 0, 8),
            GenomicInterval::new(1, 0, 4),
        ];
        let q = idx.make_query(&ivs);
        assert_eq!(q.len(), 2);
        assert_eq!(q.n_cpgs(), 4);
        let r0 = q.get(0).unwrap();
        let r1 = q.get(1).unwrap();
        assert_eq!((r0.start, r0.stop), (0, 2));
        assert_eq!((r1.start, r1.stop), (2, 4));
    }

    #[test]
    fn empty_ranges_for_past_end_or_empty_interval() {
        let idx = toy_index();
        let ivs = vec![GenomicInterval::new(0, 7, 7), GenomicInterval::new(0, 7, 8)];
        let q = idx.make_query(&ivs);
        assert_eq!(q.get(0).unwrap().width(), 0);
        assert_eq!(q.get(1).unwrap().width(), 0);
    }

    #[test]
    fn query_law_len_matches_intervals_and_total_width_matches_cpgs_in_range() {
        let idx = toy_index();
        let ivs = vec![GenomicInterval::new(0, 0, 8), GenomicInterval::new(1, 0, 4)];
        let q = idx.make_query(&ivs);
        assert_eq!(q.len(), ivs.len());
        assert_eq!(q.n_cpgs(), idx.metadata.n_cpgs as u64);
    }
}
