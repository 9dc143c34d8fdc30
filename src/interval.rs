//! Genomic intervals: `(chrom_id, start, stop)` with `start <= stop <=
//! chrom_size[chrom_id]`.

use crate::error::{Error, Result};
use crate::genome_index::GenomeIndex;

/// A half-open genomic interval `[start, stop)` on chromosome `chrom_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomicInterval {
    pub chrom_id: i32,
    pub start: u32,
    pub stop: u32,
}

impl GenomicInterval {
    pub fn new(chrom_id: i32, start: u32, stop: u32) -> Self {
        Self { chrom_id, start, stop }
    }

    /// Validate against a genome index: `chrom_id` in range and
    /// `stop <= chrom_size[chrom_id]`.
    pub fn validate(&self, index: &GenomeIndex) -> Result<()> {
        let chrom_size = index
            .metadata
            .chrom_size
            .get(self.chrom_id as usize)
            .copied()
            .ok_or_else(|| Error::Format(format!("chrom_id {} out of range", self.chrom_id)))?;
        if self.start > self.stop || self.stop > chrom_size {
            return Err(Error::Format(format!(
                "interval [{}, {}) invalid for chrom of size {chrom_size}",
                self.start, self.stop
            )));
        }
        Ok(())
    }
}

/// Sort a list of intervals so it satisfies the precondition of
/// `GenomeIndex::make_query`: grouped by chromosome (in whatever order the
/// chromosomes first appear), ascending `start` within each group.
pub fn sort_for_query(intervals: &mut [GenomicInterval]) {
    use std::collections::HashMap;
    let mut first_seen: HashMap<i32, usize> = HashMap::new();
    for iv in intervals.iter() {
        let next = first_seen.len();
        first_seen.entry(iv.chrom_id).or_insert(next);
    }
    intervals.sort_by_key(|iv| (first_seen[&iv.chrom_id], iv.start));
}

/// Generate the set of bin intervals for a chromosome of size `chrom_size`
/// with the given `bin_size`, as used to prove bins-vs-intervals
/// equivalence in tests.
pub fn bin_intervals_for_chrom(chrom_id: i32, chrom_size: u32, bin_size: u32) -> Vec<GenomicInterval> {
    let mut out = Vec::new();
    let mut beg = 0u32;
    while beg < chrom_size {
        let end = (beg + bin_size).min(chrom_size);
        out.push(GenomicInterval::new(chrom_id, beg, end));
        beg = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_for_query_groups_by_first_appearance_then_start() {
        let mut ivs = vec![
            GenomicInterval::new(1, 10, 20),
            GenomicInterval::new(0, 5, 8),
            GenomicInterval::new(1, 0, 5),
            GenomicInterval::new(0, 0, 4),
        ];
        sort_for_query(&mut ivs);
        assert_eq!(
            ivs,
            vec![
                GenomicInterval::new(1, 10, 20),
                GenomicInterval::new(1, 0, 5),
                GenomicInterval::new(0, 5, 8),
                GenomicInterval::new(0, 0, 4),
            ]
        );
    }

    #[test]
    fn bin_intervals_cover_chrom_exactly() {
        let ivs = bin_intervals_for_chrom(0, 10, 4);
        assert_eq!(ivs.len(), 3);
        assert_eq!(ivs[2].stop, 10);
    }
}
