//! Binary payload of a methylome: exactly `n_cpgs` fixed-size
//! `(n_meth: u16, n_unmeth: u16)` records in CpG-index order, optionally
//! zlib-compressed.

use std::path::Path;

use crate::codec;
use crate::error::{Error, Result};
use crate::methylome::metadata::MethylomeMetadata;

pub const RECORD_SIZE: usize = 4; // two u16

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethylomeData {
    /// `(n_meth, n_unmeth)` pairs, one per CpG, in CpG-index order.
    pub counts: Vec<(u16, u16)>,
}

impl MethylomeData {
    pub fn n_cpgs(&self) -> usize {
        self.counts.len()
    }

    fn to_flat_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.counts.len() * RECORD_SIZE);
        for &(m, u) in &self.counts {
            out.extend_from_slice(&m.to_le_bytes());
            out.extend_from_slice(&u.to_le_bytes());
        }
        out
    }

    fn from_flat_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(Error::BadMagicOrShape("<methylome data>".into()));
        }
        let mut counts = Vec::with_capacity(bytes.len() / RECORD_SIZE);
        for chunk in bytes.chunks_exact(RECORD_SIZE) {
            let m = u16::from_le_bytes(chunk[0..2].try_into().unwrap());
            let u = u16::from_le_bytes(chunk[2..4].try_into().unwrap());
            counts.push((m, u));
        }
        Ok(Self { counts })
    }

    /// Adler-32 hash of the *uncompressed* count array's byte image.
    pub fn hash(&self) -> u64 {
        codec::adler32_hash(&self.to_flat_bytes())
    }

    pub fn read(dir: &Path, name: &str, meta: &MethylomeMetadata) -> Result<Self> {
        let path = MethylomeMetadata::data_filename(dir, name);
        let raw = codec::read_whole_file(&path)?;
        let expected_len = meta.n_cpgs as usize * RECORD_SIZE;
        let flat = if meta.is_compressed {
            codec::zlib_decompress(&raw, expected_len)?
        } else {
            if raw.len() != expected_len {
                return Err(Error::BadMagicOrShape(path));
            }
            raw
        };
        Self::from_flat_bytes(&flat)
    }

    pub fn write(&self, dir: &Path, name: &str, compress: bool) -> Result<()> {
        let path = MethylomeMetadata::data_filename(dir, name);
        let flat = self.to_flat_bytes();
        let out = if compress { codec::zlib_compress(&flat)? } else { flat };
        codec::write_whole_file(&path, &out)
    }

    pub fn is_consistent(&self, meta: &MethylomeMetadata) -> bool {
        self.hash() == meta.methylome_hash
    }

    /// Sum of all counts across the whole array.
    pub fn global_levels<L: crate::levels::LevelElement>(&self) -> L {
        let mut out = L::default();
        for &(m, u) in &self.counts {
            out.accumulate(m, u);
        }
        out
    }

    /// Pairwise-sum two methylomes, applying the 16-bit saturating-ratio
    /// rule to any pair that would otherwise overflow.
    pub fn add(&self, other: &Self) -> Self {
        debug_assert_eq!(self.counts.len(), other.counts.len());
        let counts = self
            .counts
            .iter()
            .zip(other.counts.iter())
            .map(|(&(m1, u1), &(m2, u2))| saturate_pair(m1 as u64 + m2 as u64, u1 as u64 + u2 as u64))
            .collect();
        Self { counts }
    }
}

/// Apply the deliberate lossy-compression rule for 16-bit count storage:
/// if either count would overflow `u16`, scale both down proportionally so
/// the larger of the pair saturates at `u16::MAX` and the methylation
/// ratio is preserved. Counts that already fit are left untouched.
pub fn saturate_pair(n_meth: u64, n_unmeth: u64) -> (u16, u16) {
    let max = n_meth.max(n_unmeth);
    if max <= u16::MAX as u64 {
        return (n_meth as u16, n_unmeth as u16);
    }
    let scale = u16::MAX as f64 / max as f64;
    let scaled_meth = (n_meth as f64 * scale).round() as u64;
    let scaled_unmeth = (n_unmeth as f64 * scale).round() as u64;
    (
        scaled_meth.min(u16::MAX as u64) as u16,
        scaled_unmeth.min(u16::MAX as u64) as u16,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_pair_preserves_ratio_when_overflowing() {
        let (m, u) = saturate_pair(200_000, 100_000);
        assert_eq!(m, u16::MAX);
        // ratio preserved within rounding
        assert!((u as f64 / m as f64 - 0.5).abs() < 0.01);
    }

    #[test]
    fn saturate_pair_is_identity_when_in_range() {
        assert_eq!(saturate_pair(10, 20), (10, 20));
        assert_eq!(saturate_pair(0, 0), (0, 0));
    }

    #[test]
    fn round_trip_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let data = MethylomeData { counts: vec![(1, 0), (0, 1), (2, 2), (0, 0)] };
        data.write(dir.path(), "m", false).unwrap();
        let meta = MethylomeMetadata {
            version: "x".into(), host: "h".into(), user: "u".into(), creation_time: "t".into(),
            methylome_hash: data.hash(), index_hash: 0, genome_name: "g".into(),
            n_cpgs: 4, is_compressed: false,
        };
        let back = MethylomeData::read(dir.path(), "m", &meta).unwrap();
        similar_asserts::assert_eq!(data, back);
        assert!(back.is_consistent(&meta));
    }

    #[test]
    fn round_trip_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let data = MethylomeData { counts: vec![(1, 0), (0, 1), (2, 2), (0, 0)] };
        data.write(dir.path(), "m", true).unwrap();
        let meta = MethylomeMetadata {
            version: "x".into(), host: "h".into(), user: "u".into(), creation_time: "t".into(),
            methylome_hash: data.hash(), index_hash: 0, genome_name: "g".into(),
            n_cpgs: 4, is_compressed: true,
        };
        let back = MethylomeData::read(dir.path(), "m", &meta).unwrap();
        similar_asserts::assert_eq!(data, back);
    }

    #[test]
    fn add_is_pairwise_sum_before_saturation() {
        let a = MethylomeData { counts: vec![(1, 2), (3, 4)] };
        let b = MethylomeData { counts: vec![(5, 6), (7, 8)] };
        let merged = a.add(&b);
        assert_eq!(merged.counts, vec![(6, 8), (10, 12)]);
    }
}
