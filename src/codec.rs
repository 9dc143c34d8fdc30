//! Byte-level read/write for index and methylome data payloads, optional
//! zlib-format compression, and the Adler-32 content hash used as both the
//! integrity check and the identity a methylome declares for its index.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Adler-32 of the byte image of `data`, matching the "hash of the data
/// payload in file order" definition (see spec note on the seed-1 /
/// combine-trick ambiguity in the original implementation: we just hash the
/// fully assembled buffer in one pass).
pub fn adler32_hash(data: &[u8]) -> u64 {
    adler32::RollingAdler32::from_buffer(data).hash() as u64
}

/// Read `n` little-endian `u32`s from `path` into a freshly allocated
/// `Vec<u32>`. Used for the genome index position arrays.
pub fn read_u32_array(path: &Path, n: usize) -> Result<Vec<u32>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let v = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| short_read_or_io(path, e))?;
        out.push(v);
    }
    Ok(out)
}

/// Write a slice of little-endian `u32`s to `path`, truncating/creating as
/// needed. On any failure the partially-written file is removed.
pub fn write_u32_array(path: &Path, data: &[u32]) -> Result<()> {
    let result = (|| -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for &v in data {
            writer
                .write_u32::<LittleEndian>(v)
                .map_err(|e| Error::io(path, e))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    })();
    if result.is_err() {
        remove_best_effort(path);
    }
    result
}

/// Raw bytes of the whole file at `path`.
pub fn read_whole_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(buf)
}

pub fn write_whole_file(path: &Path, data: &[u8]) -> Result<()> {
    let result = (|| -> Result<()> {
        let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
        file.write_all(data).map_err(|e| Error::io(path, e))?;
        Ok(())
    })();
    if result.is_err() {
        remove_best_effort(path);
    }
    result
}

/// zlib-compress `data`.
pub fn zlib_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Decompress(e.to_string()))
}

/// zlib-decompress `data` into a buffer of exactly `expected_len` bytes.
pub fn zlib_decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    if out.len() != expected_len {
        return Err(Error::BadMagicOrShape(PathBuf::from("<compressed payload>")));
    }
    Ok(out)
}

fn short_read_or_io(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ShortRead { expected: 0, got: 0 }
    } else {
        Error::io(path, e)
    }
}

fn remove_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("failed to remove partial output {path:?}: {e}");
        }
    }
}

/// Remove a data file and its sibling metadata file after a write failure.
pub fn remove_artifact_pair(data_path: &Path, meta_path: &Path) {
    remove_best_effort(data_path);
    remove_best_effort(meta_path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_matches_known_vector() {
        // "Wikipedia" -> 0x11E60398 is the textbook adler32 test vector.
        let hash = adler32_hash(b"Wikipedia");
        assert_eq!(hash, 0x11E6_0398);
    }

    #[test]
    fn u32_array_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![0u32, 1, 2, 1_000_000, u32::MAX];
        write_u32_array(&path, &data).unwrap();
        let back = read_u32_array(&path, data.len()).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn zlib_round_trips() {
        let data = b"AAAABBBBCCCCDDDD".repeat(100);
        let compressed = zlib_compress(&data).unwrap();
        let back = zlib_decompress(&compressed, data.len()).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn write_failure_removes_partial_files() {
        // Directory as "file" path forces a create() failure.
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("sub");
        std::fs::create_dir(&bogus).unwrap();
        let err = write_whole_file(&bogus, b"x");
        assert!(err.is_err());
    }
}
