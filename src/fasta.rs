//! FASTA loading: build a `GenomeIndex` by scanning a reference for CpG
//! ('C' followed by 'G', case-folded) dinucleotides. Plain and gzip'd
//! (`.gz`) FASTA are both accepted.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};
use crate::genome_index::{GenomeIndex, GenomeIndexData, GenomeIndexMetadata};

struct Record {
    name: String,
    seq: Vec<u8>,
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn parse_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    let mut current: Option<Record> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if let Some(header) = trimmed.strip_prefix('>') {
            if let Some(rec) = current.take() {
                records.push(rec);
            }
            let name = header.split_whitespace().next().unwrap_or("").to_string();
            current = Some(Record { name, seq: Vec::new() });
        } else if let Some(rec) = current.as_mut() {
            rec.seq.extend(trimmed.bytes());
        }
    }
    if let Some(rec) = current.take() {
        records.push(rec);
    }
    if records.is_empty() {
        return Err(Error::Format(format!("no FASTA records found in {}", path.display())));
    }
    Ok(records)
}

/// Positions of every 'C' immediately followed by 'G' (case-insensitive),
/// 0-based, relative to the start of `seq`.
fn find_cpgs(seq: &[u8]) -> Vec<u32> {
    let mut out = Vec::new();
    for i in 0..seq.len().saturating_sub(1) {
        let a = seq[i].to_ascii_uppercase();
        let b = seq[i + 1].to_ascii_uppercase();
        if a == b'C' && b == b'G' {
            out.push(i as u32);
        }
    }
    out
}

/// Build a genome index from a reference FASTA. Chromosomes are sorted
/// lexicographically by name before ids and offsets are assigned, so the
/// resulting `chrom_order` does not depend on the order records appeared
/// in the file.
pub fn from_reference(path: &Path, genome_name: &str) -> Result<GenomeIndex> {
    let mut records = parse_records(path)?;
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let chrom_order: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
    let chrom_size: Vec<u32> = records.iter().map(|r| r.seq.len() as u32).collect();
    let positions: Vec<Vec<u32>> = records.iter().map(|r| find_cpgs(&r.seq)).collect();

    let mut metadata = GenomeIndexMetadata::new(genome_name.to_string(), chrom_order, chrom_size);
    let mut chrom_offset = Vec::with_capacity(positions.len());
    let mut acc = 0u32;
    for p in &positions {
        chrom_offset.push(acc);
        acc += p.len() as u32;
    }
    metadata.chrom_offset = chrom_offset;
    metadata.n_cpgs = acc;

    let data = GenomeIndexData { positions };
    metadata.index_hash = data.hash();

    Ok(GenomeIndex::new(metadata, data))
}

/// Read an uncompressed or gzip'd file fully into memory -- used by tests
/// and by callers that want the raw sequence bytes rather than a built
/// index (e.g. `xfr check`).
pub fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut reader = open_reader(path)?;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(buf)
}
