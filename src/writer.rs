//! Output writers: format aggregated level elements as BED-like text.
//! `BedgraphWriter` emits one bedGraph file per methylome column (the
//! conventional format for a single score track); `DataframeWriter` emits
//! one wide TSV with a row per genomic interval and a column per
//! methylome, which is what a caller piping into a dataframe library
//! actually wants.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::levels::LevelElement;

/// One row to write: a genomic interval's coordinates plus one level
/// element per methylome, in the same order as `methylome_names`.
pub struct LevelsRow<'a, L> {
    pub chrom: &'a str,
    pub start: u32,
    pub stop: u32,
    pub values: &'a [L],
}

pub trait LevelsWriter<L: LevelElement> {
    fn write_row(&mut self, row: &LevelsRow<L>) -> Result<()>;
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One bedGraph file per methylome column: `chrom\tstart\tstop\tscore`,
/// where `score` is the weighted mean methylation percentage.
pub struct BedgraphWriter {
    out_dir: PathBuf,
    methylome_names: Vec<String>,
    writers: HashMap<usize, BufWriter<File>>,
}

impl BedgraphWriter {
    pub fn new(out_dir: &Path, methylome_names: Vec<String>) -> Result<Self> {
        std::fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
        Ok(Self { out_dir: out_dir.to_path_buf(), methylome_names, writers: HashMap::new() })
    }

    fn writer_for(&mut self, col: usize) -> Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(&col) {
            let name = &self.methylome_names[col];
            let path = self.out_dir.join(format!("{name}.bedgraph"));
            let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
            self.writers.insert(col, BufWriter::new(file));
        }
        Ok(self.writers.get_mut(&col).unwrap())
    }
}

impl<L: LevelElement> LevelsWriter<L> for BedgraphWriter {
    fn write_row(&mut self, row: &LevelsRow<L>) -> Result<()> {
        for (col, levels) in row.values.iter().enumerate() {
            let wmean = weighted_mean(levels);
            let line = format!("{}\t{}\t{}\t{:.4}\n", row.chrom, row.start, row.stop, wmean * 100.0);
            let path_for_error = self.out_dir.clone();
            self.writer_for(col)?
                .write_all(line.as_bytes())
                .map_err(|e| Error::io(path_for_error, e))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for w in self.writers.values_mut() {
            w.flush().map_err(|e| Error::io(&self.out_dir, e))?;
        }
        Ok(())
    }
}

/// A single wide TSV: `chrom\tstart\tstop\t<methylome1>\t<methylome2>...`,
/// one weighted-mean-percentage cell per methylome.
pub struct DataframeWriter {
    writer: BufWriter<File>,
}

impl DataframeWriter {
    pub fn new(path: &Path, methylome_names: &[String]) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let header = format!("chrom\tstart\tstop\t{}\n", methylome_names.join("\t"));
        writer.write_all(header.as_bytes()).map_err(|e| Error::io(path, e))?;
        Ok(Self { writer })
    }
}

impl<L: LevelElement> LevelsWriter<L> for DataframeWriter {
    fn write_row(&mut self, row: &LevelsRow<L>) -> Result<()> {
        let mut line = format!("{}\t{}\t{}", row.chrom, row.start, row.stop);
        for levels in row.values {
            line.push('\t');
            line.push_str(&format!("{:.4}", weighted_mean(levels) * 100.0));
        }
        line.push('\n');
        self.writer.write_all(line.as_bytes()).map_err(|e| Error::io("<dataframe>", e))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io("<dataframe>", e))
    }
}

fn weighted_mean<L: LevelElement>(levels: &L) -> f64 {
    let reads = levels.n_reads();
    if reads == 0 {
        return 0.0;
    }
    // n_reads() is the total of meth+unmeth encoded in the element's own
    // byte layout; reconstructing n_meth from the generic trait alone
    // would need another accessor, so round-trip through the byte image.
    let bytes = levels.to_le_bytes();
    let n_meth = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    n_meth as f64 / reads as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Levels;

    #[test]
    fn dataframe_writer_emits_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let names = vec!["a".to_string(), "b".to_string()];
        let mut writer = DataframeWriter::new(&path, &names).unwrap();
        let values = [Levels { n_meth: 3, n_unmeth: 1 }, Levels { n_meth: 0, n_unmeth: 0 }];
        writer.write_row(&LevelsRow { chrom: "c1", start: 0, stop: 4, values: &values }).unwrap();
        writer.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "chrom\tstart\tstop\ta\tb");
        assert_eq!(lines.next().unwrap(), "c1\t0\t4\t75.0000\t0.0000");
    }

    #[test]
    fn bedgraph_writer_creates_one_file_per_methylome() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        let mut writer = BedgraphWriter::new(dir.path(), names).unwrap();
        let values = [Levels { n_meth: 1, n_unmeth: 1 }, Levels { n_meth: 2, n_unmeth: 0 }];
        writer.write_row(&LevelsRow { chrom: "c1", start: 0, stop: 4, values: &values }).unwrap();
        writer.finish().unwrap();

        let a = std::fs::read_to_string(dir.path().join("a.bedgraph")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("b.bedgraph")).unwrap();
        assert_eq!(a.trim(), "c1\t0\t4\t50.0000");
        assert_eq!(b.trim(), "c1\t0\t4\t100.0000");
    }
}
