//! `xfr`: a thin command-line front end over the `transferase` library.
//!
//! Flag surface and human-facing output are explicitly out of scope for
//! the core (see the crate's top-level docs); this binary exists so the
//! library has a real caller and so the on-disk artifacts it produces can
//! be exercised end to end from a shell.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use transferase::config::ServerConfig;
use transferase::genome_index::GenomeIndex;
use transferase::levels::{Levels, LevelsCovered};
use transferase::methylome::Methylome;
use transferase::server::Server;
use transferase::writer::{DataframeWriter, LevelsRow, LevelsWriter};

#[derive(Parser, Debug)]
#[command(name = "xfr", version, about = "Storage and query engine for single-CpG methylation data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a genome index from a reference FASTA (optionally gzip'd).
    Index {
        #[arg(long)]
        fasta: PathBuf,
        #[arg(long)]
        genome_name: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Aggregate one or more methylomes over a fixed bin size.
    Query {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        genome_name: String,
        #[arg(long, num_args = 1..)]
        methylomes: Vec<String>,
        #[arg(long)]
        bin_size: u32,
        #[arg(long)]
        covered: bool,
        #[arg(long, default_value = "out.tsv")]
        out: PathBuf,
    },
    /// Merge two methylomes from the same genome into a synthetic combined one.
    Merge {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
        #[arg(long)]
        out_name: String,
        #[arg(long)]
        compress: bool,
    },
    /// Rewrite a methylome's data file with (or without) zlib compression.
    Compress {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        decompress: bool,
    },
    /// Verify the integrity hash of an index or methylome.
    Check {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        is_index: bool,
    },
    /// List the stems in `data_dir` for which both artifact files exist.
    List {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        is_index: bool,
    },
    /// Run the server.
    Server {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, default_value_t = 5000)]
        port: u16,
        #[arg(long, default_value_t = 4)]
        n_threads: usize,
        #[arg(long)]
        log_file: Option<PathBuf>,
        #[arg(long)]
        daemonize: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    transferase::logging::init(None, LevelFilter::Info).ok();

    match cli.command {
        Command::Index { fasta, genome_name, out_dir } => {
            let index = transferase::fasta::from_reference(&fasta, &genome_name)?;
            index.write(&out_dir, &genome_name)?;
            println!("wrote index for {genome_name}: {} CpGs", index.metadata.n_cpgs);
        }
        Command::Query { data_dir, genome_name, methylomes, bin_size, covered, out } => {
            run_query(&data_dir, &genome_name, &methylomes, bin_size, covered, &out)?;
        }
        Command::Merge { data_dir, a, b, out_name, compress } => {
            let ma = Methylome::read(&data_dir, &a).context("reading first methylome")?;
            let mb = Methylome::read(&data_dir, &b).context("reading second methylome")?;
            if ma.metadata.index_hash != mb.metadata.index_hash {
                bail!("methylomes are built against different genome indexes");
            }
            let merged = ma.merge(&mb);
            merged.write(&data_dir, &out_name, compress)?;
            println!("wrote merged methylome {out_name}");
        }
        Command::Compress { data_dir, name, decompress } => {
            let m = Methylome::read(&data_dir, &name)?;
            m.write(&data_dir, &name, !decompress)?;
            println!("rewrote {name} (compressed={})", !decompress);
        }
        Command::Check { data_dir, name, is_index } => {
            let ok = if is_index {
                match GenomeIndex::read(&data_dir, &name) {
                    Ok(_) => true,
                    Err(transferase::Error::HashMismatch { .. }) => false,
                    Err(e) => return Err(e.into()),
                }
            } else {
                match Methylome::read(&data_dir, &name) {
                    Ok(_) => true,
                    Err(transferase::Error::HashMismatch { .. }) => false,
                    Err(e) => return Err(e.into()),
                }
            };
            println!("{name}: {}", if ok { "consistent" } else { "HASH MISMATCH" });
            if !ok {
                std::process::exit(1);
            }
        }
        Command::List { data_dir, is_index } => {
            let ext = if is_index { "cpg_idx.json" } else { "m16.json" };
            let mut stems: Vec<String> = std::fs::read_dir(&data_dir)
                .with_context(|| format!("reading {}", data_dir.display()))?
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter_map(|n| n.strip_suffix(&format!(".{ext}")).map(str::to_string))
                .collect();
            stems.sort();
            for s in stems {
                println!("{s}");
            }
        }
        Command::Server { data_dir, port, n_threads, log_file, daemonize } => {
            let config = ServerConfig { data_dir, port, n_threads, log_file: log_file.clone(), daemonize, ..Default::default() };
            config.validate().map_err(|e| anyhow::anyhow!(e))?;
            #[cfg(unix)]
            if config.daemonize {
                let log_file = config.log_file.clone().expect("validated above");
                transferase::daemonize::daemonize(&log_file, config.pid_file.as_deref())?;
            }
            let server = Server::new(config);
            server.run().context("server exited with an error")?;
        }
    }
    Ok(())
}

fn run_query(
    data_dir: &std::path::Path,
    genome_name: &str,
    methylome_names: &[String],
    bin_size: u32,
    covered: bool,
    out: &std::path::Path,
) -> Result<()> {
    let index = GenomeIndex::read(data_dir, genome_name).context("reading genome index")?;
    let methylomes: Vec<Methylome> = methylome_names
        .iter()
        .map(|n| Methylome::read(data_dir, n).with_context(|| format!("reading methylome {n}")))
        .collect::<Result<_>>()?;
    for m in &methylomes {
        m.require_consistent_with_index(&index).context("methylome/index consistency check")?;
    }

    let mut writer = DataframeWriter::new(out, methylome_names)?;
    if covered {
        let columns: Vec<Vec<LevelsCovered>> =
            methylomes.iter().map(|m| m.levels_for_bins(bin_size, &index)).collect();
        write_bin_rows(&mut writer, &index, bin_size, &columns)?;
    } else {
        let columns: Vec<Vec<Levels>> = methylomes.iter().map(|m| m.levels_for_bins(bin_size, &index)).collect();
        write_bin_rows(&mut writer, &index, bin_size, &columns)?;
    }
    writer.finish()?;
    println!("wrote {}", out.display());
    Ok(())
}

/// Walk every chromosome's bins in the same order `levels_for_bins` emits
/// them in and pair each row up with its genomic coordinates for the
/// writer, which only sees level elements, not positions.
fn write_bin_rows<L: transferase::levels::LevelElement>(
    writer: &mut DataframeWriter,
    index: &GenomeIndex,
    bin_size: u32,
    columns: &[Vec<L>],
) -> Result<()> {
    let mut row = 0usize;
    for (chrom_name, &chrom_size) in index.metadata.chrom_order.iter().zip(index.metadata.chrom_size.iter()) {
        let mut beg = 0u32;
        while beg < chrom_size {
            let end = (beg + bin_size).min(chrom_size);
            let values: Vec<L> = columns.iter().map(|col| col[row]).collect();
            writer.write_row(&LevelsRow { chrom: chrom_name, start: beg, stop: end, values: &values })?;
            row += 1;
            beg = end;
        }
    }
    Ok(())
}
