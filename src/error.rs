//! Error taxonomy shared by every module in this crate.
//!
//! Kinds follow the grouping used throughout the design: I/O, wire/on-disk
//! format, integrity (hash/consistency) failures, protocol violations, and
//! policy rejections. A cache miss that could not be satisfied from disk is
//! folded into `Io`/`Format`/`Integrity` at the point it occurs and then
//! re-mapped to a `ResponseStatus` by the request handler -- the handler is
//! the only place a storage error becomes a client-visible status code.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("short write: expected to write {expected} bytes, wrote {got}")]
    ShortWrite { expected: usize, got: usize },

    #[error("bad magic or shape in {0}")]
    BadMagicOrShape(PathBuf),

    #[error("decompress error: {0}")]
    Decompress(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("hash mismatch for {what}: metadata says {expected:#x}, computed {actual:#x}")]
    HashMismatch { what: &'static str, expected: u64, actual: u64 },

    #[error("methylome is not consistent with the genome index it claims to use")]
    Inconsistent,

    #[error("invalid request type {0}")]
    InvalidRequestType(u32),

    #[error("malformed response header")]
    MalformedHeader,

    #[error("body length mismatch: expected {expected}, got {got}")]
    BodyLengthMismatch { expected: usize, got: usize },

    #[error("too many intervals: {requested} > {max}")]
    TooManyIntervals { requested: u32, max: u32 },

    #[error("bin size too small: {requested} < {min}")]
    BinSizeTooSmall { requested: u32, min: u32 },

    #[error("invalid methylome name: {0}")]
    InvalidMethylomeName(String),

    #[error("methylome not found: {0}")]
    MethylomeNotFound(String),

    #[error("genome index not found: {0}")]
    IndexNotFound(String),

    #[error("connection timed out")]
    ConnectionTimeout,

    #[error("format error: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json { path: path.into(), source }
    }
}
