//! Plain configuration structs for the server and client binaries. These
//! are populated from CLI flags in `xfr`; nothing here reads environment
//! variables or config files on its own.

use std::path::PathBuf;
use std::time::Duration;

/// Server-side policy knobs, enforced on every request (spec.md §4.6, §5).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub n_threads: usize,
    pub max_resident_indexes: usize,
    pub max_resident_methylomes: usize,
    pub max_intervals: u32,
    pub min_bin_size: u32,
    pub read_timeout: Duration,
    pub handle_timeout: Duration,
    pub write_timeout: Duration,
    pub accept_queue_depth: usize,
    pub shutdown_grace_period: Duration,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub daemonize: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            port: 5000,
            n_threads: 4,
            max_resident_indexes: 8,
            max_resident_methylomes: 128,
            max_intervals: 1_000_000,
            min_bin_size: 100,
            read_timeout: Duration::from_secs(10),
            handle_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            accept_queue_depth: 256,
            shutdown_grace_period: Duration::from_secs(5),
            pid_file: None,
            log_file: None,
            daemonize: false,
        }
    }
}

impl ServerConfig {
    /// Daemonizing without a log file would silently discard everything
    /// the process logs after it detaches from its controlling terminal.
    pub fn validate(&self) -> Result<(), String> {
        if self.daemonize && self.log_file.is_none() {
            return Err("daemonize requires a log file".to_string());
        }
        if self.n_threads == 0 {
            return Err("n_threads must be positive".to_string());
        }
        Ok(())
    }
}

/// Client-side connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemonize_without_log_file_is_rejected() {
        let mut cfg = ServerConfig { daemonize: true, ..Default::default() };
        assert!(cfg.validate().is_err());
        cfg.log_file = Some(PathBuf::from("/var/log/xfr.log"));
        assert!(cfg.validate().is_ok());
    }
}
