//! Unix daemonization: detach from the controlling terminal, write a PID
//! file, and redirect stdout/stderr to the configured log file. Only
//! available when a log file is configured -- enforced by
//! `ServerConfig::validate`, not here.

#![cfg(unix)]

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::unistd::{fork, setsid, ForkResult};

use crate::error::{Error, Result};

/// Fork, detach the child into its own session, and redirect stdio to
/// `log_file`. Returns in the child process only -- the parent calls
/// `std::process::exit(0)` itself.
pub fn daemonize(log_file: &Path, pid_file: Option<&Path>) -> Result<()> {
    match unsafe { fork() }.map_err(|e| Error::Format(format!("fork failed: {e}")))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(|e| Error::Format(format!("setsid failed: {e}")))?;

    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| Error::io(log_file, e))?;
    redirect_stdio(&log)?;

    if let Some(pid_file) = pid_file {
        let pid = std::process::id();
        crate::codec::write_whole_file(pid_file, pid.to_string().as_bytes())?;
    }

    Ok(())
}

fn redirect_stdio(log: &std::fs::File) -> Result<()> {
    use nix::unistd::dup2;
    let fd = log.as_raw_fd();
    dup2(fd, libc_stdout_fd()).map_err(|e| Error::Format(format!("dup2(stdout) failed: {e}")))?;
    dup2(fd, libc_stderr_fd()).map_err(|e| Error::Format(format!("dup2(stderr) failed: {e}")))?;
    Ok(())
}

const fn libc_stdout_fd() -> i32 {
    1
}

const fn libc_stderr_fd() -> i32 {
    2
}
