//! Small helpers for populating the "creation environment" fields
//! (`host`, `user`, `creation_time`, `version`) carried by both metadata
//! kinds -- mirrors `environment_utilities` in the original implementation.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn tool_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(unix)]
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(not(unix))]
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

pub fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string())
}

/// An RFC-3339-ish timestamp without pulling in a date/time crate the
/// teacher doesn't already depend on: seconds since the epoch, which is
/// sufficient for an opaque "creation_time" metadata field.
pub fn now_as_string() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}
