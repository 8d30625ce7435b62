//! Completion-sentinel probing.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// What the filesystem says about an acquisition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelState {
    /// Target exists and no marker is present.
    Complete,
    /// A partial-file marker exists; a transfer is still writing.
    InFlight,
    /// Neither target nor marker exists.
    Absent,
}

/// Path of the partial-file marker for `target`.
pub fn marker_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Probe a target path. The marker takes precedence over the target so a
/// transport overwriting an older file is still seen as in flight.
pub fn probe(target: &Path, suffix: &str) -> SentinelState {
    if marker_path(target, suffix).exists() {
        SentinelState::InFlight
    } else if target.is_file() {
        SentinelState::Complete
    } else {
        SentinelState::Absent
    }
}
