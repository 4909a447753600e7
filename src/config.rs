use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::ProfileKind;

/// File polled for pending commands, relative to the monitor's directory.
pub const SENTINEL_FILE: &str = "unittest.cmd";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Dumps always carry symbolized stacks unless configured otherwise.
pub const DEFAULT_DEBUG: u8 = probing_pprof::DEBUG_SYMBOLIZED;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Directory holding the sentinel and the profile artifacts.
    pub workdir: PathBuf,
    /// Wait between two poll cycles.
    pub interval: Duration,
    /// Detail level passed to the profiles when dumping.
    pub debug: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            interval: DEFAULT_INTERVAL,
            debug: DEFAULT_DEBUG,
        }
    }
}

impl MonitorConfig {
    pub fn with_workdir(mut self, workdir: impl AsRef<Path>) -> Self {
        self.workdir = workdir.as_ref().to_path_buf();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_debug(mut self, debug: u8) -> Self {
        self.debug = debug;
        self
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.workdir.join(SENTINEL_FILE)
    }

    pub fn artifact_path(&self, kind: ProfileKind) -> PathBuf {
        self.workdir.join(kind.artifact())
    }
}
