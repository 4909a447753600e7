use std::env;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;

use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// Environment variable holding the monitor flags, space separated.
pub const ENV_MONITOR_ARGS: &str = "PROBING_MONITOR_ARGS";

/// flags for the probing monitor
#[derive(FromArgs, Default, Debug, PartialEq)]
pub struct MonitorFlags {
    /// directory holding the sentinel and the profile dumps, default: working directory
    #[argh(option, short = 'd')]
    pub dir: Option<PathBuf>,

    /// milliseconds between two polls of the sentinel, default: 2000
    #[argh(option, short = 'i')]
    pub interval_ms: Option<u64>,

    /// detail level of profile dumps, 0 to 2, default: 2
    #[argh(option)]
    pub debug: Option<u8>,

    /// do not start the monitor when the library is loaded
    #[argh(switch)]
    pub disable: bool,
}

impl MonitorFlags {
    pub fn parse(argstr: &str) -> Result<Self, MonitorError> {
        let args: Vec<&str> = argstr.split_whitespace().collect();
        let flags = MonitorFlags::from_args(&["probing-monitor"], &args)
            .map_err(|exit| MonitorError::InvalidFlags(exit.output.trim().to_string()))?;
        if flags.interval_ms == Some(0) {
            return Err(MonitorError::InvalidFlags(
                "interval must be positive".to_string(),
            ));
        }
        if flags.debug.is_some_and(|d| d > probing_pprof::DEBUG_SYMBOLIZED) {
            return Err(MonitorError::InvalidFlags(format!(
                "debug level must be at most {}",
                probing_pprof::DEBUG_SYMBOLIZED
            )));
        }
        Ok(flags)
    }

    /// Reads [`ENV_MONITOR_ARGS`]; malformed flags are reported and ignored.
    pub fn from_env() -> Self {
        match env::var(ENV_MONITOR_ARGS) {
            Ok(argstr) => Self::parse(&argstr).unwrap_or_else(|err| {
                eprintln!("probing-monitor: {}, using defaults", err);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn to_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        if let Some(dir) = &self.dir {
            config = config.with_workdir(dir);
        }
        if let Some(ms) = self.interval_ms {
            config = config.with_interval(Duration::from_millis(ms));
        }
        if let Some(debug) = self.debug {
            config = config.with_debug(debug);
        }
        config
    }
}
