//! Out-of-band debug commands for a running process.
//!
//! A background monitor polls `unittest.cmd` in the working directory. When
//! an operator writes a command there, the monitor empties the file and acts
//! on it:
//!
//! * `lookup goroutine` dumps the live threads to `unittest.goroutine`
//! * `lookup heap` dumps allocation and memory figures to `unittest.heap`
//! * `lookup threadcreate` dumps thread creation stacks to `unittest.thread`
//!
//! Anything else goes to the handler installed with
//! [`set_command_handler`], or is reported as unknown on stderr.

#[cfg(feature = "auto-start")]
#[allow(unused_imports)]
#[macro_use]
extern crate ctor;

mod command;
mod config;
mod error;
mod flags;
mod handlers;
mod monitor;
mod source;

pub use crate::command::{trim_command, Command, ProfileKind};
pub use crate::config::{MonitorConfig, DEFAULT_INTERVAL, SENTINEL_FILE};
pub use crate::error::MonitorError;
pub use crate::flags::{MonitorFlags, ENV_MONITOR_ARGS};
pub use crate::handlers::{
    clear_command_handler, command_handler, dump_profile, set_command_handler, CommandHandler,
    GlobalHandler,
};
pub use crate::monitor::{Monitor, MonitorHandle, Outcome, MONITOR_THREAD_NAME};
pub use crate::source::{CommandSource, FileSource, MemorySource};

use once_cell::sync::OnceCell;

pub const ENV_PROBING_LOGLEVEL: &str = "PROBING_LOGLEVEL";

static MONITOR: OnceCell<MonitorHandle> = OnceCell::new();

/// Starts the process-wide monitor, which consults the handler installed
/// with [`set_command_handler`] on every command. Later calls are no-ops,
/// the first configuration wins. The monitor runs until the process exits.
pub fn start(config: MonitorConfig) -> Result<(), MonitorError> {
    MONITOR
        .get_or_try_init(|| {
            log::debug!("starting process-wide monitor in {}", config.workdir.display());
            Monitor::from_config(config)
                .with_handler(GlobalHandler)
                .spawn()
        })
        .map(|_| ())
}

pub fn is_started() -> bool {
    MONITOR.get().is_some_and(|m| m.is_running())
}

/// Configuration of the process-wide monitor, once it has been started.
pub fn started_config() -> Option<&'static MonitorConfig> {
    MONITOR.get().map(|m| m.config())
}

#[cfg(feature = "auto-start")]
#[ctor]
fn init() {
    use std::env;

    if env::var_os(ENV_PROBING_LOGLEVEL).is_some() {
        let _ = env_logger::Builder::from_env(env_logger::Env::new().filter(ENV_PROBING_LOGLEVEL))
            .try_init();
    }
    let flags = MonitorFlags::from_env();
    if flags.disable {
        return;
    }
    if let Err(err) = start(flags.to_config()) {
        eprintln!("probing-monitor: {}", err);
    }
}
