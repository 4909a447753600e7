use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::command::{Command, ProfileKind};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::handlers::{dump_profile, CommandHandler};
use crate::source::{CommandSource, FileSource};

pub const MONITOR_THREAD_NAME: &str = "probing-monitor";

/// Result of one poll cycle.
#[derive(Debug)]
pub enum Outcome {
    /// No command was pending.
    Idle,
    Dumped {
        kind: ProfileKind,
        path: PathBuf,
    },
    DumpFailed {
        kind: ProfileKind,
        error: MonitorError,
    },
    Handled(String),
    /// Not a built-in command, and no handler accepted it.
    Unknown(String),
    HandlerPanicked(String),
}

impl Outcome {
    /// Prints the operator diagnostics for this outcome to stderr.
    pub fn report(&self) {
        if let Err(err) = self.report_to(&mut io::stderr()) {
            log::warn!("couldn't print diagnostics: {}", err);
        }
    }

    /// Logs the outcome and writes its operator diagnostics, if any, to `w`.
    pub fn report_to(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Outcome::Idle => {}
            Outcome::Dumped { kind, path } => {
                log::info!("{} profile dumped to {}", kind, path.display());
            }
            Outcome::DumpFailed { kind, error } => {
                log::error!("{} profile dump failed: {}", kind, error);
                writeln!(w, "{}", error)?;
            }
            Outcome::Handled(cmd) => {
                log::info!("command handled: '{}'", cmd);
            }
            Outcome::Unknown(cmd) => {
                log::warn!("unknown command: '{}'", cmd);
                writeln!(w, "unknown command: '{}'", cmd)?;
            }
            Outcome::HandlerPanicked(cmd) => {
                log::error!("command handler panicked on '{}'", cmd);
                writeln!(w, "unknown command: '{}'", cmd)?;
            }
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Outcome::Idle)
    }
}

/// Polls a [`CommandSource`] and dispatches what it finds.
pub struct Monitor<S = FileSource> {
    config: MonitorConfig,
    source: S,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl Monitor<FileSource> {
    /// Monitor reading the sentinel file under `config.workdir`.
    pub fn from_config(config: MonitorConfig) -> Self {
        let source = FileSource::new(config.sentinel_path());
        Self::new(config, source)
    }
}

impl<S: CommandSource> Monitor<S> {
    pub fn new(config: MonitorConfig, source: S) -> Self {
        Self {
            config,
            source,
            handler: None,
        }
    }

    pub fn with_handler<H>(self, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        self.with_shared_handler(Arc::new(handler))
    }

    pub fn with_shared_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Runs one cycle: take the pending command (clearing the store) and
    /// dispatch it. Never blocks for the poll interval.
    pub fn poll_once(&mut self) -> Outcome {
        let Some(input) = self.source.take() else {
            return Outcome::Idle;
        };
        match Command::parse(&input) {
            Some(cmd) => self.dispatch(cmd),
            None => Outcome::Idle,
        }
    }

    pub fn dispatch(&self, cmd: Command) -> Outcome {
        log::debug!("dispatching command '{}'", cmd.as_str());
        match cmd {
            Command::Lookup(kind) => {
                let path = self.config.artifact_path(kind);
                match dump_profile(kind, &path, self.config.debug) {
                    Ok(()) => Outcome::Dumped { kind, path },
                    Err(error) => Outcome::DumpFailed { kind, error },
                }
            }
            Command::Other(cmd) => self.delegate(cmd),
        }
    }

    fn delegate(&self, cmd: String) -> Outcome {
        let Some(handler) = &self.handler else {
            return Outcome::Unknown(cmd);
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&cmd))) {
            Ok(true) => Outcome::Handled(cmd),
            Ok(false) => Outcome::Unknown(cmd),
            Err(_) => Outcome::HandlerPanicked(cmd),
        }
    }

    /// Polls until `stop` fires or its sender is dropped. The wait between
    /// cycles ends as soon as either happens.
    pub fn run(mut self, stop: Receiver<()>) {
        log::debug!(
            "monitor started, polling every {:?} in {}",
            self.config.interval,
            self.config.workdir.display()
        );
        loop {
            self.poll_once().report();
            match stop.recv_timeout(self.config.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("monitor stopped");
    }
}

impl<S: CommandSource + 'static> Monitor<S> {
    /// Runs the poll loop on a background thread.
    pub fn spawn(self) -> Result<MonitorHandle, MonitorError> {
        let config = self.config.clone();
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = probing_pprof::thread::Builder::new()
            .name(MONITOR_THREAD_NAME)
            .spawn(move || self.run(stop_rx))
            .map_err(MonitorError::Spawn)?;
        Ok(MonitorHandle {
            config,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owner of a running poll loop. Dropping the handle stops the loop.
#[derive(Debug)]
pub struct MonitorHandle {
    config: MonitorConfig,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Configuration the loop was spawned with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the loop and waits for the cycle in progress to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn memory_monitor(dir: &std::path::Path) -> (MemorySource, Monitor<MemorySource>) {
        let source = MemorySource::new();
        let config = MonitorConfig::default().with_workdir(dir);
        (source.clone(), Monitor::new(config, source))
    }

    #[test]
    fn test_idle_when_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut monitor) = memory_monitor(dir.path());
        assert!(monitor.poll_once().is_idle());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_padding_only_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (source, mut monitor) = memory_monitor(dir.path());
        source.put(" \r\n\t");
        assert!(monitor.poll_once().is_idle());
        assert_eq!(source.pending(), None);
    }

    #[test]
    fn test_lookup_dumps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (source, mut monitor) = memory_monitor(dir.path());
        source.put("lookup threadcreate\n");
        match monitor.poll_once() {
            Outcome::Dumped { kind, path } => {
                assert_eq!(kind, ProfileKind::ThreadCreate);
                assert_eq!(path, dir.path().join("unittest.thread"));
                let text = std::fs::read_to_string(path).unwrap();
                assert!(text.starts_with("threadcreate profile: total "));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_unknown_without_handler() {
        let dir = tempfile::tempdir().unwrap();
        let (source, mut monitor) = memory_monitor(dir.path());
        source.put("  restart-server\n");
        match monitor.poll_once() {
            Outcome::Unknown(cmd) => assert_eq!(cmd, "restart-server"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_handler_accepts_and_declines() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (source, monitor) = memory_monitor(dir.path());
        let mut monitor = monitor.with_handler(move |cmd: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            cmd == "restart-server"
        });

        source.put("restart-server");
        assert!(matches!(
            monitor.poll_once(),
            Outcome::Handled(cmd) if cmd == "restart-server"
        ));
        source.put("reload");
        assert!(matches!(monitor.poll_once(), Outcome::Unknown(cmd) if cmd == "reload"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_never_sees_builtin_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (source, monitor) = memory_monitor(dir.path());
        let mut monitor =
            monitor.with_handler(|_: &str| -> bool { panic!("builtin command delegated") });
        source.put("lookup heap");
        assert!(matches!(monitor.poll_once(), Outcome::Dumped { .. }));
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let (source, monitor) = memory_monitor(dir.path());
        let mut monitor = monitor.with_handler(|_: &str| -> bool { panic!("boom") });
        source.put("explode");
        assert!(matches!(
            monitor.poll_once(),
            Outcome::HandlerPanicked(cmd) if cmd == "explode"
        ));
        source.put("lookup goroutine");
        assert!(matches!(monitor.poll_once(), Outcome::Dumped { .. }));
    }

    #[test]
    fn test_dump_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new();
        let config = MonitorConfig::default().with_workdir(dir.path().join("gone"));
        let mut monitor = Monitor::new(config, source.clone());
        source.put("lookup heap");
        match monitor.poll_once() {
            Outcome::DumpFailed { kind, error } => {
                assert_eq!(kind, ProfileKind::Heap);
                assert!(error.to_string().contains("unittest.heap"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        source.put("lookup heap");
        assert!(matches!(monitor.poll_once(), Outcome::DumpFailed { .. }));
    }

    #[test]
    fn test_spawned_loop_stops_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::default()
            .with_workdir(dir.path())
            .with_interval(Duration::from_secs(3600));
        let handle = Monitor::from_config(config.clone()).spawn().unwrap();
        assert!(handle.is_running());
        assert_eq!(handle.config(), &config);
        let started = std::time::Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    fn diagnostics(outcome: &Outcome) -> String {
        let mut out = Vec::new();
        outcome.report_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_unknown_and_panicked() {
        assert_eq!(
            diagnostics(&Outcome::Unknown("flush-caches".to_string())),
            "unknown command: 'flush-caches'\n"
        );
        assert_eq!(
            diagnostics(&Outcome::HandlerPanicked("explode".to_string())),
            "unknown command: 'explode'\n"
        );
    }

    #[test]
    fn test_report_dump_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (source, mut monitor) = memory_monitor(&dir.path().join("gone"));
        source.put("lookup goroutine");
        let outcome = monitor.poll_once();
        assert!(matches!(outcome, Outcome::DumpFailed { .. }));
        let text = diagnostics(&outcome);
        assert!(text.starts_with("couldn't create "), "{}", text);
        assert!(text.contains("unittest.goroutine"));
    }

    #[test]
    fn test_report_is_silent_on_success() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(diagnostics(&Outcome::Idle), "");
        assert_eq!(diagnostics(&Outcome::Handled("restart-server".to_string())), "");

        let (source, monitor) = memory_monitor(dir.path());
        let mut monitor = monitor.with_handler(|cmd: &str| cmd == "restart-server");
        source.put("restart-server");
        assert_eq!(diagnostics(&monitor.poll_once()), "");
        source.put("lookup heap");
        assert_eq!(diagnostics(&monitor.poll_once()), "");
    }
}
