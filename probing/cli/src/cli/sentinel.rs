use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use probing_monitor::{trim_command, MonitorConfig, ProfileKind};

const POLL_STEP: Duration = Duration::from_millis(100);

/// Operator side of the sentinel protocol for one working directory.
#[derive(Debug, Clone)]
pub struct Sentinel {
    config: MonitorConfig,
}

impl Sentinel {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            config: MonitorConfig::default().with_workdir(dir),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.config.sentinel_path()
    }

    pub fn artifact_path(&self, kind: ProfileKind) -> PathBuf {
        self.config.artifact_path(kind)
    }

    /// Writes `cmd`, replacing any command the monitor has not picked up.
    pub fn send(&self, cmd: &str) -> Result<()> {
        let path = self.path();
        if let Some(previous) = self.pending() {
            log::warn!("overwriting pending command '{}'", previous);
        }
        fs::write(&path, cmd).with_context(|| format!("couldn't write {}", path.display()))?;
        log::debug!("sent '{}' to {}", cmd, path.display());
        Ok(())
    }

    /// Trimmed pending command, if any.
    pub fn pending(&self) -> Option<String> {
        let content = fs::read(self.path()).ok()?;
        let content = String::from_utf8_lossy(&content);
        let cmd = trim_command(&content);
        (!cmd.is_empty()).then(|| cmd.to_string())
    }

    pub fn clear(&self) -> Result<bool> {
        let pending = self.pending().is_some();
        if self.path().exists() {
            fs::write(self.path(), b"")
                .with_context(|| format!("couldn't clear {}", self.path().display()))?;
        }
        Ok(pending)
    }

    /// Waits until the monitor has emptied the sentinel.
    pub fn wait_consumed(&self, timeout: Duration) -> bool {
        wait_until(timeout, || self.pending().is_none())
    }

    pub fn artifact(&self, kind: ProfileKind) -> Option<Metadata> {
        fs::metadata(self.artifact_path(kind)).ok()
    }

    /// Sends the lookup command for `kind` and waits until its artifact has
    /// been rewritten.
    pub fn lookup(&self, kind: ProfileKind, timeout: Duration) -> Result<PathBuf> {
        let before = self.artifact(kind).and_then(|m| m.modified().ok());
        self.send(kind.command())?;

        let started = Instant::now();
        if !self.wait_consumed(timeout) {
            anyhow::bail!(
                "command '{}' not consumed after {:?}, is the monitor running in {}?",
                kind.command(),
                timeout,
                self.config.workdir.display()
            );
        }
        let remaining = timeout.saturating_sub(started.elapsed());
        let rewritten = wait_until(remaining, || {
            self.artifact(kind)
                .is_some_and(|m| m.len() > 0 && is_newer(m.modified().ok(), before))
        });
        let path = self.artifact_path(kind);
        if !rewritten {
            anyhow::bail!("{} was not written after {:?}", path.display(), timeout);
        }
        settle(&path, timeout.saturating_sub(started.elapsed()));
        Ok(path)
    }
}

// the monitor may still be writing: wait for the size to stop changing
fn settle(path: &Path, timeout: Duration) {
    let size = || fs::metadata(path).map(|m| m.len()).ok();
    let deadline = deadline_after(timeout);
    let mut last = size();
    while !is_past(deadline) {
        thread::sleep(POLL_STEP);
        let current = size();
        if current == last {
            return;
        }
        last = current;
    }
}

fn is_newer(modified: Option<SystemTime>, before: Option<SystemTime>) -> bool {
    match (modified, before) {
        (_, None) => true,
        (Some(modified), Some(before)) => modified > before,
        (None, Some(_)) => false,
    }
}

// None when the timeout is too large to be a point in time: wait forever
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn is_past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = deadline_after(timeout);
    loop {
        if cond() {
            return true;
        }
        if is_past(deadline) {
            return false;
        }
        thread::sleep(POLL_STEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probing_monitor::{Monitor, SENTINEL_FILE};

    #[test]
    fn test_send_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = Sentinel::new(dir.path());
        assert_eq!(sentinel.pending(), None);
        assert!(!sentinel.clear().unwrap());

        sentinel.send("restart-server").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(SENTINEL_FILE)).unwrap(),
            "restart-server"
        );
        assert_eq!(sentinel.pending().as_deref(), Some("restart-server"));
        assert!(sentinel.clear().unwrap());
        assert_eq!(sentinel.pending(), None);
    }

    #[test]
    fn test_padding_is_not_pending() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = Sentinel::new(dir.path());
        sentinel.send(" \n").unwrap();
        assert_eq!(sentinel.pending(), None);
        assert!(sentinel.wait_consumed(Duration::ZERO));
    }

    #[test]
    fn test_huge_wait_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = Sentinel::new(dir.path());
        assert!(sentinel.wait_consumed(Duration::from_secs(u64::MAX)));
        assert!(deadline_after(Duration::from_secs(u64::MAX)).is_none());
        assert!(!is_past(None));

        let artifact = dir.path().join("unittest.heap");
        fs::write(&artifact, "heap profile").unwrap();
        settle(&artifact, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_lookup_without_monitor_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = Sentinel::new(dir.path());
        let err = sentinel
            .lookup(ProfileKind::Heap, Duration::from_millis(200))
            .unwrap_err();
        assert!(err.to_string().contains("not consumed"));
    }

    #[test]
    fn test_lookup_against_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::default()
            .with_workdir(dir.path())
            .with_interval(Duration::from_millis(20));
        let handle = Monitor::from_config(config).spawn().unwrap();

        let sentinel = Sentinel::new(dir.path());
        let path = sentinel
            .lookup(ProfileKind::Goroutine, Duration::from_secs(10))
            .unwrap();
        assert_eq!(path, dir.path().join("unittest.goroutine"));
        assert!(fs::read_to_string(path).unwrap().contains("goroutine profile"));
        handle.stop();
    }

    #[test]
    fn test_is_newer() {
        let now = SystemTime::now();
        assert!(is_newer(Some(now), None));
        assert!(is_newer(None, None));
        assert!(!is_newer(Some(now), Some(now)));
        assert!(is_newer(Some(now + Duration::from_secs(1)), Some(now)));
    }
}
