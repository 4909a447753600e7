use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Where pending commands come from.
///
/// A source holds at most one pending command. `take` hands it out and
/// clears the store before returning, so a command is delivered once even if
/// its dispatch later fails.
pub trait CommandSource: Send {
    fn take(&mut self) -> Option<String>;
}

/// Sentinel file written by an operator and emptied by the monitor.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandSource for FileSource {
    fn take(&mut self) -> Option<String> {
        let input = match fs::read(&self.path) {
            Ok(input) => input,
            Err(err) => {
                log::trace!("no command in {}: {}", self.path.display(), err);
                return None;
            }
        };
        if input.is_empty() {
            return None;
        }
        if let Err(err) = fs::write(&self.path, b"") {
            log::warn!("couldn't clear {}: {}", self.path.display(), err);
        }
        Some(String::from_utf8_lossy(&input).into_owned())
    }
}

/// In-memory command store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `cmd`, replacing any command not yet taken.
    pub fn put(&self, cmd: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(cmd.into());
    }

    pub fn pending(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandSource for MemorySource {
    fn take(&mut self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .filter(|cmd| !cmd.is_empty())
    }
}
