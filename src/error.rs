use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("couldn't create {}: {source}", .path.display())]
    CreateArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("couldn't write {profile} profile to {}: {source}", .path.display())]
    WriteArtifact {
        profile: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("profile not registered: {0}")]
    ProfileNotFound(String),

    #[error("invalid monitor flags: {0}")]
    InvalidFlags(String),

    #[error("couldn't spawn monitor thread: {0}")]
    Spawn(#[source] io::Error),
}
