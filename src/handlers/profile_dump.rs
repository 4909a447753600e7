use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::command::ProfileKind;
use crate::error::MonitorError;

/// Writes the named profile to `path`, truncating any previous dump.
pub fn dump_profile(kind: ProfileKind, path: &Path, debug: u8) -> Result<(), MonitorError> {
    let profile = probing_pprof::lookup(kind.profile_name())
        .ok_or_else(|| MonitorError::ProfileNotFound(kind.profile_name().to_string()))?;

    let file = File::create(path).map_err(|source| MonitorError::CreateArtifact {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    profile
        .write_to(&mut writer, debug)
        .and_then(|_| writer.flush())
        .map_err(|source| MonitorError::WriteArtifact {
            profile: kind.profile_name().to_string(),
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!("{} profile written to {}", kind, path.display());
    Ok(())
}
