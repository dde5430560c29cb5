use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use subsnap_core::{CoreError, SnapshotDocument, SnapshotError};
use tracing::{debug, info};

pub const DOWNLOAD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_download_time(now: DateTime<Utc>) -> String {
    now.format(DOWNLOAD_TIME_FORMAT).to_string()
}

/// Four-space indented JSON; non-ASCII text is written as-is.
pub fn render(document: &SnapshotDocument) -> Result<Vec<u8>, CoreError> {
    let mut buffer = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    document.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Where collected posts go when a run is cut short.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Replace `path` with the rendered document. The bytes go to a hidden
/// sibling first, are synced, then renamed over the target.
pub fn write_snapshot(document: &SnapshotDocument, path: &Path) -> Result<(), SnapshotError> {
    let write_error = |source: CoreError| SnapshotError::Write {
        path: path.display().to_string(),
        source,
    };

    let bytes = render(document).map_err(write_error)?;
    let temp = temp_sibling(path).ok_or_else(|| {
        write_error(CoreError::InvalidInput {
            message: format!("{} does not name a file", path.display()),
        })
    })?;

    debug!("Writing {} bytes to {}", bytes.len(), temp.display());
    if let Err(e) = write_synced(&temp, &bytes).and_then(|_| fs::rename(&temp, path)) {
        let _ = fs::remove_file(&temp);
        return Err(write_error(CoreError::Io(e)));
    }

    info!("Data saved to {}", path.display());
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_sibling(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let mut temp_name = OsString::from(".");
    temp_name.push(name);
    temp_name.push(".tmp");
    Some(path.with_file_name(temp_name))
}
