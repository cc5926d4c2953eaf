//! Schema snapshot output.
//!
//! After a build the raw schema is written twice into the snapshot
//! directory: `schema.json` as structured data, and `schema.yml` as an
//! editable rendering that [`SnapshotSource`](crate::SnapshotSource) can load
//! as the input of later builds without querying the live database.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dal_doc_core::RawSchema;
use tracing::debug;

use crate::error::Result;

/// File name of the JSON snapshot.
pub const SNAPSHOT_JSON: &str = "schema.json";
/// File name of the YAML snapshot.
pub const SNAPSHOT_YAML: &str = "schema.yml";

/// Paths of the files written by [`write_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFiles {
    pub json: PathBuf,
    pub yaml: PathBuf,
}

/// Writes `schema.json` and `schema.yml` into `dir`, replacing earlier ones.
///
/// The directory is created if needed.
///
/// # Errors
///
/// Returns [`IoError`](crate::DatabaseError::IoError) when an old snapshot
/// cannot be removed or a new one cannot be written.
pub fn write_snapshot(raw: &RawSchema, dir: impl AsRef<Path>) -> Result<SnapshotFiles> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let files = SnapshotFiles {
        json: dir.join(SNAPSHOT_JSON),
        yaml: dir.join(SNAPSHOT_YAML),
    };
    remove_if_exists(&files.json)?;
    remove_if_exists(&files.yaml)?;

    let mut writer = BufWriter::new(fs::File::create(&files.json)?);
    serde_json::to_writer_pretty(&mut writer, raw)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let mut writer = BufWriter::new(fs::File::create(&files.yaml)?);
    serde_yaml::to_writer(&mut writer, raw)?;
    writer.flush()?;

    debug!(tables = raw.len(), dir = %dir.display(), "Wrote schema snapshot");
    Ok(files)
}

/// Removes a file, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
