//! Flat artifact storage.
//!
//! Finished artifacts live directly in one directory keyed by name. Engines
//! write to `<name>.<task id>.part` and rename into place when the transfer
//! completes.

mod names;
mod writer;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::TdmError;
use crate::task::TaskId;

pub use names::{NameReservations, ReservedName};
pub use writer::StorageWriter;

/// Suffix of in-progress files.
pub const TEMP_SUFFIX: &str = ".part";

/// File name of task `task_id`'s in-progress copy of `name`.
pub fn temp_name(name: &str, task_id: TaskId) -> String {
    format!("{}.{}{}", name, task_id, TEMP_SUFFIX)
}

/// Path for the temp file next to `final_path`. Carries the task id so two
/// transfers never share one.
pub fn temp_path(final_path: &Path, task_id: TaskId) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(format!(".{}{}", task_id, TEMP_SUFFIX));
    PathBuf::from(o)
}

/// Atomically rename a finished temp file to its final path.
pub fn finalize(temp_path: &Path, final_path: &Path) -> anyhow::Result<()> {
    fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            final_path.display()
        )
    })
}

/// One stored file as seen by the retention sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// An artifact opened for retrieval.
#[derive(Debug)]
pub struct Artifact {
    pub name: String,
    pub size: u64,
    pub file: tokio::fs::File,
}

/// Handle on the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens `root`, creating it if needed. Failure here is fatal for the process.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create artifact directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists regular files directly under the root.
    pub fn entries(&self) -> Result<Vec<ArtifactEntry>, TdmError> {
        let dir = fs::read_dir(&self.root)
            .map_err(|e| TdmError::storage(self.root.display().to_string(), e))?;
        let mut out = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("artifact directory entry unreadable: {}", e);
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let meta = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(%name, "stat failed: {}", e);
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push(ArtifactEntry {
                name,
                size: meta.len(),
                modified,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Deletes artifact `name`. A file that is already gone counts as deleted.
    pub fn remove(&self, name: &str) -> Result<(), TdmError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TdmError::storage(name, e)),
        }
    }

    /// Opens a finished artifact for streaming. Unknown names, path tricks and
    /// in-progress `.part` files all resolve to `NotFound`.
    pub async fn open_artifact(&self, name: &str) -> Result<Artifact, TdmError> {
        if name.ends_with(TEMP_SUFFIX) {
            return Err(TdmError::NotFound(format!("file {}", name)));
        }
        let path = self.path_for(name)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(TdmError::NotFound(format!("file {}", name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TdmError::NotFound(format!("file {}", name)))
            }
            Err(e) => return Err(TdmError::storage(name, e)),
        };
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| TdmError::storage(name, e))?;
        Ok(Artifact {
            name: name.to_string(),
            size: meta.len(),
            file,
        })
    }

    /// Joins `name` onto the root, refusing anything but a single plain component.
    fn path_for(&self, name: &str) -> Result<PathBuf, TdmError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
        if !plain {
            return Err(TdmError::NotFound(format!("file {}", name)));
        }
        Ok(self.root.join(name))
    }
}
