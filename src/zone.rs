//! Landing and archive zones: listing source files and moving them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{LoaderError, LoaderResult};

/// A file found in the landing zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
}

impl SourceFile {
    /// The path as the string used for naming, format detection and provenance.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Directory listing and file moves.
pub trait FileStore: Send + Sync {
    /// Every file currently under `root`. Failure aborts the invocation.
    fn list(&self, root: &Path) -> LoaderResult<Vec<SourceFile>>;

    /// Relocate one file, creating the destination's parent directories.
    fn move_file(&self, from: &Path, to: &Path) -> LoaderResult<()>;
}

/// [`FileStore`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore {
    recursive: bool,
}

impl LocalFileStore {
    /// With `recursive == false` only the files directly under the root are listed.
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }
}

impl FileStore for LocalFileStore {
    fn list(&self, root: &Path) -> LoaderResult<Vec<SourceFile>> {
        let unavailable = |message: String| LoaderError::LandingZoneUnavailable {
            path: root.display().to_string(),
            message,
        };
        if !root.is_dir() {
            return Err(unavailable("not a directory".to_string()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| unavailable(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(SourceFile {
                path: entry.into_path(),
                size,
            });
        }
        Ok(files)
    }

    fn move_file(&self, from: &Path, to: &Path) -> LoaderResult<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                fs::copy(from, to)?;
                fs::remove_file(from)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The archive location of `path`: the same path relative to `landing_root`, under
/// `archive_root`.
pub fn archive_path(landing_root: &Path, archive_root: &Path, path: &Path) -> LoaderResult<PathBuf> {
    let relative = path
        .strip_prefix(landing_root)
        .map_err(|_| LoaderError::ArchivePath {
            path: path.display().to_string(),
            message: format!("not under landing zone {}", landing_root.display()),
        })?;
    if relative.as_os_str().is_empty() {
        return Err(LoaderError::ArchivePath {
            path: path.display().to_string(),
            message: "path is the landing zone root".to_string(),
        });
    }
    Ok(archive_root.join(relative))
}
