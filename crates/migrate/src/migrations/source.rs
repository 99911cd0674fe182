//! Migration Source - discovering and reading migration files
//!
//! File access goes through [`MigrationFileSystem`] so the engine can run
//! against the real filesystem or an in-memory one.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::definitions::{FileMigration, MigrationDirection};
use super::parser::extract_body;
use crate::error::{MigrationError, MigrationResult};

/// Read-only filesystem capability used by the engine
pub trait MigrationFileSystem: Send + Sync {
    /// Names of the entries directly inside `dir`
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Full text of the file at `path`
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// The operating system filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl MigrationFileSystem for OsFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    denied: BTreeSet<PathBuf>,
}

/// In-memory filesystem, cloned handles share the same contents
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty directory
    pub fn add_dir(&self, dir: impl Into<PathBuf>) {
        self.write_state().dirs.insert(dir.into());
    }

    /// Add or replace a file; its parent directory is registered too
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        let mut state = self.write_state();
        if let Some(parent) = path.parent() {
            state.dirs.insert(parent.to_path_buf());
        }
        state.files.insert(path, content.into());
    }

    /// Builder-style variant of [`MemoryFileSystem::add_file`]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Remove a file, keeping its directory
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.write_state().files.remove(path.as_ref());
    }

    /// Make reads of `path` fail with `PermissionDenied`
    pub fn deny(&self, path: impl Into<PathBuf>) {
        self.write_state().denied.insert(path.into());
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MigrationFileSystem for MemoryFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let state = self.read_state();
        if state.denied.contains(dir) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        if !state.dirs.contains(dir) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        let files = state.files.keys();
        let subdirs = state.dirs.iter();
        Ok(files
            .chain(subdirs)
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.read_state();
        if state.denied.contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// List the migrations in `dir`, sorted ascending by name
///
/// Every entry of the directory counts as a migration; contents are not read.
pub fn list_up_migrations(fs: &dyn MigrationFileSystem, dir: &Path) -> MigrationResult<Vec<FileMigration>> {
    let entries = fs.read_dir(dir).map_err(|source| MigrationError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut migrations: Vec<FileMigration> = entries.into_iter().map(FileMigration::from_file_name).collect();
    migrations.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(dir = %dir.display(), count = migrations.len(), "Discovered migration files");
    Ok(migrations)
}

/// Read a migration file and extract the body for `direction`
///
/// A file that does not exist yields an empty body.
pub fn load_body(
    fs: &dyn MigrationFileSystem,
    dir: &Path,
    migration: &FileMigration,
    direction: MigrationDirection,
) -> MigrationResult<String> {
    let path = dir.join(&migration.file_name);

    match fs.read_to_string(&path) {
        Ok(text) => Ok(extract_body(&text, direction)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Migration file not found, using empty body");
            Ok(String::new())
        }
        Err(source) => Err(MigrationError::Io { path, source }),
    }
}
