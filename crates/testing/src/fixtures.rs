//! On-disk migration fixtures

use std::fs;
use std::path::{Path, PathBuf};
use strata_migrate::{MigrationConfig, MigrationResult, MigrationRunner};
use tempfile::TempDir;

/// A temporary directory holding a `migrations` directory
///
/// Everything is deleted when the fixture is dropped.
#[derive(Debug)]
pub struct MigrationFixture {
    root: TempDir,
    migrations_dir: PathBuf,
}

impl MigrationFixture {
    /// Fixture with an empty, existing migrations directory
    pub fn new() -> std::io::Result<Self> {
        let fixture = Self::uninitialized()?;
        fs::create_dir_all(&fixture.migrations_dir)?;
        Ok(fixture)
    }

    /// Fixture whose migrations directory does not exist yet
    pub fn uninitialized() -> std::io::Result<Self> {
        let root = TempDir::new()?;
        let migrations_dir = root.path().join("migrations");
        Ok(Self { root, migrations_dir })
    }

    /// The temporary root directory
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// The migrations directory
    pub fn path(&self) -> &Path {
        &self.migrations_dir
    }

    /// Write a migration file, replacing any existing one
    pub fn write(&self, file_name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.migrations_dir.join(file_name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Delete a migration file
    pub fn remove(&self, file_name: &str) -> std::io::Result<()> {
        fs::remove_file(self.migrations_dir.join(file_name))
    }

    /// File names currently in the migrations directory, sorted
    pub fn file_names(&self) -> std::io::Result<Vec<String>> {
        let mut names = fs::read_dir(&self.migrations_dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    /// Migration config pointing at this fixture
    pub fn config(&self) -> MigrationConfig {
        MigrationConfig::new(&self.migrations_dir)
    }

    /// Runner reading from this fixture
    pub fn runner(&self) -> MigrationResult<MigrationRunner> {
        MigrationRunner::new(self.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_remove() {
        let fixture = MigrationFixture::new().unwrap();
        fixture.write("b.sql", "").unwrap();
        fixture.write("a.sql", "").unwrap();
        assert_eq!(fixture.file_names().unwrap(), vec!["a.sql", "b.sql"]);

        fixture.remove("a.sql").unwrap();
        assert_eq!(fixture.file_names().unwrap(), vec!["b.sql"]);
    }

    #[test]
    fn test_uninitialized_has_no_directory() {
        let fixture = MigrationFixture::uninitialized().unwrap();
        assert!(!fixture.path().exists());
        assert!(fixture.root().exists());
    }
}
