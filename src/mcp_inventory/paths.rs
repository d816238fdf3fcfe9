//! Location of the inventory file and its sibling backup.
//!
//! The live file sits in the platform's application-config directory
//! (`~/.config/mcp-inventory` on Linux, `~/Library/Application Support` on
//! macOS, `%APPDATA%` on Windows) unless the caller pins an explicit path
//! with [`InventoryPaths::at`].

use crate::error::{InventoryError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the inventory inside the config directory.
pub const INVENTORY_FILE_NAME: &str = "mcp-inventory.json";

const BACKUP_SUFFIX: &str = ".backup";
const TEMP_SUFFIX: &str = ".tmp";

/// Resolved locations for the live inventory file and its siblings.
#[derive(Debug, Clone)]
pub struct InventoryPaths {
    file: PathBuf,
}

impl InventoryPaths {
    /// Resolve the platform config directory, creating it if needed.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "mcp-inventory", "mcp-inventory").ok_or_else(|| {
            InventoryError::Store("could not determine config directory".to_string())
        })?;
        let dir = dirs.config_dir();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            debug!(dir = %dir.display(), "created config directory");
        }
        let file = dir.join(INVENTORY_FILE_NAME);
        info!(file = %file.display(), "inventory file location");
        Ok(Self { file })
    }

    /// Use an explicit inventory file path. The parent directory must exist.
    pub fn at(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn backup_file(&self) -> PathBuf {
        sibling(&self.file, BACKUP_SUFFIX)
    }

    pub fn temp_file(&self) -> PathBuf {
        sibling(&self.file, TEMP_SUFFIX)
    }

    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    /// Copy the live file to its `.backup` sibling. A missing live file is
    /// not an error; there is simply nothing to back up.
    pub fn create_backup(&self) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        let data = fs::read(&self.file)?;
        let backup = self.backup_file();
        fs::write(&backup, data)?;
        debug!(backup = %backup.display(), "created backup of inventory file");
        Ok(())
    }

    /// Overwrite the live file with the `.backup` sibling's content.
    pub fn restore_backup(&self) -> Result<()> {
        let backup = self.backup_file();
        if !backup.exists() {
            return Err(InventoryError::Store(format!(
                "backup file does not exist: {}",
                backup.display()
            )));
        }
        let data = fs::read(&backup)?;
        fs::write(&self.file, data)?;
        info!(backup = %backup.display(), "restored inventory file from backup");
        Ok(())
    }
}

/// `<file>.suffix` next to the live file; suffixes append to the full file
/// name rather than replacing the extension.
fn sibling(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, InventoryPaths) {
        let dir = TempDir::new().unwrap();
        let paths = InventoryPaths::at(dir.path().join(INVENTORY_FILE_NAME));
        (dir, paths)
    }

    #[test]
    fn test_sibling_names() {
        let paths = InventoryPaths::at("/data/mcp-inventory.json");
        assert_eq!(
            paths.backup_file(),
            PathBuf::from("/data/mcp-inventory.json.backup")
        );
        assert_eq!(
            paths.temp_file(),
            PathBuf::from("/data/mcp-inventory.json.tmp")
        );
    }

    #[test]
    fn test_backup_of_missing_file_is_a_noop() {
        let (_dir, paths) = fixture();
        paths.create_backup().unwrap();
        assert!(!paths.backup_file().exists());
    }

    #[test]
    fn test_backup_and_restore_round_trip() {
        let (_dir, paths) = fixture();
        fs::write(paths.file(), b"{\"version\":\"1.0\"}").unwrap();
        paths.create_backup().unwrap();

        fs::write(paths.file(), b"clobbered").unwrap();
        paths.restore_backup().unwrap();

        assert_eq!(
            fs::read(paths.file()).unwrap(),
            b"{\"version\":\"1.0\"}".to_vec()
        );
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let (_dir, paths) = fixture();
        let err = paths.restore_backup().unwrap_err();
        assert!(err.to_string().contains("backup file does not exist"));
    }
}
