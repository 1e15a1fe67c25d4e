//! System abstraction layer for profile I/O
//!
//! The synchronizer only talks to [`ProfileIo`], so tests can swap the real
//! file system for the in-memory [`mock::MockProfileIo`].

use chrono::Local;
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use xxhash_rust::xxh3::xxh3_64;

/// Permission bits assumed for a profile that does not exist yet
pub const DEFAULT_PROFILE_MODE: u32 = 0o644;

/// Trait for reading and rewriting shell profiles
pub trait ProfileIo {
    /// Content and permission bits; a missing file reads as empty
    fn read_profile(&self, path: &Path) -> io::Result<(String, u32)>;

    /// Replace `path` with `content`, applying `permissions`
    fn write_profile(&self, path: &Path, content: &str, permissions: u32) -> io::Result<()>;

    /// Store a copy of `content` as a backup of `path`, returning where it went
    fn write_backup(&self, path: &Path, content: &str) -> io::Result<Option<PathBuf>>;
}

/// Real file system implementation with timestamped, rotated backups
#[derive(Debug, Clone)]
pub struct FsProfileIo {
    backup_dir: PathBuf,
    keep: usize,
}

pub fn default_backup_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".local").join("share").join("ali").join("backups")
}

impl FsProfileIo {
    pub fn new(backup_dir: PathBuf, keep: usize) -> Self {
        Self { backup_dir, keep }
    }

    pub fn for_home(home_dir: &Path, keep: usize) -> Self {
        Self::new(default_backup_dir(home_dir), keep)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// File name prefix shared by every backup of `path`
    ///
    /// The hash of the full path keeps `~/.bashrc` and `/etc/bashrc` apart.
    pub fn backup_prefix(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches('.').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "profile".to_string());
        let hash = xxh3_64(path.to_string_lossy().as_bytes());
        format!("{}-{:08x}", name, hash as u32)
    }

    /// Backups of `path`, oldest first
    pub fn list_backups(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let prefix = format!("{}.", Self::backup_prefix(path));
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".bak"))
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    fn rotate(&self, path: &Path) -> io::Result<usize> {
        let backups = self.list_backups(path)?;
        let excess = backups.len().saturating_sub(self.keep);
        for old in backups.iter().take(excess) {
            fs::remove_file(old)?;
            debug!("rotated out backup {:?}", old);
        }
        Ok(excess)
    }
}

impl ProfileIo for FsProfileIo {
    fn read_profile(&self, path: &Path) -> io::Result<(String, u32)> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let mode = fs::metadata(path)?.permissions().mode() & 0o7777;
                Ok((content, mode))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((String::new(), DEFAULT_PROFILE_MODE)),
            Err(e) => Err(e),
        }
    }

    fn write_profile(&self, path: &Path, content: &str, permissions: u32) -> io::Result<()> {
        // Follow symlinks so a dotfile manager's link stays a link
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(permissions))?;
        temp.persist(&target).map_err(|e| e.error)?;
        debug!("wrote profile {:?} ({} bytes, mode {:o})", target, content.len(), permissions);
        Ok(())
    }

    fn write_backup(&self, path: &Path, content: &str) -> io::Result<Option<PathBuf>> {
        if self.keep == 0 {
            return Ok(None);
        }
        fs::create_dir_all(&self.backup_dir)?;

        let stamp = Local::now().format("%Y%m%dT%H%M%S%.3f");
        let prefix = Self::backup_prefix(path);
        let mut sequence = 0u32;
        let backup = loop {
            let candidate = self.backup_dir.join(format!("{}.{}.{:03}.bak", prefix, stamp, sequence));
            if !candidate.exists() {
                break candidate;
            }
            sequence += 1;
        };
        fs::write(&backup, content)?;
        debug!("backed up {:?} to {:?}", path, backup);

        self.rotate(path)?;
        Ok(Some(backup))
    }
}

// ============================================================================
// Mock Implementations (for testing)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// In-memory profiles that record the order of every write
    #[derive(Default, Clone)]
    pub struct MockProfileIo {
        files: Arc<Mutex<HashMap<PathBuf, (String, u32)>>>,
        backups: Arc<Mutex<Vec<(PathBuf, String)>>>,
        events: Arc<Mutex<Vec<String>>>,
        unreadable: Arc<Mutex<HashSet<PathBuf>>>,
    }

    impl MockProfileIo {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl AsRef<Path>, contents: &str, mode: u32) -> Self {
            self.files
                .lock()
                .unwrap()
                .insert(path.as_ref().to_path_buf(), (contents.to_string(), mode));
            self
        }

        pub fn with_unreadable(self, path: impl AsRef<Path>) -> Self {
            self.unreadable.lock().unwrap().insert(path.as_ref().to_path_buf());
            self
        }

        pub fn get_file(&self, path: impl AsRef<Path>) -> Option<(String, u32)> {
            self.files.lock().unwrap().get(path.as_ref()).cloned()
        }

        pub fn backups(&self) -> Vec<(PathBuf, String)> {
            self.backups.lock().unwrap().clone()
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProfileIo for MockProfileIo {
        fn read_profile(&self, path: &Path) -> io::Result<(String, u32)> {
            if self.unreadable.lock().unwrap().contains(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock read error"));
            }
            Ok(self
                .files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_else(|| (String::new(), DEFAULT_PROFILE_MODE)))
        }

        fn write_profile(&self, path: &Path, content: &str, permissions: u32) -> io::Result<()> {
            self.events.lock().unwrap().push(format!("write {}", path.display()));
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), (content.to_string(), permissions));
            Ok(())
        }

        fn write_backup(&self, path: &Path, content: &str) -> io::Result<Option<PathBuf>> {
            self.events.lock().unwrap().push(format!("backup {}", path.display()));
            self.backups.lock().unwrap().push((path.to_path_buf(), content.to_string()));
            Ok(Some(path.with_extension("bak")))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::Error;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_profile_is_empty() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let io = FsProfileIo::new(dir.path().join("backups"), 3);
        let (content, mode) = io.read_profile(&dir.path().join(".bashrc"))?;
        assert_eq!(content, "");
        assert_eq!(mode, DEFAULT_PROFILE_MODE);
        Ok(())
    }

    #[test]
    fn test_write_preserves_permissions() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let profile = dir.path().join(".zshrc");
        fs::write(&profile, "export A=1\n")?;
        fs::set_permissions(&profile, fs::Permissions::from_mode(0o600))?;

        let io = FsProfileIo::new(dir.path().join("backups"), 3);
        let (_, mode) = io.read_profile(&profile)?;
        assert_eq!(mode, 0o600);

        io.write_profile(&profile, "export A=2\n", mode)?;
        assert_eq!(fs::read_to_string(&profile)?, "export A=2\n");
        assert_eq!(fs::metadata(&profile)?.permissions().mode() & 0o7777, 0o600);
        Ok(())
    }

    #[test]
    fn test_write_through_symlink() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let real = dir.path().join("dotfiles-bashrc");
        let link = dir.path().join(".bashrc");
        fs::write(&real, "old\n")?;
        std::os::unix::fs::symlink(&real, &link)?;

        let io = FsProfileIo::new(dir.path().join("backups"), 3);
        io.write_profile(&link, "new\n", 0o644)?;
        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real)?, "new\n");
        Ok(())
    }

    #[test]
    fn test_backup_rotation_keeps_newest() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let profile = dir.path().join(".bashrc");
        let io = FsProfileIo::new(dir.path().join("backups"), 2);

        for n in 0..4 {
            io.write_backup(&profile, &format!("version {}\n", n))?;
        }
        let backups = io.list_backups(&profile)?;
        assert_eq!(backups.len(), 2);
        assert_eq!(fs::read_to_string(&backups[0])?, "version 2\n");
        assert_eq!(fs::read_to_string(&backups[1])?, "version 3\n");
        Ok(())
    }

    #[test]
    fn test_backups_are_per_profile() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let io = FsProfileIo::new(dir.path().join("backups"), 1);
        let bashrc = dir.path().join(".bashrc");
        let zshrc = dir.path().join(".zshrc");

        io.write_backup(&bashrc, "b")?;
        io.write_backup(&zshrc, "z")?;
        assert_eq!(io.list_backups(&bashrc)?.len(), 1);
        assert_eq!(io.list_backups(&zshrc)?.len(), 1);
        assert_ne!(FsProfileIo::backup_prefix(&bashrc), FsProfileIo::backup_prefix(&zshrc));
        Ok(())
    }

    #[test]
    fn test_zero_retention_skips_backup() -> Result<(), Error> {
        let dir = TempDir::new()?;
        let io = FsProfileIo::new(dir.path().join("backups"), 0);
        assert_eq!(io.write_backup(&dir.path().join(".bashrc"), "x")?, None);
        assert!(!io.backup_dir().exists());
        Ok(())
    }

    #[test]
    fn test_mock_records_event_order() -> Result<(), Error> {
        let io = mock::MockProfileIo::new().with_file("/home/u/.bashrc", "a\n", 0o640);
        let path = Path::new("/home/u/.bashrc");
        assert_eq!(io.read_profile(path)?, ("a\n".to_string(), 0o640));
        io.write_backup(path, "a\n")?;
        io.write_profile(path, "b\n", 0o640)?;
        assert_eq!(io.events(), vec!["backup /home/u/.bashrc", "write /home/u/.bashrc"]);
        assert_eq!(io.get_file(path), Some(("b\n".to_string(), 0o640)));
        Ok(())
    }
}
