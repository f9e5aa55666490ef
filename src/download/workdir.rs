use directories::ProjectDirs;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default scratch base, the platform cache directory
pub fn default_base_dir() -> PathBuf {
    ProjectDirs::from("", "", "geolite2-import")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("geolite2-import"))
}

/// Create `dir` and its parents, group-writable on unix
pub fn create_work_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o775);
    }
    builder.create(dir)
}

/// Keep identities usable as a single path component
fn path_safe(identity: &str) -> String {
    let cleaned: String = identity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// Working directory path for `identity` under `base_dir`
pub fn work_dir_for(base_dir: &Path, identity: &str) -> PathBuf {
    base_dir.join(format!("geoip_{}", path_safe(identity)))
}

/// Scratch directory of one run, owned by a single identity.
///
/// Removed at run start, at run end, and on drop.
pub struct WorkingSet {
    dir: PathBuf,
}

impl WorkingSet {
    pub fn new(base_dir: &Path, identity: &str) -> Self {
        Self {
            dir: work_dir_for(base_dir, identity),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the directory and everything in it; `Ok(false)` if absent
    pub fn trash(&self) -> io::Result<bool> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                debug!(dir = ?self.dir, "Removed working directory");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WorkingSet {
    fn drop(&mut self) {
        if let Err(e) = self.trash() {
            warn!(dir = ?self.dir, error = %e, "Failed to remove working directory");
        }
    }
}

/// Advisory single-flight lock for one identity.
///
/// Held for the whole run and removed on drop. A lock file left behind by a
/// killed process must be deleted by hand.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn path_for(base_dir: &Path, identity: &str) -> PathBuf {
        base_dir.join(format!("geoip_{}.lock", path_safe(identity)))
    }

    /// Fails with `AlreadyExists` while another run holds the lock
    pub fn acquire(path: PathBuf) -> io::Result<Self> {
        Self::acquire_with(path, |file| writeln!(file, "{}", std::process::id()))
    }

    fn acquire_with(
        path: PathBuf,
        stamp: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            create_work_dir(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        // From here on the file is ours; dropping the guard on error removes it
        let lock = Self { path };
        stamp(&mut file)?;
        Ok(lock)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = ?self.path, error = %e, "Failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_path_safe() {
        let ws = WorkingSet::new(Path::new("/tmp/base"), "../../etc");
        assert_eq!(ws.dir(), Path::new(&format!("/tmp/base/geoip_{}etc", "_".repeat(6))));

        let ws = WorkingSet::new(Path::new("/tmp/base"), "");
        assert_eq!(ws.dir(), Path::new("/tmp/base/geoip_default"));

        assert_eq!(
            RunLock::path_for(Path::new("/b"), "alice-1"),
            PathBuf::from("/b/geoip_alice-1.lock")
        );
    }

    #[test]
    fn test_trash_removes_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = WorkingSet::new(tmp.path(), "42");
        assert!(!ws.trash().unwrap());

        create_work_dir(&ws.dir().join("nested")).unwrap();
        fs::write(ws.dir().join("nested/file.csv"), "x").unwrap();
        assert!(ws.trash().unwrap());
        assert!(!ws.dir().exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = {
            let ws = WorkingSet::new(tmp.path(), "7");
            create_work_dir(ws.dir()).unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_run_lock_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = RunLock::path_for(tmp.path(), "7");

        let lock = RunLock::acquire(path.clone()).unwrap();
        let second = RunLock::acquire(path.clone()).unwrap_err();
        assert_eq!(second.kind(), io::ErrorKind::AlreadyExists);

        drop(lock);
        assert!(!path.exists());
        assert!(RunLock::acquire(path).is_ok());
    }

    #[test]
    fn test_run_lock_released_when_stamp_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = RunLock::path_for(tmp.path(), "7");

        let err = RunLock::acquire_with(path.clone(), |_| {
            Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
        assert!(!path.exists());
        assert!(RunLock::acquire(path).is_ok());
    }
}
