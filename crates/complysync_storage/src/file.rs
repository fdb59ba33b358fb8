//! File-based storage backend for persistent storage.
//!
//! Layout of the data directory:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                       # Advisory lock for single-writer
//! ├─ profiles.dat               # One blob per collection
//! └─ data_subject_requests.dat
//! ```

use crate::backend::{validate_name, StorageBackend};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const BLOB_EXTENSION: &str = "dat";
const TEMP_EXTENSION: &str = "dat.tmp";

/// A file-based storage backend.
///
/// Each blob lives in its own file. Writes use the write-then-rename pattern
/// so a crash mid-write leaves the previous blob intact.
///
/// # Durability
///
/// `write` returns only after the temporary file is synced, renamed over the
/// blob, and the directory entry is synced.
///
/// # Thread Safety
///
/// Writes are serialized by an internal mutex. The data directory is held
/// with an exclusive advisory lock for the lifetime of the backend, so a
/// second process (or a second `FileBackend` on the same directory) gets
/// [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use complysync_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("complysync-data")).unwrap();
/// backend.write("profiles", b"persistent data").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `Locked`)
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        if !dir.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", dir.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        // Leftovers of a write interrupted before its rename.
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.to_string_lossy().ends_with(TEMP_EXTENSION) {
                fs::remove_file(&path)?;
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{BLOB_EXTENSION}"))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{TEMP_EXTENSION}"))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        // NTFS journals directory metadata; there is no directory fsync.
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        match fs::read(self.blob_path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let _guard = self.write_lock.lock();

        let temp_path = self.temp_path(name);
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.blob_path(name))?;
        self.sync_directory()
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.blob_path(name)) {
            Ok(()) => self.sync_directory(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
