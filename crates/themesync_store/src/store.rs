//! The version store itself.

use crate::batch::Batch;
use crate::error::{StoreError, StoreResult};
use crate::format::{self, Contents};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the sibling file a mutation writes before renaming it over
/// the store.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Full contents of the store: collection -> key -> value.
pub type Snapshot = BTreeMap<String, BTreeMap<String, String>>;

/// A file-backed nested key-value store.
///
/// # Durability
///
/// Every mutation rewrites the file through a temporary sibling that is
/// synced and renamed over the original, then the parent directory is
/// synced. A mutation that fails to persist leaves both the file and the
/// in-memory view untouched.
///
/// # Thread Safety
///
/// The store can be shared across threads. Reads take a shared lock,
/// mutations hold the exclusive lock for the duration of the file rewrite.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    contents: RwLock<Contents>,
}

impl VersionStore {
    /// Opens the store at `path`.
    ///
    /// A missing file yields an empty store; nothing is written until the
    /// first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file exists but is not a valid
    /// ledger, or an I/O error if it cannot be read.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(text) => format::decode(&text).map_err(|message| StoreError::Corrupted {
                path: path.to_path_buf(),
                message,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Contents::default(),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(StoreError::Corrupted {
                    path: path.to_path_buf(),
                    message: "file is not valid UTF-8".to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            path = %path.display(),
            collections = contents.entries.len(),
            "opened version store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            contents: RwLock::new(contents),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current header comment.
    #[must_use]
    pub fn comment(&self) -> String {
        self.contents.read().comment.clone()
    }

    /// Sets the header comment and persists it.
    ///
    /// Line breaks are folded into spaces so the comment stays on one line.
    pub fn set_comment(&self, comment: &str) -> StoreResult<()> {
        let comment = comment.replace(['\r', '\n'], " ");
        let exists = self.path.exists();
        self.mutate(|contents| {
            if contents.comment == comment && exists {
                return Ok(false);
            }
            contents.comment = comment;
            Ok(true)
        })
    }

    /// Reads the value stored for `collection`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] or [`StoreError::KeyNotFound`]
    /// when nothing is stored there.
    pub fn read(&self, collection: &str, key: &str) -> StoreResult<String> {
        let contents = self.contents.read();
        let keys = contents
            .entries
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        keys.get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })
    }

    /// Starts a write batch.
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    /// Removes a single entry. Removing a missing entry is a no-op.
    ///
    /// A collection left without entries is dropped.
    pub fn delete(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.mutate(|contents| {
            let Some(keys) = contents.entries.get_mut(collection) else {
                return Ok(false);
            };
            if keys.remove(key).is_none() {
                return Ok(false);
            }
            if keys.is_empty() {
                contents.entries.remove(collection);
            }
            Ok(true)
        })
    }

    /// Removes every entry of a collection. Removing a missing collection is
    /// a no-op.
    pub fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        self.mutate(|contents| Ok(contents.entries.remove(collection).is_some()))
    }

    /// Returns a copy of the full contents.
    pub fn dump(&self) -> StoreResult<Snapshot> {
        Ok(self.contents.read().entries.clone())
    }

    /// Applies staged batch writes as one unit.
    pub(crate) fn apply_writes(&self, writes: Vec<(String, String, String)>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.mutate(|contents| {
            for (collection, key, value) in writes {
                contents
                    .entries
                    .entry(collection)
                    .or_default()
                    .insert(key, value);
            }
            Ok(true)
        })
    }

    /// Runs `change` against a copy of the contents and, if it reports a
    /// change, persists the copy before swapping it in.
    fn mutate<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Contents) -> StoreResult<bool>,
    {
        let mut current = self.contents.write();
        let mut next = current.clone();
        if !change(&mut next)? {
            return Ok(());
        }
        self.persist(&next)?;
        *current = next;
        Ok(())
    }

    fn persist(&self, contents: &Contents) -> StoreResult<()> {
        let text = format::encode(contents).map_err(io::Error::from)?;
        let temp_path = self.temp_path();

        let mut file = File::create(&temp_path)?;
        if let Err(e) = file.write_all(text.as_bytes()).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        self.sync_directory()?;

        debug!(
            path = %self.path.display(),
            collections = contents.entries.len(),
            "persisted version store"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journals the rename itself
        Ok(())
    }
}
