//! Durable string-key to bytes store backed by a single file
//!
//! The whole store is one JSON document held in memory. Every mutation writes
//! the document to a `.tmp` sibling and renames it over the store file, so a
//! crash mid-write leaves either the old or the new document on disk, never a
//! truncated one. The handle to the live file is acquired in
//! [`PersistentStore::open`] and released exactly once by
//! [`PersistentStore::close`] (or on drop).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the store file
#[derive(Debug, Deserialize)]
struct StoreDocument {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, Vec<u8>>,
}

/// Sibling path the next document is staged in before the rename
fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn create_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Writes `entries` to the tmp sibling of `path`, syncs it, and renames it
/// into place
///
/// Returns the handle of the new file, which is now the store file.
fn write_document(path: &Path, entries: &BTreeMap<String, Vec<u8>>) -> io::Result<File> {
    let document = StoreDocumentRef {
        version: FORMAT_VERSION,
        entries,
    };
    let json = serde_json::to_vec(&document)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp = tmp_path(path);
    let staged = File::create(&tmp).and_then(|mut file| {
        file.write_all(&json)?;
        file.sync_data()?;
        Ok(file)
    });
    let file = match staged {
        Ok(file) => file,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(file)
}

/// A file-backed mapping from string keys to opaque bytes
#[derive(Debug)]
pub struct PersistentStore {
    path: PathBuf,
    /// `None` once the store has been closed
    file: Option<File>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl PersistentStore {
    /// Opens the store at `path`, creating the file and its parent directories
    /// if needed
    ///
    /// An empty file is treated as an empty store.
    ///
    /// # Errors
    /// * `StoreError::Unavailable` if the file cannot be opened, created or read
    /// * `StoreError::Corrupt` if the file does not hold a store document
    /// * `StoreError::UnsupportedVersion` if the document has another format version
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source: io::Error| StoreError::Unavailable {
            path: path.clone(),
            source,
        };

        create_parent_dir(&path).map_err(unavailable)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(unavailable)?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(unavailable)?;

        let entries = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            let document: StoreDocument =
                serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            if document.version != FORMAT_VERSION {
                return Err(StoreError::UnsupportedVersion {
                    path,
                    found: document.version,
                });
            }
            document.entries
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened cache store");

        Ok(Self {
            path,
            file: Some(file),
            entries,
        })
    }

    /// Replaces whatever is at `path` with an empty store document
    ///
    /// Used to recover from a store that [`open`](Self::open) rejects as
    /// corrupt or of another format version. Nothing in the old file is kept.
    pub fn reset(path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let unavailable = |source: io::Error| StoreError::Unavailable {
            path: path.to_path_buf(),
            source,
        };

        create_parent_dir(path).map_err(unavailable)?;
        write_document(path, &BTreeMap::new()).map_err(unavailable)?;

        tracing::info!(path = %path.display(), "reset cache store");
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`close`](Self::close) has already run
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.file.is_some() && self.entries.contains_key(key)
    }

    /// Keys currently held by the store, in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Reads the bytes stored under `key`
    ///
    /// Callers are expected to check [`contains`](Self::contains) first;
    /// `KeyNotFound` signals a broken caller rather than a cache miss.
    pub fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Stores `bytes` under `key`, replacing any previous value, and writes the
    /// store through to disk
    ///
    /// If the write to disk fails the previous value is restored, so the
    /// in-memory view never runs ahead of the file.
    pub fn write(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        let previous = self.entries.insert(key.to_string(), bytes);
        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => {
                    self.entries.insert(key.to_string(), previous);
                }
                None => {
                    self.entries.remove(key);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes `key`; absent keys are a no-op and do not touch the file
    ///
    /// If the write to disk fails the entry is put back.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// Atomically replaces the backing file with the in-memory map
    fn persist(&mut self) -> Result<(), StoreError> {
        if self.file.is_none() {
            return Err(StoreError::Closed);
        }
        let file = write_document(&self.path, &self.entries)?;
        self.file = Some(file);
        Ok(())
    }

    /// Syncs and releases the file handle
    ///
    /// Every mutation is already on disk, so there is nothing left to write.
    /// Safe to call any number of times; only the first call does any work.
    pub fn close(&mut self) -> Result<(), StoreError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        tracing::debug!(path = %self.path.display(), "closed cache store");
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for PersistentStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close cache store");
        }
    }
}
