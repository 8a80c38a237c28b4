//! Configuration store.
//!
//! Holds the [`ConfigDocument`] in memory behind a lock and mirrors every
//! mutation to a JSON file. Mutations run against a copy of the document;
//! the copy replaces the live document only after it has been written, so
//! a failed write leaves both the file and memory untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, info};

use crate::state::ConfigDocument;

/// Errors from loading or persisting the state document.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path} is not a valid document: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode state document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("state lock poisoned")]
    Poisoned,
}

/// Shared handle to the persisted state.
#[derive(Debug)]
pub struct ConfigStore {
    doc: RwLock<ConfigDocument>,
    /// Backing file; `None` keeps the store in memory only
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Load the document at `path`. A missing file yields defaults; the file
    /// is created on the first mutation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => ConfigDocument::default(),
            Ok(content) => ConfigDocument::from_json_str(&content).map_err(|source| {
                StoreError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no state file, starting from defaults");
                ConfigDocument::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            doc: RwLock::new(doc),
            path: Some(path),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(doc: ConfigDocument) -> Self {
        Self {
            doc: RwLock::new(doc),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the current document under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&ConfigDocument) -> T) -> Result<T, StoreError> {
        let guard = self.doc.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&guard))
    }

    /// Clone of the current document.
    pub fn snapshot(&self) -> Result<ConfigDocument, StoreError> {
        self.read(Clone::clone)
    }

    /// Apply a mutation and persist the whole document before releasing the
    /// write lock.
    pub fn update<T>(&self, f: impl FnOnce(&mut ConfigDocument) -> T) -> Result<T, StoreError> {
        self.try_update(|doc| Ok::<T, StoreError>(f(doc)))
    }

    /// Like [`update`](Self::update), but `f` may refuse the change. A
    /// refused change is neither applied nor written.
    pub fn try_update<T, E>(
        &self,
        f: impl FnOnce(&mut ConfigDocument) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.doc.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    /// Write the document to a sibling temp file, then rename it over the
    /// state file.
    fn persist(&self, doc: &ConfigDocument) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(doc).map_err(StoreError::Encode)?;
        let tmp = temp_path(path);
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), "state persisted");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
