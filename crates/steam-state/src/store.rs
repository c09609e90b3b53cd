//! Generic JSON record store.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::files::{atomic_write, ensure_private_dir};

const STORE_TARGET: &str = "steam_state::store";

/// A record persisted as a single JSON document.
///
/// The zero value returned by [`Default`] stands in for a missing or corrupt
/// file, so it must describe the "nothing known yet" state.
pub trait Record: Default + Serialize + DeserializeOwned {
    /// Records the save time on the record, when it tracks one.
    fn stamp(&mut self, _now: OffsetDateTime) {}
}

/// Reads and writes one [`Record`] at a fixed path.
///
/// There is no cross-process lock. Callers perform read-modify-write cycles
/// with [`JsonStore::update`] and accept last-writer-wins semantics.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonStore<T> {
    /// Creates a store bound to `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Returns the file backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when the backing file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the record, substituting the zero value on any failure.
    ///
    /// A corrupt or unreadable file is logged at `warn` and otherwise
    /// ignored; the next save overwrites it.
    #[must_use]
    pub fn load(&self) -> T {
        match self.try_load() {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    target: STORE_TARGET,
                    path = %self.path.display(),
                    %error,
                    "ignoring unreadable state record"
                );
                T::default()
            }
        }
    }

    /// Loads the record, reporting parse and IO failures.
    ///
    /// A missing file is not an error and yields the zero value.
    pub fn try_load(&self) -> Result<T, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Stamps and atomically writes the record, returning what was written.
    pub fn save(&self, mut record: T) -> Result<T, StoreError> {
        record.stamp(OffsetDateTime::now_utc());
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut payload =
            serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Serialise {
                path: self.path.clone(),
                source,
            })?;
        payload.push(b'\n');
        atomic_write(&self.path, &payload).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(target: STORE_TARGET, path = %self.path.display(), "state record saved");
        Ok(record)
    }

    /// Loads, mutates, and saves the record in one step.
    pub fn update<F>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let mut record = self.load();
        mutate(&mut record);
        self.save(record)
    }

    /// Removes the backing file. A missing file is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
