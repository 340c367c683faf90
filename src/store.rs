//! Per-destination record of entries already handled.
//!
//! Each destination gets `{state_dir}/{destination_key}.json`, a JSON array
//! of entry keys.  Order in the file carries no meaning; keys are written
//! sorted so that unchanged sets produce unchanged files.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::ident::{DestinationKey, EntryKey};

/// Entry keys already delivered to one destination.
pub type SeenSet = HashSet<EntryKey>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path:?} is corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode seen set: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed [`SeenSet`] storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct SeenStore {
    dir: PathBuf,
}

impl SeenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &DestinationKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }

    /// Load the set for `key`.
    ///
    /// A destination that was never saved, or whose file is empty, has an
    /// empty set.  Content that is not a JSON array of strings is an error.
    pub fn load(&self, key: &DestinationKey) -> Result<SeenSet, StoreError> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no state for destination {key} yet");
                return Ok(SeenSet::new());
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let text = text.trim();
        if text.is_empty() {
            return Ok(SeenSet::new());
        }

        let keys: Vec<EntryKey> =
            serde_json::from_str(text).map_err(|source| StoreError::Decode { path, source })?;
        Ok(keys.into_iter().collect())
    }

    /// Replace the stored set for `key`, creating the state directory first
    /// if needed.  The file is swapped in atomically.
    pub fn save(&self, key: &DestinationKey, seen: &SeenSet) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut keys: Vec<&EntryKey> = seen.iter().collect();
        keys.sort();
        let content = serde_json::to_string(&keys)?;

        let target = self.path_for(key);
        let io_err = |source| StoreError::Io {
            path: target.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file_mut().sync_all().map_err(io_err)?;
        tmp.persist(&target).map_err(|e| io_err(e.error))?;

        debug!("saved {} entry keys to {:?}", seen.len(), target);
        Ok(())
    }
}
