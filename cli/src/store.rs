/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use trace_analytics::StateStore;

use crate::error::{Error, Result};

/// State store backed by a JSON object of strings on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let data = std::fs::read(path).map_err(Error::ReadState)?;
            serde_json::from_slice(&data).map_err(Error::DeserializeState)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.entries).map_err(Error::SerializeState)?;
        std::fs::write(&self.path, data).map_err(Error::WriteState)?;
        log::info!("state saved to {}", self.path.display());
        Ok(())
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}
