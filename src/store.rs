use crate::report::RunSummary;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LAST_CLEANUP_KEY: &str = "lastCleanup";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait SummaryStore {
    fn last_summary(&self) -> Result<Option<RunSummary>, StoreError>;
    fn save_summary(&self, summary: &RunSummary) -> Result<(), StoreError>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

impl SummaryStore for JsonFileStore {
    fn last_summary(&self) -> Result<Option<RunSummary>, StoreError> {
        let mut all = self.read_all()?;
        let Some(value) = all.remove(LAST_CLEANUP_KEY) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    fn save_summary(&self, summary: &RunSummary) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json_err = |source: serde_json::Error| StoreError::Json {
            path: self.path.clone(),
            source,
        };

        let mut all = self.read_all()?;
        all.insert(
            LAST_CLEANUP_KEY.to_string(),
            serde_json::to_value(summary).map_err(json_err)?,
        );
        let bytes = serde_json::to_vec_pretty(&Value::Object(all)).map_err(json_err)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    last: RefCell<Option<RunSummary>>,
}

impl SummaryStore for MemoryStore {
    fn last_summary(&self) -> Result<Option<RunSummary>, StoreError> {
        Ok(self.last.borrow().clone())
    }

    fn save_summary(&self, summary: &RunSummary) -> Result<(), StoreError> {
        *self.last.borrow_mut() = Some(summary.clone());
        Ok(())
    }
}
