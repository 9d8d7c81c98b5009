pub mod os_trash;
pub mod quarantine;

use crate::job::DeletionCandidate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::debug;

pub use os_trash::{OsTrash, SystemTrash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteMethod {
    Hard,
    Trash,
    AppTrash,
}

impl DeleteMethod {
    /// Anything other than `hard` or `trash` selects the quarantine folder.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => DeleteMethod::Hard,
            "trash" => DeleteMethod::Trash,
            _ => DeleteMethod::AppTrash,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeleteMethod::Hard => "hard",
            DeleteMethod::Trash => "trash",
            DeleteMethod::AppTrash => "app-trash",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub deleted_bytes: u64,
    pub errors: Vec<String>,
}

impl DeletionOutcome {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Executor<'a> {
    method: DeleteMethod,
    trash_root: PathBuf,
    os_trash: &'a dyn OsTrash,
}

impl<'a> Executor<'a> {
    pub fn new(method: DeleteMethod, trash_root: impl Into<PathBuf>, os_trash: &'a dyn OsTrash) -> Self {
        Self {
            method,
            trash_root: trash_root.into(),
            os_trash,
        }
    }

    pub fn method(&self) -> DeleteMethod {
        self.method
    }

    pub fn delete(&self, candidate: &DeletionCandidate) -> DeletionOutcome {
        let job = &candidate.job;
        let errors = match self.method {
            DeleteMethod::Hard => job
                .paths
                .iter()
                .filter_map(|p| {
                    hard_remove(p)
                        .err()
                        .map(|e| format!("remove {}: {e}", p.display()))
                })
                .collect(),
            DeleteMethod::Trash => job
                .paths
                .iter()
                .filter(|p| exists(p))
                .filter_map(|p| self.os_trash.delete(p).err())
                .collect(),
            DeleteMethod::AppTrash => quarantine::move_job(
                &job.job_id,
                &job.paths,
                &self.trash_root,
                OffsetDateTime::now_utc(),
            ),
        };

        DeletionOutcome {
            deleted_bytes: job.size_bytes,
            errors,
        }
    }
}

fn exists(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                debug!("cannot stat {}: {err}", path.display());
                return true;
            }
            false
        }
    }
}

pub fn hard_remove(path: &Path) -> io::Result<()> {
    let res = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) => Err(err),
    };
    match res {
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!("already gone: {}", path.display());
            Ok(())
        }
        other => other,
    }
}
