use crate::{
    config::Config,
    job::{JobRecord, MetadataStatus},
    util::{from_epoch_millis, parse_rfc3339},
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct JobRoots {
    pub backups: PathBuf,
    pub reports: Option<PathBuf>,
}

impl JobRoots {
    pub fn single(backups: impl Into<PathBuf>) -> Self {
        Self {
            backups: backups.into(),
            reports: None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.backups.as_path()).chain(self.reports.as_deref())
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read job root {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub metadata_files: Vec<String>,
    pub size_workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            metadata_files: cfg.scan.metadata_files.clone(),
            size_workers: cfg.scan.size_workers,
        }
    }
}

struct Discovered {
    paths: Vec<PathBuf>,
    modified: SystemTime,
}

/// Returns every job under `roots`, oldest first, ties broken by job id.
pub fn scan(roots: &JobRoots, opts: &ScanOptions) -> Result<Vec<JobRecord>, ScanError> {
    let mut found: BTreeMap<String, Discovered> = BTreeMap::new();

    for root in roots.iter() {
        let entries = fs::read_dir(root).map_err(|source| ScanError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!("skipping unreadable entry in {}: {err}", root.display());
                    continue;
                }
            };
            let path = entry.path();
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(err) => {
                    debug!("skipping {}: {err}", path.display());
                    continue;
                }
            };
            if !meta.is_dir() {
                continue;
            }
            let job_id = entry.file_name().to_string_lossy().into_owned();

            if let Some(existing) = found.get_mut(&job_id) {
                existing.paths.push(path);
                continue;
            }
            let modified = match meta.modified() {
                Ok(t) => t,
                Err(err) => {
                    debug!("skipping {}: no mtime: {err}", path.display());
                    continue;
                }
            };
            found.insert(
                job_id,
                Discovered {
                    paths: vec![path],
                    modified,
                },
            );
        }
    }

    let discovered: Vec<(String, Discovered)> = found.into_iter().collect();
    let sizes = measure_jobs(&discovered, opts.size_workers);

    let mut jobs: Vec<JobRecord> = discovered
        .into_iter()
        .zip(sizes)
        .map(|((job_id, d), size_bytes)| {
            let (meta_created, metadata_status) = read_metadata(&d.paths, &opts.metadata_files);
            let created_at = meta_created.unwrap_or_else(|| OffsetDateTime::from(d.modified));
            JobRecord {
                job_id,
                paths: d.paths,
                created_at,
                size_bytes,
                metadata_status,
            }
        })
        .collect();

    jobs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    debug!("scan found {} jobs", jobs.len());
    Ok(jobs)
}

fn measure_jobs(jobs: &[(String, Discovered)], workers: usize) -> Vec<u64> {
    let tasks: Vec<(usize, &Path)> = jobs
        .iter()
        .enumerate()
        .flat_map(|(i, (_, d))| d.paths.iter().map(move |p| (i, p.as_path())))
        .collect();
    let measure = || -> Vec<(usize, u64)> {
        tasks
            .par_iter()
            .map(|(job, path)| (*job, dir_size(path)))
            .collect()
    };

    let sizes = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(measure),
        Err(err) => {
            warn!("size pool unavailable, using the global pool: {err}");
            measure()
        }
    };

    let mut totals = vec![0u64; jobs.len()];
    for (job, size) in sizes {
        totals[job] += size;
    }
    totals
}

pub fn dir_size(path: &Path) -> u64 {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!("cannot stat {}: {err}", path.display());
            }
            return 0;
        }
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }
    let entries = match fs::read_dir(path) {
        Ok(e) => e,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!("cannot list {}: {err}", path.display());
            }
            return 0;
        }
    };
    entries
        .filter_map(Result::ok)
        .map(|e| dir_size(&e.path()))
        .sum()
}

fn read_metadata(paths: &[PathBuf], names: &[String]) -> (Option<OffsetDateTime>, MetadataStatus) {
    for dir in paths {
        for name in names {
            let file = dir.join(name);
            let raw = match fs::read(&file) {
                Ok(raw) => raw,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    debug!("unreadable metadata {}: {err}", file.display());
                    return (None, MetadataStatus::Corrupt);
                }
            };
            return match parse_created_at(&raw) {
                Some(t) => (Some(t), MetadataStatus::Present),
                None => {
                    debug!("invalid metadata {}", file.display());
                    (None, MetadataStatus::Corrupt)
                }
            };
        }
    }
    (None, MetadataStatus::Missing)
}

fn parse_created_at(raw: &[u8]) -> Option<OffsetDateTime> {
    let meta: serde_json::Value = serde_json::from_slice(raw).ok()?;
    match meta.get("createdAt").or_else(|| meta.get("created_at"))? {
        serde_json::Value::String(s) => parse_rfc3339(s),
        serde_json::Value::Number(n) => from_epoch_millis(n.as_i64()?),
        _ => None,
    }
}
