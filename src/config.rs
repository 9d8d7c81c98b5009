use crate::{delete::DeleteMethod, policy::RetentionPolicy, scan::JobRoots};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: self.retention.retention_days,
            quota_bytes: self.retention.quota_bytes(),
            min_keep_count: self.retention.min_keep_count,
            check_orphans: self.retention.check_orphans,
        }
    }

    pub fn delete_method(&self) -> DeleteMethod {
        DeleteMethod::parse(&self.retention.delete_method)
    }

    pub fn job_roots(&self) -> Result<JobRoots> {
        let backups = self.paths.backups_dir()?;
        let reports = self.paths.reports_dir();
        Ok(JobRoots { backups, reports })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retention {
    pub auto_cleanup: bool,
    pub retention_days: f64,
    pub quota_gb: f64,
    /// Exact byte budget; takes precedence over `quota_gb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<i64>,
    pub min_keep_count: usize,
    pub check_orphans: bool,
    pub delete_method: String,
}
impl Default for Retention {
    fn default() -> Self {
        Self {
            auto_cleanup: false,
            retention_days: 30.0,
            quota_gb: 25.0,
            quota_bytes: None,
            min_keep_count: 20,
            check_orphans: false,
            delete_method: "trash".into(),
        }
    }
}

impl Retention {
    pub fn quota_bytes(&self) -> i64 {
        match self.quota_bytes {
            Some(b) => b,
            None => (self.quota_gb * BYTES_PER_GB) as i64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub root: String,
    pub backups: String,
    pub reports: String,
    pub app_trash: String,
    pub state_file: String,
    pub lock_file: String,
}

impl Paths {
    fn under_root(&self, explicit: &str, name: &str) -> Result<PathBuf> {
        if !explicit.is_empty() {
            return Ok(PathBuf::from(explicit));
        }
        if self.root.is_empty() {
            return Err(anyhow!("paths.root is empty and no explicit path for {name}"));
        }
        Ok(PathBuf::from(&self.root).join(name))
    }

    pub fn backups_dir(&self) -> Result<PathBuf> {
        self.under_root(&self.backups, "Backups")
    }

    pub fn reports_dir(&self) -> Option<PathBuf> {
        if !self.reports.is_empty() {
            return Some(PathBuf::from(&self.reports));
        }
        if self.root.is_empty() {
            return None;
        }
        let default = PathBuf::from(&self.root).join("Reports");
        default.is_dir().then_some(default)
    }

    pub fn app_trash_dir(&self) -> Result<PathBuf> {
        self.under_root(&self.app_trash, ".trash")
    }

    pub fn state_file(&self) -> Result<PathBuf> {
        self.under_root(&self.state_file, "cleanup-state.json")
    }

    pub fn lock_file(&self) -> Result<PathBuf> {
        self.under_root(&self.lock_file, ".cleanup.lock")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scan {
    pub metadata_files: Vec<String>,
    pub size_workers: usize,
}
impl Default for Scan {
    fn default() -> Self {
        Self {
            metadata_files: vec!["meta.json".into(), "Job.json".into()],
            size_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Audit {
    pub enabled: bool,
    pub file_path: String,
}
impl Default for Audit {
    fn default() -> Self {
        Self {
            enabled: true,
            file_path: "".into(),
        }
    }
}

impl Audit {
    pub fn log_path(&self, paths: &Paths) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if !self.file_path.is_empty() {
            return Some(PathBuf::from(&self.file_path));
        }
        paths.under_root("", "cleanup-audit.log").ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
