use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStatus {
    Present,
    Missing,
    Corrupt,
}

impl MetadataStatus {
    pub fn is_orphan(self) -> bool {
        !matches!(self, MetadataStatus::Present)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    /// Tracked locations, backups root first.
    pub paths: Vec<PathBuf>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub size_bytes: u64,
    pub metadata_status: MetadataStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionReason {
    RetentionAgeExceeded,
    QuotaExceeded,
    Orphan,
    ManualFullCleanup,
}

impl DeletionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionReason::RetentionAgeExceeded => "retention-age-exceeded",
            DeletionReason::QuotaExceeded => "quota-exceeded",
            DeletionReason::Orphan => "orphan",
            DeletionReason::ManualFullCleanup => "manual-full-cleanup",
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionCandidate {
    pub job: JobRecord,
    pub reason: DeletionReason,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DeletionCandidate {
    pub fn new(job: JobRecord, reason: DeletionReason) -> Self {
        Self {
            job,
            reason,
            errors: Vec::new(),
        }
    }
}
