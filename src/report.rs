use crate::job::DeletionReason;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub timestamp: String,
    pub deleted_count: usize,
    pub deleted_bytes: u64,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub job_id: String,
    pub reason: DeletionReason,
    pub size_bytes: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub ok: bool,
    pub summary: RunSummary,
    pub deletions: Vec<DeletionReport>,
    pub summary_persisted: bool,
}

impl CleanupResult {
    pub fn from_deletions(timestamp: String, deletions: Vec<DeletionReport>) -> Self {
        let error_count = deletions.iter().filter(|d| !d.errors.is_empty()).count();
        let deleted_bytes = deletions
            .iter()
            .filter(|d| d.errors.is_empty())
            .map(|d| d.size_bytes)
            .sum();
        let summary = RunSummary {
            timestamp,
            deleted_count: deletions.len() - error_count,
            deleted_bytes,
            error_count,
        };
        Self {
            ok: error_count == 0,
            summary,
            deletions,
            summary_persisted: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    pub job_count: usize,
    pub total_bytes: u64,
    pub orphan_count: usize,
    pub oldest_created_at: Option<String>,
    pub newest_created_at: Option<String>,
    pub quota_bytes: i64,
    pub last_run: Option<RunSummary>,
}
