use crate::job::{DeletionCandidate, DeletionReason, JobRecord};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub retention_days: f64,
    pub quota_bytes: i64,
    pub min_keep_count: usize,
    pub check_orphans: bool,
}

/// Partition of one scan. Every job id lands in exactly one of
/// `protected`, `retained` or `candidates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub protected: Vec<String>,
    pub retained: Vec<String>,
    pub candidates: Vec<DeletionCandidate>,
    /// Jobs with missing or corrupt metadata, whether or not they were selected.
    pub orphans: Vec<String>,
    pub total_bytes: u64,
    pub projected_bytes: u64,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

pub fn evaluate(jobs: &[JobRecord], policy: &RetentionPolicy, now: OffsetDateTime) -> Evaluation {
    let mut order: Vec<&JobRecord> = jobs.iter().collect();
    order.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });

    // Everything at or past this index is among the newest `min_keep_count`.
    let protected_from = order.len().saturating_sub(policy.min_keep_count);
    let mut selected: Vec<Option<DeletionReason>> = vec![None; order.len()];

    if policy.check_orphans {
        for (i, job) in order[..protected_from].iter().enumerate() {
            if job.metadata_status.is_orphan() {
                selected[i] = Some(DeletionReason::Orphan);
            }
        }
    }

    let max_age_ms = policy.retention_days * MILLIS_PER_DAY;
    for (i, job) in order[..protected_from].iter().enumerate() {
        if selected[i].is_some() {
            continue;
        }
        let age_ms = (now - job.created_at).whole_milliseconds() as f64;
        if age_ms > max_age_ms {
            selected[i] = Some(DeletionReason::RetentionAgeExceeded);
        }
    }

    let total_bytes: u64 = order.iter().map(|j| j.size_bytes).sum();
    let already: u64 = order
        .iter()
        .zip(&selected)
        .filter(|(_, s)| s.is_some())
        .map(|(j, _)| j.size_bytes)
        .sum();
    let quota = i128::from(policy.quota_bytes);
    let mut projected = i128::from(total_bytes) - i128::from(already);

    // A negative quota is treated as unset.
    if policy.quota_bytes >= 0 && projected > quota {
        for i in 0..protected_from {
            if projected <= quota {
                break;
            }
            if selected[i].is_some() {
                continue;
            }
            selected[i] = Some(DeletionReason::QuotaExceeded);
            projected -= i128::from(order[i].size_bytes);
        }
    }

    let mut protected = Vec::new();
    let mut retained = Vec::new();
    let mut candidates = Vec::new();
    let mut orphans = Vec::new();

    for (i, (job, reason)) in order.iter().zip(selected).enumerate() {
        if job.metadata_status.is_orphan() {
            orphans.push(job.job_id.clone());
        }
        match reason {
            Some(reason) => candidates.push(DeletionCandidate::new((*job).clone(), reason)),
            None if i >= protected_from => protected.push(job.job_id.clone()),
            None => retained.push(job.job_id.clone()),
        }
    }

    Evaluation {
        protected,
        retained,
        candidates,
        orphans,
        total_bytes,
        projected_bytes: u64::try_from(projected.max(0)).unwrap_or(u64::MAX),
    }
}

pub fn full_wipe(jobs: &[JobRecord]) -> Vec<DeletionCandidate> {
    jobs.iter()
        .map(|job| DeletionCandidate::new(job.clone(), DeletionReason::ManualFullCleanup))
        .collect()
}
