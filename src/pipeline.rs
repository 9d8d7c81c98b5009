use crate::{
    audit::{self, AuditBlock},
    delete::Executor,
    job::DeletionCandidate,
    policy::{self, Evaluation, RetentionPolicy},
    progress::{NoProgress, ProgressEvent, ProgressSink, RunState},
    report::{BackupStatus, CleanupResult, DeletionReport},
    scan::{self, JobRoots, ScanError, ScanOptions},
    store::SummaryStore,
    util::{format_rfc3339, human_bytes},
};
use std::cell::Cell;
use std::path::PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// One cleanup engine over one directory set.
pub struct Cleanup<'a> {
    roots: JobRoots,
    scan_opts: ScanOptions,
    policy: RetentionPolicy,
    executor: Executor<'a>,
    store: &'a dyn SummaryStore,
    progress: &'a dyn ProgressSink,
    audit_log: Option<PathBuf>,
    state: Cell<RunState>,
}

impl<'a> Cleanup<'a> {
    pub fn new(
        roots: JobRoots,
        policy: RetentionPolicy,
        executor: Executor<'a>,
        store: &'a dyn SummaryStore,
    ) -> Self {
        Self {
            roots,
            scan_opts: ScanOptions::default(),
            policy,
            executor,
            store,
            progress: &NoProgress,
            audit_log: None,
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn with_scan_options(mut self, opts: ScanOptions) -> Self {
        self.scan_opts = opts;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_audit_log(mut self, path: Option<PathBuf>) -> Self {
        self.audit_log = path;
        self
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    fn enter(&self, state: RunState) {
        debug!("cleanup {} -> {}", self.state.get(), state);
        self.state.set(state);
    }

    fn notify(&self, state: RunState, message: String) {
        self.enter(state);
        self.progress.emit(&ProgressEvent::new(state, message));
    }

    pub fn plan(&self, now: OffsetDateTime) -> Result<Evaluation, CleanupError> {
        let jobs = scan::scan(&self.roots, &self.scan_opts)?;
        Ok(policy::evaluate(&jobs, &self.policy, now))
    }

    pub fn run(&self, now: OffsetDateTime) -> Result<CleanupResult, CleanupError> {
        self.notify(RunState::Scanning, "Scanning backup jobs".into());
        let jobs = match scan::scan(&self.roots, &self.scan_opts) {
            Ok(jobs) => jobs,
            Err(err) => {
                self.enter(RunState::Idle);
                return Err(err.into());
            }
        };

        self.enter(RunState::Evaluating);
        let eval = policy::evaluate(&jobs, &self.policy, now);
        info!(
            "evaluated {} jobs: protected={} retained={} delete={} orphans={} total={} projected={}",
            jobs.len(),
            eval.protected.len(),
            eval.retained.len(),
            eval.candidates.len(),
            eval.orphans.len(),
            human_bytes(eval.total_bytes),
            human_bytes(eval.projected_bytes)
        );

        let protected = eval.protected.len();
        let orphans = self.policy.check_orphans.then_some(eval.orphans.as_slice());
        let result = self.execute(eval.candidates, now);
        self.finish(
            result,
            AuditContext {
                policy: Some(&self.policy),
                scanned: jobs.len(),
                protected,
                orphans,
            },
        )
    }

    pub fn wipe(&self, now: OffsetDateTime) -> Result<CleanupResult, CleanupError> {
        self.notify(RunState::Scanning, "Scanning backup jobs for full cleanup".into());
        let jobs = match scan::scan(&self.roots, &self.scan_opts) {
            Ok(jobs) => jobs,
            Err(err) => {
                self.enter(RunState::Idle);
                return Err(err.into());
            }
        };
        self.enter(RunState::Evaluating);
        let candidates = policy::full_wipe(&jobs);
        warn!("full cleanup selected all {} jobs", candidates.len());

        let result = self.execute(candidates, now);
        self.finish(
            result,
            AuditContext {
                policy: None,
                scanned: jobs.len(),
                protected: 0,
                orphans: None,
            },
        )
    }

    pub fn status(&self) -> Result<BackupStatus, CleanupError> {
        let jobs = scan::scan(&self.roots, &self.scan_opts)?;
        let last_run = match self.store.last_summary() {
            Ok(s) => s,
            Err(err) => {
                warn!("cannot read last cleanup summary: {err}");
                None
            }
        };
        Ok(BackupStatus {
            job_count: jobs.len(),
            total_bytes: jobs.iter().map(|j| j.size_bytes).sum(),
            orphan_count: jobs
                .iter()
                .filter(|j| j.metadata_status.is_orphan())
                .count(),
            oldest_created_at: jobs.first().map(|j| format_rfc3339(j.created_at)),
            newest_created_at: jobs.last().map(|j| format_rfc3339(j.created_at)),
            quota_bytes: self.policy.quota_bytes,
            last_run,
        })
    }

    fn execute(&self, mut candidates: Vec<DeletionCandidate>, now: OffsetDateTime) -> CleanupResult {
        let total = candidates.len();
        let mut deletions = Vec::with_capacity(total);

        for (i, cand) in candidates.iter_mut().enumerate() {
            let state = RunState::Deleting {
                index: i + 1,
                total,
            };
            self.notify(
                state,
                format!("Deleting {} ({}/{}, {})", cand.job.job_id, i + 1, total, cand.reason),
            );

            let outcome = self.executor.delete(cand);
            if outcome.ok() {
                info!(
                    "deleted {} reason={} method={} bytes={}",
                    cand.job.job_id,
                    cand.reason,
                    self.executor.method().as_str(),
                    outcome.deleted_bytes
                );
            } else {
                for e in &outcome.errors {
                    error!("delete {} failed: {e}", cand.job.job_id);
                }
            }
            cand.errors = outcome.errors;

            deletions.push(DeletionReport {
                job_id: cand.job.job_id.clone(),
                reason: cand.reason,
                size_bytes: outcome.deleted_bytes,
                errors: cand.errors.clone(),
            });
        }

        self.enter(RunState::Summarizing);
        CleanupResult::from_deletions(format_rfc3339(now), deletions)
    }

    fn finish(&self, mut result: CleanupResult, ctx: AuditContext<'_>) -> Result<CleanupResult, CleanupError> {
        match self.store.save_summary(&result.summary) {
            Ok(()) => result.summary_persisted = true,
            Err(err) => error!("cannot persist cleanup summary: {err}"),
        }

        if let Some(path) = &self.audit_log {
            let block = AuditBlock {
                policy: ctx.policy,
                method: self.executor.method(),
                scanned: ctx.scanned,
                protected: ctx.protected,
                orphans: ctx.orphans,
                result: &result,
            };
            if let Err(err) = audit::append(path, &block) {
                warn!("cannot append audit log: {err:#}");
            }
        }

        let s = &result.summary;
        self.notify(
            RunState::Idle,
            format!(
                "Cleanup finished: {} deleted ({}), {} errors",
                s.deleted_count,
                human_bytes(s.deleted_bytes),
                s.error_count
            ),
        );
        Ok(result)
    }
}

struct AuditContext<'a> {
    policy: Option<&'a RetentionPolicy>,
    scanned: usize,
    protected: usize,
    orphans: Option<&'a [String]>,
}
