use crate::{
    delete::DeleteMethod,
    policy::RetentionPolicy,
    report::{CleanupResult, DeletionReport},
    util::human_bytes,
};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub struct AuditBlock<'a> {
    /// `None` for a full wipe.
    pub policy: Option<&'a RetentionPolicy>,
    pub method: DeleteMethod,
    pub scanned: usize,
    pub protected: usize,
    pub orphans: Option<&'a [String]>,
    pub result: &'a CleanupResult,
}

impl AuditBlock<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let summary = &self.result.summary;
        let _ = writeln!(out, "=== cleanup run {} ===", summary.timestamp);
        match self.policy {
            Some(p) => {
                let _ = writeln!(
                    out,
                    "policy: retention_days={} quota_bytes={} min_keep_count={} check_orphans={} method={}",
                    p.retention_days,
                    p.quota_bytes,
                    p.min_keep_count,
                    p.check_orphans,
                    self.method.as_str()
                );
            }
            None => {
                let _ = writeln!(out, "policy: full wipe method={}", self.method.as_str());
            }
        }
        let _ = writeln!(out, "scanned: {} jobs, protected: {}", self.scanned, self.protected);
        if let Some(orphans) = self.orphans {
            let _ = writeln!(out, "orphan candidates: {}", orphans.len());
            for id in orphans {
                let _ = writeln!(out, "  orphan {id}");
            }
        }
        for d in &self.result.deletions {
            let _ = writeln!(out, "{}", deletion_line(d));
        }
        let _ = writeln!(
            out,
            "summary: deleted={} bytes={} ({}) errors={} ok={}",
            summary.deleted_count,
            summary.deleted_bytes,
            human_bytes(summary.deleted_bytes),
            summary.error_count,
            self.result.ok
        );
        out
    }
}

fn deletion_line(d: &DeletionReport) -> String {
    if d.errors.is_empty() {
        format!("delete {} reason={} bytes={} -> ok", d.job_id, d.reason, d.size_bytes)
    } else {
        format!(
            "delete {} reason={} bytes={} -> FAILED: {}",
            d.job_id,
            d.reason,
            d.size_bytes,
            d.errors.join("; ")
        )
    }
}

pub fn append(path: &Path, block: &AuditBlock<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        crate::util::ensure_dir(parent)?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log: {}", path.display()))?;
    writeln!(f, "{}", block.render())
        .with_context(|| format!("write audit log: {}", path.display()))?;
    Ok(())
}
