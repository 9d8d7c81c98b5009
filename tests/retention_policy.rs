use backup_janitor::{
    job::{DeletionReason, JobRecord, MetadataStatus},
    policy::{evaluate, full_wipe, RetentionPolicy},
};
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};

const GB: i64 = 1024 * 1024 * 1024;

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
}

fn mk_job(id: &str, age: Duration, size: u64) -> JobRecord {
    JobRecord {
        job_id: id.into(),
        paths: vec![PathBuf::from("/backups").join(id)],
        created_at: now() - age,
        size_bytes: size,
        metadata_status: MetadataStatus::Present,
    }
}

fn policy(days: f64, quota: i64, keep: usize) -> RetentionPolicy {
    RetentionPolicy {
        retention_days: days,
        quota_bytes: quota,
        min_keep_count: keep,
        check_orphans: false,
    }
}

fn ids(jobs: &[backup_janitor::job::DeletionCandidate]) -> Vec<&str> {
    jobs.iter().map(|c| c.job.job_id.as_str()).collect()
}

#[test]
fn recent_jobs_within_keep_count_are_untouched() {
    let jobs: Vec<_> = (0..25)
        .map(|i| mk_job(&format!("job-{i:02}"), Duration::minutes(30 + i), 1000))
        .collect();
    let eval = evaluate(&jobs, &policy(30.0, 100 * GB, 20), now());
    assert!(eval.is_empty());
    assert_eq!(eval.protected.len(), 20);
    assert_eq!(eval.retained.len(), 5);
}

#[test]
fn single_expired_job_is_selected_by_age() {
    let jobs = vec![mk_job("old", Duration::days(31), 10)];
    let eval = evaluate(&jobs, &policy(30.0, 100 * GB, 0), now());
    assert_eq!(ids(&eval.candidates), vec!["old"]);
    assert_eq!(eval.candidates[0].reason, DeletionReason::RetentionAgeExceeded);
}

#[test]
fn age_boundary_is_kept() {
    let jobs = vec![
        mk_job("exact", Duration::days(30), 10),
        mk_job("over", Duration::days(30) + Duration::milliseconds(1), 10),
    ];
    let eval = evaluate(&jobs, &policy(30.0, 100 * GB, 0), now());
    assert_eq!(ids(&eval.candidates), vec!["over"]);
}

#[test]
fn quota_evicts_oldest_first_until_it_fits() {
    let jobs: Vec<_> = (0..10)
        .map(|i| mk_job(&format!("job-{i}"), Duration::hours(10 - i), 100))
        .collect();
    let eval = evaluate(&jobs, &policy(30.0, 600, 0), now());
    assert_eq!(ids(&eval.candidates), vec!["job-0", "job-1", "job-2", "job-3"]);
    assert!(eval
        .candidates
        .iter()
        .all(|c| c.reason == DeletionReason::QuotaExceeded));
    assert_eq!(eval.projected_bytes, 600);
    assert_eq!(eval.retained.len(), 6);
}

#[test]
fn quota_only_adds_beyond_age_evictions() {
    let jobs = vec![
        mk_job("a", Duration::days(40), 300),
        mk_job("b", Duration::days(2), 300),
        mk_job("c", Duration::days(1), 300),
        mk_job("d", Duration::hours(1), 300),
    ];
    // 1200 total, age removes "a" -> 900, quota 600 then removes "b".
    let eval = evaluate(&jobs, &policy(30.0, 600, 0), now());
    assert_eq!(ids(&eval.candidates), vec!["a", "b"]);
    assert_eq!(eval.candidates[0].reason, DeletionReason::RetentionAgeExceeded);
    assert_eq!(eval.candidates[1].reason, DeletionReason::QuotaExceeded);
}

#[test]
fn protected_jobs_survive_any_pressure() {
    let jobs: Vec<_> = (0..6)
        .map(|i| mk_job(&format!("job-{i}"), Duration::days(100 - i), 1000))
        .collect();
    let eval = evaluate(&jobs, &policy(1.0, 0, 3), now());
    assert_eq!(ids(&eval.candidates), vec!["job-0", "job-1", "job-2"]);
    assert_eq!(eval.protected, vec!["job-3", "job-4", "job-5"]);
}

#[test]
fn orphans_only_selected_when_checked() {
    let mut orphan = mk_job("orphan", Duration::days(1), 10);
    orphan.metadata_status = MetadataStatus::Corrupt;
    let jobs = vec![orphan, mk_job("fine", Duration::hours(2), 10)];

    let mut p = policy(30.0, 100 * GB, 0);
    let eval = evaluate(&jobs, &p, now());
    assert!(eval.is_empty());
    assert_eq!(eval.orphans, vec!["orphan"]);

    p.check_orphans = true;
    let eval = evaluate(&jobs, &p, now());
    assert_eq!(ids(&eval.candidates), vec!["orphan"]);
    assert_eq!(eval.candidates[0].reason, DeletionReason::Orphan);
}

#[test]
fn negative_quota_adds_no_deletions() {
    let jobs: Vec<_> = (0..5)
        .map(|i| mk_job(&format!("j{i}"), Duration::hours(5 - i), 10))
        .collect();
    let eval = evaluate(&jobs, &policy(30.0, -1, 1), now());
    assert!(eval.candidates.is_empty());
    assert_eq!(eval.protected, vec!["j4"]);
    assert_eq!(eval.retained.len(), 4);

    // Age-selected jobs are still evicted.
    let mut jobs = jobs;
    jobs.push(mk_job("stale", Duration::days(40), 10));
    let eval = evaluate(&jobs, &policy(30.0, -1, 1), now());
    assert_eq!(ids(&eval.candidates), vec!["stale"]);
    assert_eq!(eval.candidates[0].reason, DeletionReason::RetentionAgeExceeded);
}

#[test]
fn second_evaluation_of_survivors_selects_nothing() {
    let jobs: Vec<_> = (0..12)
        .map(|i| mk_job(&format!("job-{i:02}"), Duration::days(45 - 4 * i), 250))
        .collect();
    let p = policy(30.0, 1000, 2);
    let first = evaluate(&jobs, &p, now());
    assert!(!first.is_empty());

    let deleted: Vec<&str> = ids(&first.candidates);
    let survivors: Vec<JobRecord> = jobs
        .iter()
        .filter(|j| !deleted.contains(&j.job_id.as_str()))
        .cloned()
        .collect();
    let second = evaluate(&survivors, &p, now());
    assert!(second.is_empty());
}

#[test]
fn candidates_come_back_oldest_first_regardless_of_pass() {
    let mut orphan = mk_job("young-orphan", Duration::days(3), 10);
    orphan.metadata_status = MetadataStatus::Missing;
    let jobs = vec![
        orphan,
        mk_job("ancient", Duration::days(90), 10),
        mk_job("newest", Duration::hours(1), 10),
    ];
    let mut p = policy(30.0, 100 * GB, 1);
    p.check_orphans = true;
    let eval = evaluate(&jobs, &p, now());
    assert_eq!(ids(&eval.candidates), vec!["ancient", "young-orphan"]);
}

#[test]
fn full_wipe_marks_everything() {
    let jobs: Vec<_> = (0..3)
        .map(|i| mk_job(&format!("job-{i}"), Duration::hours(i), 10))
        .collect();
    let all = full_wipe(&jobs);
    assert_eq!(all.len(), 3);
    assert!(all
        .iter()
        .all(|c| c.reason == DeletionReason::ManualFullCleanup));
}
