use backup_janitor::{
    delete::{DeleteMethod, Executor, OsTrash},
    job::{DeletionCandidate, DeletionReason, JobRecord, MetadataStatus},
};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

struct RecordingTrash {
    seen: RefCell<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingTrash {
    fn new(fail: bool) -> Self {
        Self {
            seen: RefCell::new(Vec::new()),
            fail,
        }
    }
}

impl OsTrash for RecordingTrash {
    fn delete(&self, path: &Path) -> Result<(), String> {
        self.seen.borrow_mut().push(path.to_path_buf());
        if self.fail {
            Err(format!("trash unavailable for {}", path.display()))
        } else {
            fs::remove_dir_all(path).map_err(|e| e.to_string())
        }
    }
}

fn candidate(id: &str, paths: Vec<PathBuf>, size: u64) -> DeletionCandidate {
    DeletionCandidate::new(
        JobRecord {
            job_id: id.into(),
            paths,
            created_at: time::OffsetDateTime::now_utc(),
            size_bytes: size,
            metadata_status: MetadataStatus::Present,
        },
        DeletionReason::QuotaExceeded,
    )
}

fn mk_dir(path: &Path) {
    fs::create_dir_all(path.join("sub")).unwrap();
    fs::write(path.join("sub").join("f.bin"), b"payload").unwrap();
}

#[test]
fn delete_method_parsing() {
    assert_eq!(DeleteMethod::parse("hard"), DeleteMethod::Hard);
    assert_eq!(DeleteMethod::parse(" Trash "), DeleteMethod::Trash);
    assert_eq!(DeleteMethod::parse("app-trash"), DeleteMethod::AppTrash);
    assert_eq!(DeleteMethod::parse("anything"), DeleteMethod::AppTrash);
}

#[test]
fn hard_delete_removes_tree() {
    let dir = tempfile::tempdir().unwrap();
    let job = dir.path().join("job-1");
    mk_dir(&job);
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::Hard, dir.path().join(".trash"), &trash);

    let out = exec.delete(&candidate("job-1", vec![job.clone()], 7));
    assert!(out.ok(), "{:?}", out.errors);
    assert_eq!(out.deleted_bytes, 7);
    assert!(!job.exists());
    assert!(trash.seen.borrow().is_empty());
}

#[test]
fn hard_delete_of_missing_job_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::Hard, dir.path().join(".trash"), &trash);

    let out = exec.delete(&candidate("gone", vec![dir.path().join("gone")], 99));
    assert!(out.ok());
    assert_eq!(out.deleted_bytes, 99);
}

#[test]
fn os_trash_failure_leaves_path_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let job = dir.path().join("job-2");
    mk_dir(&job);
    let trash = RecordingTrash::new(true);
    let exec = Executor::new(DeleteMethod::Trash, dir.path().join(".trash"), &trash);

    let out = exec.delete(&candidate("job-2", vec![job.clone()], 5));
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].contains("trash unavailable"));
    assert_eq!(out.deleted_bytes, 5);
    assert!(job.exists(), "no fallback to hard delete");
}

#[test]
fn os_trash_skips_already_missing_paths() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("Backups").join("job-3");
    mk_dir(&present);
    let missing = dir.path().join("Reports").join("job-3");
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::Trash, dir.path().join(".trash"), &trash);

    let out = exec.delete(&candidate("job-3", vec![present.clone(), missing], 1));
    assert!(out.ok());
    assert_eq!(*trash.seen.borrow(), vec![present]);
}

#[test]
fn app_trash_moves_into_job_folder_and_avoids_collisions() {
    let dir = tempfile::tempdir().unwrap();
    let quarantine = dir.path().join(".trash");
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::AppTrash, &quarantine, &trash);

    let first = dir.path().join("Backups").join("job-4");
    mk_dir(&first);
    assert!(exec.delete(&candidate("job-4", vec![first.clone()], 1)).ok());
    assert!(!first.exists());
    assert!(quarantine.join("job-4").join("sub").join("f.bin").exists());

    // Same id again: lands next to the first one.
    mk_dir(&first);
    assert!(exec.delete(&candidate("job-4", vec![first.clone()], 1)).ok());
    assert!(!first.exists());
    let names: Vec<String> = fs::read_dir(&quarantine)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n != "job-4" && n.starts_with("job-4-")));
}

#[test]
fn app_trash_keeps_each_root_separately() {
    let dir = tempfile::tempdir().unwrap();
    let quarantine = dir.path().join(".trash");
    let backups = dir.path().join("Backups").join("job-5");
    let reports = dir.path().join("Reports").join("job-5");
    mk_dir(&backups);
    mk_dir(&reports);
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::AppTrash, &quarantine, &trash);

    let out = exec.delete(&candidate("job-5", vec![backups.clone(), reports.clone()], 2));
    assert!(out.ok(), "{:?}", out.errors);
    assert!(quarantine.join("job-5").join("Backups").join("sub").exists());
    assert!(quarantine.join("job-5").join("Reports").join("sub").exists());
    assert!(!backups.exists() && !reports.exists());
}

#[test]
fn hard_delete_error_on_one_path_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain.bin");
    fs::write(&file, b"x").unwrap();
    let job = dir.path().join("Reports").join("job-6");
    mk_dir(&job);
    let trash = RecordingTrash::new(false);
    let exec = Executor::new(DeleteMethod::Hard, dir.path().join(".trash"), &trash);

    let out = exec.delete(&candidate("job-6", vec![file.join("child"), job.clone()], 3));
    assert_eq!(out.errors.len(), 1, "{:?}", out.errors);
    assert!(out.errors[0].contains("child"));
    assert!(!job.exists());
    assert!(file.exists());
}

#[cfg(unix)]
#[test]
fn move_across_filesystems_copies_then_removes_source() {
    use backup_janitor::delete::quarantine::move_path;
    use std::os::unix::fs::MetadataExt;

    let src_root = tempfile::tempdir().unwrap();
    let Ok(dst_root) = tempfile::tempdir_in("/dev/shm") else {
        return;
    };
    let src_dev = fs::metadata(src_root.path()).unwrap().dev();
    let dst_dev = fs::metadata(dst_root.path()).unwrap().dev();
    if src_dev == dst_dev {
        return;
    }

    let src = src_root.path().join("job-7");
    mk_dir(&src);
    std::os::unix::fs::symlink("sub/f.bin", src.join("link")).unwrap();
    let dst = dst_root.path().join("job-7");

    move_path(&src, &dst).unwrap();
    assert!(!src.exists());
    assert_eq!(fs::read(dst.join("sub").join("f.bin")).unwrap(), b"payload");
    assert_eq!(
        fs::read_link(dst.join("link")).unwrap(),
        PathBuf::from("sub/f.bin")
    );
}
