use crate::util::path_safe_timestamp;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub fn move_job(job_id: &str, paths: &[PathBuf], root: &Path, now: OffsetDateTime) -> Vec<String> {
    let present: Vec<&PathBuf> = paths
        .iter()
        .filter(|p| !matches!(fs::symlink_metadata(p), Err(e) if e.kind() == ErrorKind::NotFound))
        .collect();
    if present.is_empty() {
        return Vec::new();
    }

    if let Err(e) = fs::create_dir_all(root) {
        return vec![format!("create quarantine root {}: {e}", root.display())];
    }
    let dest = unique_dir(root, job_id, now);

    if let [only] = present.as_slice() {
        return match move_path(only, &dest) {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("move {} to {}: {e}", only.display(), dest.display())],
        };
    }

    if let Err(e) = fs::create_dir_all(&dest) {
        return vec![format!("create {}: {e}", dest.display())];
    }
    let mut errors = Vec::new();
    for (i, src) in present.iter().enumerate() {
        let label = src
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("part-{i}"));
        let mut target = dest.join(&label);
        if target.exists() {
            target = dest.join(format!("{label}-{i}"));
        }
        if let Err(e) = move_path(src, &target) {
            errors.push(format!("move {} to {}: {e}", src.display(), target.display()));
        }
    }
    errors
}

pub fn unique_dir(root: &Path, job_id: &str, now: OffsetDateTime) -> PathBuf {
    let plain = root.join(job_id);
    if !plain.exists() {
        return plain;
    }
    let stamped = format!("{job_id}-{}", path_safe_timestamp(now));
    let mut candidate = root.join(&stamped);
    let mut n = 1u32;
    while candidate.exists() {
        candidate = root.join(format!("{stamped}-{n}"));
        n += 1;
    }
    candidate
}

/// Rename, falling back to copy + remove when the rename crosses filesystems.
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            debug!("cross-device move {} -> {}", src.display(), dst.display());
            if let Err(copy_err) = copy_recursive(src, dst) {
                if let Err(e) = remove_any(dst) {
                    warn!("cannot clean partial copy {}: {e}", dst.display());
                }
                return Err(copy_err);
            }
            remove_any(src)
        }
        Err(err) => Err(err),
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
        Ok(())
    } else if meta.file_type().is_symlink() {
        copy_symlink(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ())
    }
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

fn remove_any(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::from_epoch_millis;

    #[test]
    fn unique_dir_suffixes_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let now = from_epoch_millis(1_700_000_000_000).unwrap();

        let first = unique_dir(dir.path(), "job-1", now);
        assert_eq!(first, dir.path().join("job-1"));
        fs::create_dir(&first).unwrap();

        let second = unique_dir(dir.path(), "job-1", now);
        assert_ne!(second, first);
        assert!(second.file_name().unwrap().to_string_lossy().starts_with("job-1-2023-11-14T"));
        fs::create_dir(&second).unwrap();

        let third = unique_dir(dir.path(), "job-1", now);
        assert!(third.to_string_lossy().ends_with("-1"));
    }

    #[test]
    fn copy_recursive_preserves_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.bin"), b"abc").unwrap();
        fs::write(src.join("nested").join("b.bin"), b"de").unwrap();

        let dst = dir.path().join("dst");
        copy_recursive(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("a.bin")).unwrap(), b"abc");
        assert_eq!(fs::read(dst.join("nested").join("b.bin")).unwrap(), b"de");
    }
}
