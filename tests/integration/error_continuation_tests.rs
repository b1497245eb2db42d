use reclaim::config::ScanConfig;
use reclaim::duplicates::{DuplicateFinder, FinderError};
use reclaim::error::ErrorKind;
use std::fs;
use tempfile::tempdir;

fn config() -> ScanConfig {
    ScanConfig::default().with_minimum_file_size(1)
}

#[test]
fn test_one_missing_root_fails_whole_scan() {
    let dir = tempdir().unwrap();
    let err = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf(), dir.path().join("gone")])
        .unwrap_err();
    assert!(matches!(err, FinderError::Root(_)));
    assert_eq!(err.kind(), Some(ErrorKind::RootNotFound));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped_and_recorded() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(dir.path().join(name), b"identical bytes").unwrap();
    }
    let locked = dir.path().join("c");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    // Running as root bypasses permission bits.
    let readable = fs::read(&locked).is_ok();

    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(result.groups.len(), 1);
    if readable {
        assert_eq!(result.groups[0].len(), 3);
    } else {
        assert_eq!(result.groups[0].len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::PathUnreadable);
        assert!(result.errors[0].path.ends_with("c"));
        assert_eq!(result.funnel.failed_reads, 1);
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_does_not_abort() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"dup").unwrap();
    fs::write(dir.path().join("b"), b"dup").unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("c"), b"dup").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    let readable = fs::read_dir(&locked).is_ok();

    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(result.groups.len(), 1);
    if !readable {
        assert_eq!(result.groups[0].len(), 2);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::PathUnreadable));
    }
}
