#![cfg(unix)]

use reclaim::config::ScanConfig;
use reclaim::duplicates::DuplicateFinder;
use std::fs;
use std::os::unix::fs::symlink;
use tempfile::tempdir;

fn config() -> ScanConfig {
    ScanConfig::default().with_minimum_file_size(1)
}

#[test]
fn test_hardlinks_count_once() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("original"), b"linked content").unwrap();
    fs::hard_link(dir.path().join("original"), dir.path().join("alias")).unwrap();

    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.scanned_file_count, 1);
    assert!(result.groups.is_empty());
}

#[test]
fn test_hardlink_plus_real_copy() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"linked content").unwrap();
    fs::hard_link(dir.path().join("a"), dir.path().join("b")).unwrap();
    fs::write(dir.path().join("c"), b"linked content").unwrap();

    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.groups.len(), 1);
    let names: Vec<_> = result.groups[0]
        .members
        .iter()
        .map(|m| m.path.file_name().unwrap().to_owned())
        .collect();
    // Discovery is name-ordered, so the first link name wins.
    assert_eq!(names, ["a", "c"]);
}

#[test]
fn test_symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("x"), b"payload").unwrap();
    fs::write(dir.path().join("y"), b"payload").unwrap();
    symlink(dir.path(), sub.join("back")).unwrap();
    symlink(&sub, sub.join("self")).unwrap();

    let result = DuplicateFinder::new(config().with_symlinked_files(true))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.scanned_file_count, 2);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
}

#[test]
fn test_symlinked_files_excluded_by_default() {
    let outside = tempdir().unwrap();
    let root = tempdir().unwrap();
    fs::write(outside.path().join("target"), b"shared bytes").unwrap();
    fs::write(root.path().join("copy"), b"shared bytes").unwrap();
    symlink(outside.path().join("target"), root.path().join("link")).unwrap();

    let result = DuplicateFinder::new(config())
        .find(vec![root.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.scanned_file_count, 1);
    assert!(result.groups.is_empty());

    let result = DuplicateFinder::new(config().with_symlinked_files(true))
        .find(vec![root.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
}

#[test]
fn test_symlink_to_scanned_file_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("real"), b"only one copy").unwrap();
    symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

    let result = DuplicateFinder::new(config().with_symlinked_files(true))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert!(result.groups.is_empty());
}

#[test]
fn test_dangling_symlink_ignored() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"same").unwrap();
    fs::write(dir.path().join("b"), b"same").unwrap();
    symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();

    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.groups.len(), 1);
    assert!(result.errors.is_empty());
}

#[test]
fn test_deleting_symlinked_member_removes_only_the_link() {
    use reclaim::actions::delete::{DeleteConfig, Deleter};

    let outside = tempdir().unwrap();
    let root = tempdir().unwrap();
    let target = outside.path().join("target");
    fs::write(&target, b"shared bytes").unwrap();
    fs::write(root.path().join("copy"), b"shared bytes").unwrap();
    symlink(&target, root.path().join("link")).unwrap();

    let result = DuplicateFinder::new(config().with_symlinked_files(true))
        .find(vec![root.path().to_path_buf()])
        .unwrap();
    let group = &result.groups[0];
    let link = group
        .members
        .iter()
        .find(|m| m.is_symlink)
        .unwrap()
        .path
        .clone();

    let outcome = Deleter::new(DeleteConfig::permanent()).delete(&[link.clone()], &result.groups);

    assert!(outcome.is_complete());
    assert_eq!(outcome.reclaimed_bytes, 0);
    assert!(fs::symlink_metadata(&link).is_err());
    assert!(target.exists());
    assert!(root.path().join("copy").exists());
}
