use reclaim::actions::delete::{DeleteConfig, Deleter};
use reclaim::config::ScanConfig;
use reclaim::duplicates::{DuplicateFinder, KeepPolicy, RankedGroup, ScanResult};
use reclaim::error::ErrorKind;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn fixture() -> (TempDir, ScanResult) {
    let dir = tempdir().unwrap();
    for name in ["one.bin", "two.bin", "three.bin"] {
        fs::write(dir.path().join(name), vec![42u8; 5000]).unwrap();
    }
    fs::write(dir.path().join("pair_a.txt"), b"pair content").unwrap();
    fs::write(dir.path().join("pair_b.txt"), b"pair content").unwrap();
    fs::write(dir.path().join("lonely.txt"), b"nobody else").unwrap();

    let result = DuplicateFinder::new(ScanConfig::default().with_minimum_file_size(1))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.groups.len(), 2);
    (dir, result)
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_delete_all_but_one_leaves_exactly_one() {
    let (dir, result) = fixture();
    let ranked = result.ranked(Some(KeepPolicy::Oldest));
    let selected: Vec<PathBuf> = ranked
        .iter()
        .flat_map(RankedGroup::removal_candidates)
        .map(Path::to_path_buf)
        .collect();
    assert_eq!(selected.len(), 3);

    let outcome = Deleter::new(DeleteConfig::permanent()).delete(&selected, &result.groups);

    assert!(outcome.is_complete());
    assert_eq!(outcome.reclaimed_bytes, 2 * 5000 + 12);
    assert_eq!(outcome.reclaimed_bytes, result.reclaimable_bytes());
    for group in &result.groups {
        let survivors = group.paths().filter(|p| p.exists()).count();
        assert_eq!(survivors, 1);
    }
    assert_eq!(file_count(dir.path()), 3);
}

#[test]
fn test_delete_whole_group_leaves_filesystem_unchanged() {
    let (dir, result) = fixture();
    let everything: Vec<PathBuf> = result.groups[0].paths().map(Path::to_path_buf).collect();

    let outcome = Deleter::new(DeleteConfig::permanent()).delete(&everything, &result.groups);

    assert!(outcome.deleted_paths.is_empty());
    assert_eq!(outcome.reclaimed_bytes, 0);
    assert_eq!(outcome.failed_paths.len(), everything.len());
    assert!(outcome
        .failed_paths
        .values()
        .all(|f| f.kind == ErrorKind::InvariantViolation));
    assert_eq!(file_count(dir.path()), 6);
}

#[test]
fn test_valid_groups_proceed_when_another_is_rejected() {
    let (dir, result) = fixture();
    let mut selected: Vec<PathBuf> = result.groups[0].paths().map(Path::to_path_buf).collect();
    let partial_victim = result.groups[1].members[0].path.clone();
    selected.push(partial_victim.clone());

    let outcome = Deleter::new(DeleteConfig::permanent()).delete(&selected, &result.groups);

    assert_eq!(outcome.deleted_paths, vec![partial_victim.clone()]);
    assert!(!partial_victim.exists());
    assert_eq!(file_count(dir.path()), 5);
}

#[test]
fn test_second_call_sees_already_deleted_file() {
    let (_dir, result) = fixture();
    let victim = result.groups[0].members[2].path.clone();
    let deleter = Deleter::new(DeleteConfig::permanent());

    let first = deleter.delete(&[victim.clone()], &result.groups);
    assert!(first.is_complete());

    let second = deleter.delete(&[victim.clone()], &result.groups);
    assert_eq!(
        second.failed_kinds().get(victim.as_path()),
        Some(&ErrorKind::FileVanished)
    );
    assert_eq!(second.reclaimed_bytes, 0);
}

#[test]
fn test_verified_deletion_against_survivor() {
    let (_dir, result) = fixture();
    let victim = result.groups[0].members[1].path.clone();
    let deleter = Deleter::new(DeleteConfig::permanent().with_verify_content(true));

    let outcome = deleter.delete(&[victim.clone()], &result.groups);
    assert!(outcome.is_complete());
    assert!(!victim.exists());
}

#[test]
fn test_touched_file_is_refused() {
    let (_dir, result) = fixture();
    let victim = result.groups[0].members[1].path.clone();
    filetime::set_file_mtime(&victim, filetime::FileTime::from_unix_time(1_000, 0)).unwrap();

    let outcome = Deleter::new(DeleteConfig::permanent()).delete(&[victim.clone()], &result.groups);
    assert_eq!(
        outcome.failed_kinds().get(victim.as_path()),
        Some(&ErrorKind::ContentChanged)
    );
    assert!(victim.exists());

    let lenient = Deleter::new(DeleteConfig::permanent().with_verify_unchanged(false))
        .delete(&[victim.clone()], &result.groups);
    assert!(lenient.is_complete());
}

#[test]
fn test_consecutive_batches_never_empty_a_group() {
    let (_dir, result) = fixture();
    let pair = result
        .groups
        .iter()
        .find(|g| g.len() == 2)
        .unwrap()
        .clone();
    let (a, b) = (pair.members[0].path.clone(), pair.members[1].path.clone());
    let deleter = Deleter::new(DeleteConfig::permanent());

    let first = deleter.delete(&[a.clone()], &result.groups);
    assert_eq!(first.deleted_paths, vec![a.clone()]);

    let second = deleter.delete(&[b.clone()], &result.groups);
    assert!(second.deleted_paths.is_empty());
    assert_eq!(
        second.failed_kinds().get(b.as_path()),
        Some(&ErrorKind::InvariantViolation)
    );
    assert!(!a.exists());
    assert!(b.exists());
}

#[test]
fn test_survivor_falls_back_to_another_intact_copy() {
    let (_dir, result) = fixture();
    let triple = result.groups.iter().find(|g| g.len() == 3).unwrap();
    let paths: Vec<PathBuf> = triple.paths().map(Path::to_path_buf).collect();
    let deleter = Deleter::new(DeleteConfig::permanent());

    assert!(deleter.delete(&[paths[0].clone()], &result.groups).is_complete());
    let second = deleter.delete(&[paths[1].clone()], &result.groups);
    assert!(second.is_complete());
    assert!(paths[2].exists());

    let third = deleter.delete(&[paths[2].clone()], &result.groups);
    assert!(third.deleted_paths.is_empty());
    assert!(paths[2].exists());
}
