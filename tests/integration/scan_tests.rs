use reclaim::config::ScanConfig;
use reclaim::duplicates::{DuplicateFinder, ScanResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn config() -> ScanConfig {
    ScanConfig::default()
        .with_minimum_file_size(1)
        .with_worker_pool_size(4)
}

fn scan(root: &Path) -> ScanResult {
    DuplicateFinder::new(config())
        .find(vec![root.to_path_buf()])
        .unwrap()
}

fn names(paths: impl Iterator<Item = PathBuf>) -> Vec<String> {
    paths
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let result = scan(dir.path());

    assert!(result.groups.is_empty());
    assert_eq!(result.scanned_file_count, 0);
    assert!(!result.has_errors());
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"content a").unwrap();
    fs::write(dir.path().join("b.txt"), b"content b").unwrap();
    fs::write(dir.path().join("c.txt"), b"content c").unwrap();

    let result = scan(dir.path());
    assert!(result.groups.is_empty());
    assert_eq!(result.scanned_file_count, 3);
    assert_eq!(result.funnel.eliminated_by_partial, 3);
    assert_eq!(result.funnel.full_reads, 0);
}

#[test]
fn test_reference_scenario() {
    let dir = tempdir().unwrap();
    let x: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    let y: Vec<u8> = (0..1024u32).map(|i| (i % 13) as u8).collect();
    fs::write(dir.path().join("f1"), &x).unwrap();
    fs::write(dir.path().join("f2"), &x).unwrap();
    fs::write(dir.path().join("f3"), &y).unwrap();
    fs::write(dir.path().join("f4"), [x.as_slice(), x.as_slice()].concat()).unwrap();

    let result = scan(dir.path());

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(names(group.paths().map(Path::to_path_buf)), vec!["f1", "f2"]);
    assert_eq!(group.reclaimable_size(), 1024);
    assert_eq!(result.reclaimable_bytes(), 1024);
    for name in ["f3", "f4"] {
        assert!(!group.contains(&group.members[0].path.with_file_name(name)));
    }
}

#[test]
fn test_no_false_positives_by_rereading() {
    let dir = tempdir().unwrap();
    let mut block = vec![7u8; 64 * 1024];
    for i in 0..6 {
        fs::write(dir.path().join(format!("same_{i}")), &block).unwrap();
    }
    // Same size, same prefix and suffix, different middle.
    for i in 0..3 {
        block[32 * 1024] = i as u8 + 100;
        fs::write(dir.path().join(format!("mid_{i}")), &block).unwrap();
    }

    let result = scan(dir.path());
    for group in &result.groups {
        let first = fs::read(&group.members[0].path).unwrap();
        for member in &group.members[1..] {
            assert_eq!(fs::read(&member.path).unwrap(), first);
        }
    }
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 6);
    assert_eq!(result.funnel.eliminated_by_full, 3);
}

#[test]
fn test_no_false_negatives() {
    let dir = tempdir().unwrap();
    let mut expected: HashMap<Vec<u8>, Vec<PathBuf>> = HashMap::new();
    for i in 0..40u32 {
        let content = format!("payload number {}", i % 8).into_bytes();
        let sub = dir.path().join(format!("d{}", i % 5));
        fs::create_dir_all(&sub).unwrap();
        let path = sub.join(format!("file{i}"));
        fs::write(&path, &content).unwrap();
        expected.entry(content).or_default().push(path);
    }

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 8);
    for paths in expected.values() {
        let owner = result
            .groups
            .iter()
            .find(|g| g.paths().any(|p| p.ends_with(paths[0].strip_prefix(dir.path()).unwrap())))
            .expect("every duplicated content forms a group");
        assert_eq!(owner.len(), paths.len());
    }
}

#[test]
fn test_singletons_never_surface() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("unique_size"), b"only one of these sizes").unwrap();
    fs::write(dir.path().join("s1"), b"AAAA").unwrap();
    fs::write(dir.path().join("s2"), b"BBBB").unwrap();
    fs::write(dir.path().join("d1"), b"dupe").unwrap();
    fs::write(dir.path().join("d2"), b"dupe").unwrap();

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
    let grouped = names(result.groups[0].paths().map(Path::to_path_buf));
    assert_eq!(grouped, vec!["d1", "d2"]);
    assert!(result.groups.iter().all(|g| g.len() >= 2));
}

#[test]
fn test_monotonic_cost_funnel() {
    let dir = tempdir().unwrap();
    for i in 0..20u32 {
        fs::write(dir.path().join(format!("u{i}")), vec![i as u8; 100 + i as usize]).unwrap();
    }
    for i in 0..10u32 {
        fs::write(dir.path().join(format!("p{i}")), vec![i as u8; 50_000]).unwrap();
    }
    for i in 0..4 {
        fs::write(dir.path().join(format!("dup{i}")), vec![9u8; 20_000]).unwrap();
    }

    let result = scan(dir.path());
    let funnel = &result.funnel;
    assert!(funnel.full_reads <= funnel.partial_reads);
    assert!(funnel.partial_reads <= funnel.size_compared);
    assert_eq!(funnel.size_compared, 34);
    assert_eq!(funnel.partial_reads, 14);
    assert_eq!(funnel.full_reads, 4);
    assert_eq!(result.groups.len(), 1);
}

#[test]
fn test_idempotent_rescan() {
    let dir = tempdir().unwrap();
    for i in 0..12u32 {
        let sub = dir.path().join(format!("sub{}", i % 3));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("f{i}.dat")), vec![(i % 4) as u8; 3000]).unwrap();
    }

    let first = scan(dir.path());
    let second = scan(dir.path());
    assert_eq!(first.groups, second.groups);
    assert_eq!(first.groups.len(), 4);
}

#[test]
fn test_default_minimum_size_skips_small_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"small dupe").unwrap();
    fs::write(dir.path().join("b"), b"small dupe").unwrap();

    let result = DuplicateFinder::new(ScanConfig::default())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert!(result.groups.is_empty());
    assert_eq!(result.scanned_file_count, 0);
}

#[test]
fn test_large_files_stream_in_chunks() {
    let dir = tempdir().unwrap();
    let content: Vec<u8> = (0..3_000_000u32).map(|i| (i % 253) as u8).collect();
    fs::write(dir.path().join("big1.iso"), &content).unwrap();
    fs::write(dir.path().join("big2.iso"), &content).unwrap();

    let result = DuplicateFinder::new(config().with_read_chunk(4096))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].file_extension().as_deref(), Some("iso"));
    assert_eq!(result.reclaimable_bytes(), 3_000_000);
    assert!(result.funnel.bytes_read >= 6_000_000);
}

#[test]
fn test_excluded_paths_are_not_scanned() {
    let dir = tempdir().unwrap();
    let skip = dir.path().join("skip");
    fs::create_dir(&skip).unwrap();
    fs::write(dir.path().join("a"), b"shared").unwrap();
    fs::write(skip.join("b"), b"shared").unwrap();

    let result = DuplicateFinder::new(config().with_excluded_paths(vec![skip]))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert!(result.groups.is_empty());
    assert_eq!(result.scanned_file_count, 1);
}

#[test]
fn test_partial_window_setting_is_honoured() {
    let dir = tempdir().unwrap();
    let mut a = vec![1u8; 10_000];
    let b = a.clone();
    a[5_000] = 2;
    fs::write(dir.path().join("a"), &a).unwrap();
    fs::write(dir.path().join("b"), &b).unwrap();

    // A window wide enough to cover the whole file resolves in the partial phase.
    let wide = DuplicateFinder::new(config().with_partial_hash_window(20_000))
        .find(vec![dir.path().to_path_buf()])
        .unwrap();
    assert!(wide.groups.is_empty());
    assert_eq!(wide.funnel.full_reads, 0);

    let narrow = scan(dir.path());
    assert!(narrow.groups.is_empty());
    assert_eq!(narrow.funnel.full_reads, 2);
}
