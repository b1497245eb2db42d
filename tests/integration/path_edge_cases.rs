use reclaim::config::ScanConfig;
use reclaim::duplicates::DuplicateFinder;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn config() -> ScanConfig {
    ScanConfig::default().with_minimum_file_size(1)
}

fn scan(root: &std::path::Path) -> reclaim::duplicates::ScanResult {
    DuplicateFinder::new(config())
        .find(vec![root.to_path_buf()])
        .unwrap()
}

#[test]
fn test_unicode_file_names() {
    let dir = tempdir().unwrap();
    for name in ["日本語.txt", "Ünïcödé.txt", "emoji_🦀.txt"] {
        fs::write(dir.path().join(name), b"multilingual").unwrap();
    }
    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 3);
}

#[test]
fn test_names_with_spaces_and_symbols() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("My Documents").join("(old) copy #2");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("report final.pdf"), b"pdf-ish").unwrap();
    fs::write(dir.path().join("report final (1).pdf"), b"pdf-ish").unwrap();

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert!(result.groups[0]
        .members
        .iter()
        .any(|m| m.path.ends_with("My Documents/(old) copy #2/report final.pdf")));
}

#[test]
fn test_deep_nesting() {
    let dir = tempdir().unwrap();
    let mut deep = dir.path().to_path_buf();
    for i in 0..40 {
        deep.push(format!("d{i}"));
    }
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("bottom"), b"deep data").unwrap();
    fs::write(dir.path().join("top"), b"deep data").unwrap();

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
}

#[test]
fn test_files_without_extension() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Makefile"), b"all:").unwrap();
    fs::write(dir.path().join("Makefile_copy"), b"all:").unwrap();

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].file_extension(), None);
}

#[test]
fn test_hidden_files_are_scanned() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".env"), b"SECRET=1").unwrap();
    fs::write(dir.path().join(".env.bak"), b"SECRET=1").unwrap();

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
}

#[test]
fn test_member_paths_are_absolute() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"abs").unwrap();
    fs::write(dir.path().join("b"), b"abs").unwrap();

    let result = scan(dir.path());
    let paths: Vec<PathBuf> = result.groups[0]
        .members
        .iter()
        .map(|m| m.path.clone())
        .collect();
    assert!(paths.iter().all(|p| p.is_absolute()));
}
