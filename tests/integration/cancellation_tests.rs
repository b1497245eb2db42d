use reclaim::config::ScanConfig;
use reclaim::duplicates::{DuplicateFinder, ScanResult};
use reclaim::progress::{ProgressTracker, ScanPhase};
use reclaim::session::{ScanSession, SessionState};
use reclaim::signal::CancelToken;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

const FILES: usize = 10_000;
const COPIES: usize = 5;

/// 10,000 files in 100 directories; every content appears exactly five times
/// and each content has its own size.
fn big_tree() -> TempDir {
    let dir = tempdir().unwrap();
    let distinct = FILES / COPIES;
    for d in 0..100 {
        let sub = dir.path().join(format!("dir{d:03}"));
        fs::create_dir(&sub).unwrap();
        for f in 0..FILES / 100 {
            let i = d * (FILES / 100) + f;
            let g = i % distinct;
            let content = vec![b'a' + (g % 26) as u8; 100 + g];
            fs::write(sub.join(format!("f{f:03}")), content).unwrap();
        }
    }
    dir
}

fn config() -> ScanConfig {
    ScanConfig::default()
        .with_minimum_file_size(1)
        .with_worker_pool_size(4)
}

/// Every surfaced group must be complete and byte-identical.
fn assert_groups_fully_resolved(result: &ScanResult) {
    for group in &result.groups {
        assert_eq!(group.len(), COPIES);
        let first = fs::read(&group.members[0].path).unwrap();
        for member in &group.members[1..] {
            assert_eq!(fs::read(&member.path).unwrap(), first);
        }
    }
}

fn find_with_cancel(
    root: &Path,
    cancel_when: impl Fn(ScanPhase, u64) -> bool + Send + Sync + 'static,
) -> ScanResult {
    let token = CancelToken::new();
    let trigger = token.clone();
    let progress = Arc::new(ProgressTracker::new(move |update| {
        if cancel_when(update.phase, update.completed) {
            trigger.cancel();
        }
    }));
    DuplicateFinder::new(config())
        .with_cancel_token(token)
        .with_progress(progress)
        .find(vec![root.to_path_buf()])
        .unwrap()
}

#[test]
fn test_cancel_mid_traversal() {
    let dir = big_tree();
    // The first walking update arrives with the first discovered file.
    let result = find_with_cancel(dir.path(), |phase, _| phase == ScanPhase::Walking);

    assert!(result.interrupted);
    assert!(result.groups.is_empty());
    assert!((result.scanned_file_count as usize) < FILES);
}

#[test]
fn test_cancel_mid_hashing_keeps_only_resolved_groups() {
    let dir = big_tree();
    let result = find_with_cancel(dir.path(), |phase, done| {
        phase == ScanPhase::Hashing && done >= FILES as u64 + 200
    });

    assert_eq!(result.scanned_file_count as usize, FILES);
    assert!(result.interrupted);
    assert!(result.groups.len() < FILES / COPIES);
    assert!(result.funnel.buckets_abandoned > 0);
    assert_groups_fully_resolved(&result);
}

#[test]
fn test_uncancelled_big_tree_is_complete() {
    let dir = big_tree();
    let result = DuplicateFinder::new(config())
        .find(vec![dir.path().to_path_buf()])
        .unwrap();

    assert!(!result.interrupted);
    assert_eq!(result.groups.len(), FILES / COPIES);
    assert_eq!(result.funnel.full_reads, 0);
    assert_groups_fully_resolved(&result);
}

#[test]
fn test_session_stop_returns_promptly() {
    let dir = big_tree();
    let session = ScanSession::new(config());
    let (started_tx, started_rx) = mpsc::sync_channel(1);
    let signalled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&signalled);
    let (done_tx, done_rx) = mpsc::channel();

    session
        .start(
            vec![dir.path().to_path_buf()],
            move |_| {
                if !flag.swap(true, Ordering::SeqCst) {
                    let _ = started_tx.send(());
                }
            },
            move |outcome| {
                let _ = done_tx.send(outcome);
            },
        )
        .unwrap();

    started_rx.recv_timeout(Duration::from_secs(60)).unwrap();
    let stop_requested = Instant::now();
    session.stop();
    let state = session.wait();
    assert!(stop_requested.elapsed() < Duration::from_secs(10));

    let outcome = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.state(), state);
    assert!(matches!(state, SessionState::Cancelled | SessionState::Completed));
    if let Some(result) = outcome.result() {
        assert_groups_fully_resolved(result);
    }
}
