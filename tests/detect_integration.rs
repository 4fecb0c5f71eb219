//! End-to-end detection and auto-fix against real repositories.

mod common;

use common::{commit, git, init_repo, Mirror};
use tempfile::TempDir;

use trisync::core::lock::RepoLock;
use trisync::core::types::{BranchName, Oid};
use trisync::doctor::{auto_fix, suggest_fixes, AutoFixError, AutoFixOptions, ScenarioId};
use trisync::engine::{
    BranchId, CorruptionId, DetectOptions, Detector, ExistenceId, Operation, Remotes, SyncId,
    WorkingTreeId,
};

fn main_branch() -> BranchName {
    BranchName::new("main").unwrap()
}

// =============================================================================
// Existence
// =============================================================================

#[tokio::test]
async fn fresh_repository_without_remotes_is_e4() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path());

    let detector = Detector::new(dir.path(), Remotes::default(), DetectOptions::default());
    let state = detector.detect().await.unwrap();

    assert_eq!(state.existence.id(), ExistenceId::E4);
    assert_eq!(state.working_tree.as_ref().unwrap().id(), WorkingTreeId::W1);
    assert_eq!(state.default_branch, Some(main_branch()));
    assert!(state.sync.is_none());
    assert!(state.data_is_fresh);

    let fixes = suggest_fixes(&state);
    assert!(fixes.iter().all(|f| !f.auto_fixable));
    assert_eq!(
        fixes.iter().filter(|f| f.id.action() == "configure").count(),
        2
    );
    // With no remotes, main itself is a local-only branch.
    assert!(fixes.iter().any(|f| f.id.as_str() == "B4:publish:main"));
}

#[tokio::test]
async fn missing_github_remote_is_e2() {
    let mirror = Mirror::new();
    git(&mirror.local(), &["remote", "remove", "github"]);

    let state = mirror.detector().detect().await.unwrap();
    assert_eq!(state.existence.id(), ExistenceId::E2);
    assert!(!state.existence.github.configured);
    // github is projected onto local, so an identical core is in sync.
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S1);
}

#[tokio::test]
async fn missing_local_path_is_reported_not_an_error() {
    let dir = TempDir::new().unwrap();
    let detector = Detector::new(
        dir.path().join("absent"),
        Remotes::default(),
        DetectOptions::default(),
    );
    let state = detector.detect().await.unwrap();
    assert_eq!(state.existence.id(), ExistenceId::E8);
    assert!(state.working_tree.is_none());
}

#[tokio::test]
async fn detection_from_subdirectory_finds_work_tree() {
    let mirror = Mirror::new();
    let nested = mirror.local().join("src");
    std::fs::create_dir_all(&nested).unwrap();
    mirror.commit_local("f.txt", "one\n");

    let detector = Detector::new(&nested, Remotes::default(), DetectOptions::default());
    let state = detector.detect().await.unwrap();
    assert_eq!(state.existence.id(), ExistenceId::E1);
    assert_eq!(
        state.repo_path.canonicalize().unwrap(),
        mirror.local().canonicalize().unwrap()
    );
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S2);
}

// =============================================================================
// Sync
// =============================================================================

#[tokio::test]
async fn ahead_of_both_is_pushed_back_to_sync() {
    let mirror = Mirror::new();
    for i in 0..3 {
        mirror.commit_local(&format!("f{i}.txt"), "local\n");
    }

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    let sync = state.sync.as_ref().unwrap();
    assert_eq!(sync.id(), SyncId::S2);
    assert_eq!(sync.pairs.local_core.unwrap().ahead, 3);

    let fixes = suggest_fixes(&state);
    let push = fixes
        .iter()
        .find(|f| f.id.as_str() == "S2:push:core")
        .unwrap();
    assert!(push.auto_fixable);
    assert!(matches!(push.operation, Some(Operation::Push { .. })));

    let report = auto_fix(&detector, &state, &AutoFixOptions::default())
        .await
        .unwrap();
    assert_eq!(report.applied.len(), 2, "{:?}", report.errors);
    assert!(report.errors.is_empty());
    assert!(report.converged);
    assert_eq!(report.final_state.sync.as_ref().unwrap().id(), SyncId::S1);

    let local_tip = git(&mirror.local(), &["rev-parse", "main"]);
    let core_tip = git(&mirror.remote_dir("core"), &["rev-parse", "main"]);
    assert_eq!(local_tip, core_tip);
}

#[tokio::test]
async fn behind_both_fast_forwards_checked_out_branch() {
    let mirror = Mirror::new();
    mirror.commit_remote("core", &["upstream.txt"], Some("github"));

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S4);

    let report = auto_fix(&detector, &state, &AutoFixOptions::default())
        .await
        .unwrap();
    assert_eq!(
        report.applied.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        vec!["S4:fast-forward:core"]
    );
    assert_eq!(report.final_state.sync.as_ref().unwrap().id(), SyncId::S1);
    assert!(mirror.local().join("upstream.txt").exists());
}

#[tokio::test]
async fn core_leading_is_fast_forwarded_then_mirrored() {
    let mirror = Mirror::new();
    mirror.commit_remote("core", &["core-only.txt"], None);

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S5);

    let report = auto_fix(&detector, &state, &AutoFixOptions::default())
        .await
        .unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.applied.len(), 2);
    assert!(report.converged);
    assert_eq!(report.final_state.sync.as_ref().unwrap().id(), SyncId::S1);
}

#[tokio::test]
async fn divergence_is_never_auto_fixed() {
    let mirror = Mirror::new();
    mirror.commit_remote("core", &["r1.txt", "r2.txt"], Some("github"));
    mirror.commit_local("mine.txt", "local\n");

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    let sync = state.sync.as_ref().unwrap();
    assert_eq!(sync.id(), SyncId::S10);
    let local_core = sync.pairs.local_core.unwrap();
    assert_eq!((local_core.ahead, local_core.behind), (1, 2));

    let fixes = suggest_fixes(&state);
    assert!(fixes.iter().all(|f| !f.auto_fixable));
    assert!(fixes.iter().any(|f| f.id.as_str() == "S10:merge:main"));

    let before = git(&mirror.local(), &["rev-parse", "main"]);
    let report = auto_fix(&detector, &state, &AutoFixOptions::default())
        .await
        .unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(git(&mirror.local(), &["rev-parse", "main"]), before);
}

#[tokio::test]
async fn dirty_tree_blocks_push() {
    let mirror = Mirror::new();
    mirror.commit_local("f.txt", "one\n");
    std::fs::write(mirror.local().join("README.md"), "edited\n").unwrap();

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    assert_eq!(state.working_tree.as_ref().unwrap().id(), WorkingTreeId::W3);
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S2);

    let fixes = suggest_fixes(&state);
    let push = fixes
        .iter()
        .find(|f| f.id.as_str() == "S2:push:core")
        .unwrap();
    assert!(!push.auto_fixable);

    let options = AutoFixOptions {
        fix_id: Some(push.id.clone()),
        ..Default::default()
    };
    let err = auto_fix(&detector, &state, &options).await.unwrap_err();
    assert!(matches!(err, AutoFixError::NotAutoFixable { .. }));
}

#[tokio::test]
async fn skipped_fix_is_not_applied() {
    let mirror = Mirror::new();
    mirror.commit_local("f.txt", "one\n");

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    let options = AutoFixOptions {
        skip_ids: vec!["S2:push:github".parse().unwrap()],
        ..Default::default()
    };
    let report = auto_fix(&detector, &state, &options).await.unwrap();
    assert_eq!(
        report.applied.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        vec!["S2:push:core"]
    );
    assert_eq!(report.final_state.sync.as_ref().unwrap().id(), SyncId::S3);
}

#[tokio::test]
async fn held_lock_refuses_auto_fix() {
    let mirror = Mirror::new();
    mirror.commit_local("f.txt", "one\n");

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    let _lock = RepoLock::acquire(&mirror.local().join(".git")).unwrap();

    let err = auto_fix(&detector, &state, &AutoFixOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AutoFixError::Lock(_)));
}

// =============================================================================
// Stale data
// =============================================================================

#[tokio::test]
async fn unreachable_remote_marks_data_stale() {
    let mirror = Mirror::new();
    std::fs::rename(mirror.remote_dir("github"), mirror.root().join("moved.git")).unwrap();

    let state = mirror.detector().detect().await.unwrap();
    assert!(!state.data_is_fresh);
    assert_eq!(state.stale_remotes, vec!["github".to_string()]);
    assert_eq!(state.existence.id(), ExistenceId::E2);
    // Existing tracking refs still allow a comparison.
    assert_eq!(state.sync.as_ref().unwrap().id(), SyncId::S1);

    let fixes = suggest_fixes(&state);
    assert_eq!(fixes[0].scenario, ScenarioId::Stale);
    assert!(fixes[0].auto_fixable);
    match &fixes[0].operation {
        Some(Operation::Composite { steps, .. }) => {
            assert_eq!(
                steps,
                &vec![Operation::Fetch {
                    remote: "core".into()
                }]
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn refetch_leads_even_when_no_remote_answers() {
    let mirror = Mirror::new();
    git(&mirror.local(), &["remote", "remove", "github"]);
    std::fs::rename(mirror.remote_dir("core"), mirror.root().join("moved.git")).unwrap();

    let state = mirror.detector().detect().await.unwrap();
    assert!(!state.data_is_fresh);
    assert_eq!(state.stale_remotes, vec!["core".to_string()]);
    assert_eq!(state.existence.id(), ExistenceId::E4);

    let fixes = suggest_fixes(&state);
    assert_eq!(fixes[0].scenario, ScenarioId::Stale);
    assert!(!fixes[0].auto_fixable);
    assert!(fixes[0]
        .blocked_by
        .as_deref()
        .unwrap()
        .contains("unreachable"));
    assert!(fixes.iter().any(|f| f.id.as_str() == "E4:reach:core"));
}

#[tokio::test]
async fn no_fetch_reports_unrefreshed_data() {
    let mirror = Mirror::new();
    let state = mirror.offline_detector().detect().await.unwrap();
    assert!(!state.data_is_fresh);
    assert!(state.stale_remotes.is_empty());
    assert_eq!(suggest_fixes(&state)[0].id.as_str(), "STALE:refetch");
}

#[tokio::test]
async fn offline_refetch_still_converges() {
    let mirror = Mirror::new();
    let detector = mirror.offline_detector();
    let state = detector.detect().await.unwrap();

    let options = AutoFixOptions {
        fix_id: Some("STALE:refetch".parse().unwrap()),
        ..Default::default()
    };
    let report = auto_fix(&detector, &state, &options).await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(report.errors.is_empty());
    assert!(!report.final_state.data_is_fresh);
    assert!(report.converged);
}

// =============================================================================
// Branches and corruption
// =============================================================================

#[tokio::test]
async fn local_only_branch_is_b4() {
    let mirror = Mirror::new();
    git(&mirror.local(), &["branch", "wip"]);

    let state = mirror.detector().detect().await.unwrap();
    let wip = state.branch(&BranchName::new("wip").unwrap()).unwrap();
    assert_eq!(wip.id(), BranchId::B4);
    assert!(wip.sync.is_none());

    let main = state.branch(&main_branch()).unwrap();
    assert_eq!(main.id(), BranchId::B1);

    let fix = suggest_fixes(&state)
        .into_iter()
        .find(|f| f.id.as_str() == "B4:publish:wip")
        .unwrap();
    assert!(!fix.auto_fixable);
}

#[tokio::test]
async fn branch_missing_on_github_is_pushed() {
    let mirror = Mirror::new();
    let local = mirror.local();
    git(&local, &["branch", "feature"]);
    git(&local, &["push", "-q", "core", "feature"]);

    let detector = mirror.detector();
    let state = detector.detect().await.unwrap();
    let feature = BranchName::new("feature").unwrap();
    assert_eq!(state.branch(&feature).unwrap().id(), BranchId::B2);

    let options = AutoFixOptions {
        fix_id: Some("B2:push:github:feature".parse().unwrap()),
        ..Default::default()
    };
    let report = auto_fix(&detector, &state, &options).await.unwrap();
    assert!(report.converged);
    assert_eq!(
        report.final_state.branch(&feature).unwrap().id(),
        BranchId::B1
    );
}

#[tokio::test]
async fn large_blob_is_reported_without_path() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("big.bin"), vec![0u8; 15 * 1024 * 1024]).unwrap();
    git(dir.path(), &["add", "big.bin"]);
    git(dir.path(), &["commit", "-q", "-m", "add big blob"]);
    let sha = git(dir.path(), &["rev-parse", "HEAD:big.bin"]);

    let detector = Detector::new(dir.path(), Remotes::default(), DetectOptions::default());
    let state = detector.detect().await.unwrap();
    let corruption = state.corruption.as_ref().unwrap();
    assert_eq!(corruption.id(), CorruptionId::C2);
    assert_eq!(corruption.large_blobs.len(), 1);
    assert_eq!(corruption.large_blobs[0].sha.as_str(), sha);
    assert_eq!(corruption.large_blobs[0].size_bytes, 15 * 1024 * 1024);

    let location = detector
        .probe()
        .locate_blob(&Oid::new(sha).unwrap())
        .await
        .unwrap();
    assert_eq!(location.paths, vec!["big.bin".to_string()]);
    assert_eq!(location.commits.len(), 1);
}

#[tokio::test]
async fn skip_corruption_skips_scan() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path());
    let options = DetectOptions {
        skip_corruption: true,
        ..Default::default()
    };
    let state = Detector::new(dir.path(), Remotes::default(), options)
        .detect()
        .await
        .unwrap();
    assert!(state.corruption.unwrap().skipped);
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn repeated_detection_is_stable() {
    let mirror = Mirror::new();
    mirror.commit_local("f.txt", "one\n");
    commit(&mirror.local(), "g.txt", "two\n");
    git(&mirror.local(), &["branch", "wip"]);

    let detector = mirror.detector();
    let first = detector.detect().await.unwrap();
    let second = detector.detect().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[tokio::test]
async fn bare_repository_is_an_error() {
    let mirror = Mirror::new();
    let detector = Detector::new(
        mirror.remote_dir("core"),
        Remotes::default(),
        DetectOptions::default(),
    );
    assert!(detector.detect().await.is_err());
}
