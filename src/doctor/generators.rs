//! doctor::generators
//!
//! Derives fixes from a [`RepositoryState`].
//!
//! Each generator inspects one facet of the snapshot and appends fixes in
//! its priority band. [`suggest_fixes`] runs them all and sorts by
//! priority; the sort is stable, so fixes within a band keep the order
//! their generator produced. For sync scenarios that order matters: a
//! fast-forward is listed before the push that depends on it.

use super::fixes::{priority, Fix, FixId, ScenarioId};
use crate::core::types::{BranchName, Location, RefName};
use crate::engine::operation::Operation;
use crate::engine::state::{BranchState, BranchSyncState, RemoteStatus, RepositoryState};
use crate::engine::tables::{BranchId, SyncId, SyncStatus};

const REMOTES: [Location; 2] = [Location::Core, Location::GitHub];

/// Suggest fixes for a detected state, most urgent first.
pub fn suggest_fixes(state: &RepositoryState) -> Vec<Fix> {
    let mut fixes = Vec::new();

    if !state.existence.local_exists {
        local_missing_fixes(state, &mut fixes);
        return fixes;
    }

    stale_fixes(state, &mut fixes);
    unknown_fixes(state, &mut fixes);
    existence_fixes(state, &mut fixes);
    local_health_fixes(state, &mut fixes);
    if let Some(sync) = &state.sync {
        sync_fixes(state, sync, &mut fixes);
        divergence_fixes(sync, &mut fixes);
    }
    topology_fixes(state, &mut fixes);

    fixes.sort_by_key(|fix| fix.priority);
    fixes
}

/// Reason a mutating fix is blocked by the working tree, if any.
fn dirty_reason(state: &RepositoryState) -> Option<String> {
    match &state.working_tree {
        Some(wt) if !wt.clean => Some(format!(
            "working tree is dirty ({} staged, {} unstaged)",
            wt.staged.len(),
            wt.unstaged.len()
        )),
        Some(_) => None,
        None => Some("working tree state is unknown".to_string()),
    }
}

fn apply_blockers(mut fix: Fix, reasons: &[Option<String>]) -> Fix {
    for reason in reasons.iter().flatten() {
        fix = fix.blocked(reason.clone());
    }
    fix
}

fn remote_blocker(remote: &RemoteStatus) -> Option<String> {
    if !remote.configured {
        Some(format!("remote '{}' is not configured", remote.name))
    } else if !remote.reachable {
        Some(format!("remote '{}' is unreachable", remote.name))
    } else {
        None
    }
}

fn tracking_ref(remote: &str, branch: &BranchName) -> RefName {
    RefName::for_remote_branch(remote, branch)
}

// =============================================================================
// Band 1: stale data, unknown classification
// =============================================================================

fn local_missing_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    let scenario = ScenarioId::Existence(state.existence.id());
    let source = REMOTES
        .iter()
        .filter_map(|loc| state.existence.remote(*loc))
        .find(|r| r.exists());

    let description = match source.and_then(|r| r.url.as_deref()) {
        Some(url) => format!(
            "Local repository is missing at {}; clone it from {url}",
            state.repo_path.display()
        ),
        None => format!(
            "Local repository is missing at {} and no remote can provide it",
            state.repo_path.display()
        ),
    };
    fixes.push(Fix::manual(
        FixId::new(scenario, "clone"),
        scenario,
        priority::EXISTENCE,
        description,
        "cloning creates a new repository; run it manually",
    ));
}

fn stale_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    if state.data_is_fresh {
        return;
    }

    let configured: Vec<&RemoteStatus> = REMOTES
        .iter()
        .filter_map(|loc| state.existence.remote(*loc))
        .filter(|r| r.configured)
        .collect();
    if configured.is_empty() {
        return;
    }

    // Fetch what answers; with nothing reachable the fix stays listed but blocked.
    let reachable: Vec<&RemoteStatus> = configured.iter().copied().filter(|r| r.exists()).collect();
    let blocker = if reachable.is_empty() {
        configured.iter().find_map(|r| remote_blocker(r))
    } else {
        None
    };
    let targets = if reachable.is_empty() { &configured } else { &reachable };
    let steps: Vec<Operation> = targets
        .iter()
        .map(|r| Operation::Fetch {
            remote: r.name.clone(),
        })
        .collect();

    let description = if state.stale_remotes.is_empty() {
        "Remote-tracking data was not refreshed; re-fetch all remotes".to_string()
    } else {
        format!(
            "Remote-tracking data is stale (failed: {}); re-fetch all remotes",
            state.stale_remotes.join(", ")
        )
    };
    let op = Operation::Composite {
        steps,
        stop_on_error: false,
    };
    let fix = Fix::automatic(
        FixId::new(ScenarioId::Stale, "refetch"),
        ScenarioId::Stale,
        priority::STALE,
        description,
        op.clone(),
    );
    let fix = if op.is_read_only() {
        fix
    } else {
        fix.blocked("composite contains mutating steps")
    };
    fixes.push(apply_blockers(fix, &[blocker]));
}

fn unknown_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    let Some(sync) = state.sync.as_ref().filter(|s| s.id() == SyncId::Unknown) else {
        return;
    };
    let scenario = ScenarioId::Sync(SyncId::Unknown);
    fixes.push(Fix::manual(
        FixId::with_key(scenario, "investigate", sync.branch.as_str()),
        scenario,
        priority::STALE,
        format!(
            "Sync comparison for '{}' is inconsistent; detection is unreliable until the repositories are inspected",
            sync.branch
        ),
        "detection unreliable",
    ));
}

// =============================================================================
// Band 2: existence gaps
// =============================================================================

fn existence_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    let scenario = ScenarioId::Existence(state.existence.id());
    for location in REMOTES {
        let Some(remote) = state.existence.remote(location) else {
            continue;
        };
        if !remote.configured {
            fixes.push(Fix::manual(
                FixId::with_key(scenario, "configure", location.label()),
                scenario,
                priority::EXISTENCE,
                format!(
                    "Remote '{}' is not configured; add it with `git remote add {} <url>`",
                    remote.name, remote.name
                ),
                "requires a remote URL",
            ));
        } else if !remote.reachable {
            let target = remote.url.as_deref().unwrap_or(remote.name.as_str());
            fixes.push(Fix::manual(
                FixId::with_key(scenario, "reach", location.label()),
                scenario,
                priority::EXISTENCE,
                format!(
                    "Remote '{}' ({target}) is unreachable; check the network and credentials",
                    remote.name
                ),
                "requires connectivity or credentials",
            ));
        }
    }
}

// =============================================================================
// Band 3: local health
// =============================================================================

fn local_health_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    if let Some(wt) = &state.working_tree {
        if !wt.clean {
            let scenario = ScenarioId::WorkingTree(wt.id());
            fixes.push(Fix::manual(
                FixId::new(scenario, "commit-or-stash"),
                scenario,
                priority::LOCAL_HEALTH,
                format!(
                    "Working tree has {} staged and {} unstaged changes; commit or stash them",
                    wt.staged.len(),
                    wt.unstaged.len()
                ),
                "touches uncommitted changes",
            ));
        }
        if wt.detached_head {
            fixes.push(Fix::manual(
                FixId::new(ScenarioId::DetachedHead, "checkout"),
                ScenarioId::DetachedHead,
                priority::LOCAL_HEALTH,
                "HEAD is detached; check out a branch",
                "choosing a branch is a user decision",
            ));
        }
        if wt.shallow {
            fixes.push(Fix::manual(
                FixId::new(ScenarioId::Shallow, "unshallow"),
                ScenarioId::Shallow,
                priority::LOCAL_HEALTH,
                "Repository is a shallow clone; ahead/behind counts may be wrong. Run `git fetch --unshallow`",
                "fetches full history; run it manually",
            ));
        }
    }

    if let Some(corruption) = &state.corruption {
        let scenario = ScenarioId::Corruption(corruption.id());
        for blob in &corruption.large_blobs {
            fixes.push(Fix::manual(
                FixId::with_key(scenario, "inspect", blob.sha.short(12)),
                scenario,
                priority::LOCAL_HEALTH,
                format!(
                    "Blob {} ({:.1} MiB) is in local history; run `trisync locate {}` to find it",
                    blob.sha.short(12),
                    blob.size_mb(),
                    blob.sha
                ),
                "removing a blob rewrites history",
            ));
        }
    }
}

// =============================================================================
// Bands 4 and 5: default-branch sync
// =============================================================================

fn sync_fixes(state: &RepositoryState, sync: &BranchSyncState, fixes: &mut Vec<Fix>) {
    let id = sync.id();
    let scenario = ScenarioId::Sync(id);
    let dirty = dirty_reason(state);
    let branch = &sync.branch;

    let push = |location: Location| -> Option<Fix> {
        let remote = state.existence.remote(location)?;
        // Only remotes that hold the branch; missing ones are topology gaps.
        sync.local_vs(location)?;
        let op = Operation::Push {
            remote: remote.name.clone(),
            branch: branch.clone(),
        };
        let fix = Fix::automatic(
            FixId::with_key(scenario, "push", location.label()),
            scenario,
            priority::SYNC,
            format!("Push '{branch}' to {}", remote.name),
            op,
        );
        Some(apply_blockers(fix, &[dirty.clone(), remote_blocker(remote)]))
    };

    let fast_forward = |location: Location| -> Option<Fix> {
        let remote = state.existence.remote(location)?;
        sync.local_vs(location)?;
        let target = tracking_ref(&remote.name, branch);
        let op = Operation::ResetToRef {
            branch: branch.clone(),
            target: target.clone(),
        };
        let fix = Fix::automatic(
            FixId::with_key(scenario, "fast-forward", location.label()),
            scenario,
            priority::SYNC,
            format!("Fast-forward '{branch}' to {target}"),
            op,
        );
        Some(apply_blockers(fix, &[dirty.clone()]))
    };

    match id {
        SyncId::S2 | SyncId::S3 => {
            for location in REMOTES {
                let lagging = sync
                    .local_vs(location)
                    .is_some_and(|pair| pair.status == SyncStatus::Ahead);
                if lagging {
                    fixes.extend(push(location));
                }
            }
        }
        SyncId::S4 => fixes.extend(fast_forward(Location::Core)),
        SyncId::S5 => {
            fixes.extend(fast_forward(Location::Core));
            fixes.extend(push(Location::GitHub));
        }
        SyncId::S6 => {
            fixes.extend(fast_forward(Location::GitHub));
            fixes.extend(push(Location::Core));
        }
        _ => {}
    }
}

fn divergence_fixes(sync: &BranchSyncState, fixes: &mut Vec<Fix>) {
    let id = sync.id();
    if !id.is_divergent() {
        return;
    }
    let scenario = ScenarioId::Sync(id);
    let mut details = Vec::new();
    let named_pairs = [
        ("local/core", sync.pairs.local_core),
        ("local/github", sync.pairs.local_github),
        ("core/github", sync.pairs.core_github),
    ];
    for (label, pair) in named_pairs {
        if let Some(pair) = pair.filter(|p| p.status == SyncStatus::Diverged) {
            details.push(format!("{label} +{}/-{}", pair.ahead, pair.behind));
        }
    }
    fixes.push(Fix::manual(
        FixId::with_key(scenario, "merge", sync.branch.as_str()),
        scenario,
        priority::DIVERGENCE,
        format!(
            "'{}' has diverged ({}): {}; merge or rebase manually",
            sync.branch,
            id.describe(),
            details.join(", ")
        ),
        "resolving divergence could discard commits",
    ));
}

// =============================================================================
// Band 6: branch topology
// =============================================================================

fn topology_fixes(state: &RepositoryState, fixes: &mut Vec<Fix>) {
    let dirty = dirty_reason(state);
    for branch in &state.branches {
        fixes.extend(branch_fix(state, branch, &dirty));
    }
}

fn branch_fix(state: &RepositoryState, branch: &BranchState, dirty: &Option<String>) -> Option<Fix> {
    let id = branch.id();
    let scenario = ScenarioId::Branch(id);
    let name = &branch.name;

    let push_to = |location: Location| -> Option<Fix> {
        let remote = state.existence.remote(location)?;
        let op = Operation::Push {
            remote: remote.name.clone(),
            branch: name.clone(),
        };
        let fix = Fix::automatic(
            FixId::with_key(scenario, "push", &format!("{}:{name}", location.label())),
            scenario,
            priority::TOPOLOGY,
            format!("Push '{name}' to {}, which lacks it", remote.name),
            op,
        );
        Some(apply_blockers(fix, &[dirty.clone(), remote_blocker(remote)]))
    };

    match id {
        BranchId::B1 => None,
        BranchId::B2 => push_to(Location::GitHub),
        BranchId::B3 => push_to(Location::Core),
        BranchId::B4 => {
            let steps: Vec<Operation> = REMOTES
                .iter()
                .filter_map(|loc| state.existence.remote(*loc))
                .filter(|r| r.exists())
                .map(|r| Operation::Push {
                    remote: r.name.clone(),
                    branch: name.clone(),
                })
                .collect();
            let fix = Fix::manual(
                FixId::with_key(scenario, "publish", name.as_str()),
                scenario,
                priority::TOPOLOGY,
                format!("'{name}' exists only locally; publish it if it should be shared"),
                "publishing a local-only branch is a user decision",
            );
            Some(if steps.is_empty() {
                fix
            } else {
                fix.with_operation(Operation::Composite {
                    steps,
                    stop_on_error: true,
                })
            })
        }
        BranchId::B5 => Some(Fix::manual(
            FixId::with_key(scenario, "track", name.as_str()),
            scenario,
            priority::TOPOLOGY,
            format!("'{name}' exists on both remotes but not locally; check it out with `git switch {name}`"),
            "creating local branches is a user decision",
        )),
        BranchId::B6 | BranchId::B7 => {
            let holder = if id == BranchId::B6 {
                state.remote_name(Location::Core)
            } else {
                state.remote_name(Location::GitHub)
            }
            .unwrap_or_default();
            Some(Fix::manual(
                FixId::with_key(scenario, "review", name.as_str()),
                scenario,
                priority::TOPOLOGY,
                format!("'{name}' exists only on {holder}; restore it locally or delete it there"),
                "orphan branches need a user decision",
            ))
        }
    }
}
