//! Batch setup and sync across several mirrors.

mod common;

use tempfile::TempDir;

use common::{context, ScriptedRunner};
use gitsync_core::config::RemoteDefinition;
use gitsync_core::{ConfigError, RepoDefinition, RepoTable};
use gitsync_mirror::{plan, MirrorError, MirrorState, Step, SyncCoordinator};

fn repo(name: &str, source_url: &str, mirror_url: &str) -> RepoDefinition {
    RepoDefinition {
        name: name.into(),
        keyfile: None,
        remotes: vec![
            RemoteDefinition {
                name: "origin".into(),
                url: source_url.to_owned(),
                source: true,
                keyfile: None,
                excluded_refs: vec![],
            },
            RemoteDefinition {
                name: "backup".into(),
                url: mirror_url.to_owned(),
                source: false,
                keyfile: None,
                excluded_refs: vec![],
            },
        ],
    }
}

fn three_repos() -> RepoTable {
    RepoTable(vec![
        repo("alpha", "https://a.example/alpha.git", "https://b.example/alpha.git"),
        repo("beta", "https://a.example/beta.git", "https://b.example/beta.git"),
        repo("gamma", "https://a.example/gamma.git", "https://b.example/gamma.git"),
    ])
}

#[test]
fn coordinator_sets_up_mirrors_in_declaration_order() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    let ctx = context(tmp.path(), &runner);

    let coordinator = SyncCoordinator::new(&three_repos(), &ctx).unwrap();

    let names: Vec<&str> = coordinator.mirrors().iter().map(|m| m.name().0.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
    assert!(coordinator.mirrors().iter().all(|m| m.state() == MirrorState::Ready));

    let clones = runner.commands_starting_with("git clone");
    assert_eq!(clones.len(), 3);
    assert!(clones[0].contains("alpha.git"));
    assert!(clones[2].contains("gamma.git"));
}

/// Config files must name a repo; an empty table only arises programmatically.
#[test]
fn empty_repo_table_builds_empty_coordinator() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    let ctx = context(tmp.path(), &runner);

    let mut coordinator = SyncCoordinator::new(&RepoTable::default(), &ctx).unwrap();
    assert!(coordinator.is_empty());
    let report = coordinator.sync_all();
    assert!(report.is_success());
    assert!(runner.calls().is_empty());
}

#[test]
fn invalid_repo_is_reported_before_any_clone() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    let ctx = context(tmp.path(), &runner);

    let mut repos = three_repos();
    repos.0.push(repo("delta", "https://a.example/delta.git", "not a url"));

    let err = SyncCoordinator::new(&repos, &ctx).unwrap_err();
    assert!(
        matches!(err, MirrorError::Config(ConfigError::InvalidUrl { .. })),
        "got: {err}"
    );
    assert!(runner.calls().is_empty(), "nothing may run before validation passes");
}

#[test]
fn plan_validates_without_side_effects() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    let ctx = context(tmp.path(), &runner);

    let mirrors = plan(&three_repos(), &ctx).unwrap();
    assert_eq!(mirrors.len(), 3);
    assert!(mirrors.iter().all(|m| m.state() == MirrorState::Uninitialized));
    assert!(runner.calls().is_empty());
    assert!(!tmp.path().join("cache").exists());
}

#[test]
fn setup_failure_aborts_remaining_mirrors() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    runner.fail_when("beta.git");
    let ctx = context(tmp.path(), &runner);

    let err = SyncCoordinator::new(&three_repos(), &ctx).unwrap_err();
    match &err {
        MirrorError::Setup { repo, step, .. } => {
            assert_eq!(repo.0, "beta");
            assert_eq!(step, &Step::Clone);
        }
        other => panic!("unexpected error: {other}"),
    }
    let clones = runner.commands_starting_with("git clone");
    assert_eq!(clones.len(), 2, "gamma must never be cloned: {clones:?}");
}

#[test]
fn sync_all_isolates_failures() {
    let tmp = TempDir::new().unwrap();
    let runner = ScriptedRunner::new();
    let ctx = context(tmp.path(), &runner);

    let mut coordinator = SyncCoordinator::new(&three_repos(), &ctx).unwrap();
    runner.clear();
    runner.fail_once_when("git fetch --prune origin");

    let report = coordinator.sync_all();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());
    let failed: Vec<&str> = report.failed_repos().map(|r| r.0.as_str()).collect();
    assert_eq!(failed, ["alpha"]);

    assert_eq!(runner.commands_starting_with("git fetch").len(), 3);
    assert_eq!(runner.commands_starting_with("git push").len(), 2);
    assert!(coordinator.mirrors().iter().all(|m| m.state() == MirrorState::Ready));

    runner.clear();
    let report = coordinator.sync_all();
    assert!(report.is_success());
    assert_eq!(runner.commands_starting_with("git push").len(), 3);
}
