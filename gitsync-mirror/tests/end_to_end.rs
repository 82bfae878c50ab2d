//! Mirroring between real bare repositories over `file://` URLs.
//!
//! Skipped when no `git` binary is on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use gitsync_core::RemoteDescriptor;
use gitsync_mirror::{CommandRunner, MirrorContext, RepositoryMirror, SystemRunner};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_AUTHOR_NAME", "gitsync")
        .env("GIT_AUTHOR_EMAIL", "gitsync@example.com")
        .env("GIT_COMMITTER_NAME", "gitsync")
        .env("GIT_COMMITTER_EMAIL", "gitsync@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn bare_repo(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    git(root, &["init", "--bare", "--quiet", name]);
    git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    path
}

fn commit(work: &Path, file: &str, contents: &str) {
    std::fs::write(work.join(file), contents).unwrap();
    git(work, &["add", file]);
    git(work, &["commit", "--quiet", "-m", &format!("update {file}")]);
}

fn refs(repo: &Path) -> String {
    git(repo, &["for-each-ref", "--format=%(objectname) %(refname)"])
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[test]
fn mirror_propagates_commits_and_deletions() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let source = bare_repo(root, "source.git");
    let target = bare_repo(root, "target.git");

    let work = root.join("work");
    git(root, &["init", "--quiet", "work"]);
    commit(&work, "README", "first");
    git(&work, &["push", "--quiet", &file_url(&source), "HEAD:refs/heads/main"]);
    git(&work, &["push", "--quiet", &file_url(&source), "HEAD:refs/heads/feature"]);
    git(&work, &["tag", "v1"]);
    git(&work, &["push", "--quiet", &file_url(&source), "refs/tags/v1"]);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let ctx = MirrorContext::new(root.join("cache"), root.join("known_hosts"), runner);
    let remotes = vec![
        RemoteDescriptor::new("upstream", &file_url(&source), true, None, vec![]).unwrap(),
        RemoteDescriptor::new("target", &file_url(&target), false, None, vec![]).unwrap(),
    ];
    let mut mirror = RepositoryMirror::new("project", remotes, None, &ctx).unwrap();

    mirror.sync().unwrap();
    assert_eq!(refs(&target), refs(&source));
    assert!(refs(&target).contains("refs/tags/v1"));

    // New commit on main, feature branch deleted upstream.
    commit(&work, "README", "second");
    git(&work, &["push", "--quiet", &file_url(&source), "HEAD:refs/heads/main"]);
    git(&work, &["push", "--quiet", &file_url(&source), ":refs/heads/feature"]);

    mirror.sync().unwrap();
    let mirrored = refs(&target);
    assert_eq!(mirrored, refs(&source));
    assert!(!mirrored.contains("refs/heads/feature"));
    assert!(!root.join("known_hosts").exists(), "file remotes need no host keys");
}

#[test]
fn excluded_refs_stay_out_of_the_target() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let source = bare_repo(root, "source.git");
    let target = bare_repo(root, "target.git");

    let work = root.join("work");
    git(root, &["init", "--quiet", "work"]);
    commit(&work, "README", "first");
    git(&work, &["push", "--quiet", &file_url(&source), "HEAD:refs/heads/main"]);
    git(&work, &["push", "--quiet", &file_url(&source), "HEAD:refs/pull/1/head"]);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let ctx = MirrorContext::new(root.join("cache"), root.join("known_hosts"), runner);
    let remotes = vec![
        RemoteDescriptor::new("upstream", &file_url(&source), true, None, vec![]).unwrap(),
        RemoteDescriptor::new(
            "target",
            &file_url(&target),
            false,
            None,
            vec!["refs/pull/*".into()],
        )
        .unwrap(),
    ];
    let mut mirror = RepositoryMirror::new("project", remotes, None, &ctx).unwrap();
    mirror.sync().unwrap();

    let mirrored = refs(&target);
    assert!(mirrored.contains("refs/heads/main"), "got: {mirrored}");
    assert!(!mirrored.contains("refs/pull/"), "got: {mirrored}");
}
