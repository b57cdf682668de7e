//! End-to-end tests for the git-branch-archiver binary against real repositories

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Scratch area: a source repo, an output dir and a temp parent
struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            root: TempDir::new().unwrap(),
        };
        fs::create_dir_all(sandbox.source()).unwrap();
        sandbox.git(&["init", "--quiet", "-b", "main"]);
        sandbox
    }

    fn source(&self) -> PathBuf {
        self.root.path().join("source")
    }

    fn out(&self) -> PathBuf {
        self.root.path().join("out")
    }

    fn tmp(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    fn git(&self, args: &[&str]) -> String {
        let output = process::Command::new("git")
            .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
            .args(args)
            .current_dir(self.source())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(output.status.success(), "git {:?} failed", args);
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn commit_file(&self, rel: &str, contents: &str) {
        let path = self.source().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self.git(&["add", "--all"]);
        self.git(&["commit", "--quiet", "-m", rel]);
    }

    /// main and feature/x branches, one tag on main
    fn populate(&self) {
        self.commit_file("README.md", "hello\n");
        self.git(&["tag", "v1"]);
        self.git(&["checkout", "--quiet", "-b", "feature/x"]);
        self.commit_file("src/x.rs", "fn x() {}\n");
        self.git(&["checkout", "--quiet", "main"]);
    }

    fn archiver(&self) -> Command {
        self.archiver_for(&self.source())
    }

    fn archiver_for(&self, repo: &Path) -> Command {
        Command::from(self.std_archiver_for(repo))
    }

    /// Plain process command, for tests that need the child's pid
    fn std_archiver_for(&self, repo: &Path) -> process::Command {
        let mut cmd = process::Command::new(env!("CARGO_BIN_EXE_git-branch-archiver"));
        cmd.arg("--repo")
            .arg(repo)
            .arg("--out")
            .arg(self.out())
            .arg("--tmp")
            .arg(self.tmp())
            .env("XDG_CONFIG_HOME", self.root.path().join("config"))
            .env("HOME", self.root.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env_remove("GIT_ARCHIVER_GIT")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn help_lists_flags() {
    Command::cargo_bin("git-branch-archiver")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--include-tags"))
        .stdout(predicate::str::contains("--keep-temp"));
}

#[test]
fn missing_required_flags_is_usage_error() {
    Command::cargo_bin("git-branch-archiver")
        .unwrap()
        .arg("--repo")
        .arg(".")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out"));
}

#[test]
fn archives_every_branch() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    sandbox
        .archiver()
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Archived 2 of 2 refs"));

    assert_eq!(
        entries(&sandbox.out()),
        vec![
            ".git-archiver-manifest.toml",
            "feature__x",
            "feature__x.tar",
            "feature__x.zip",
            "main",
            "main.tar",
            "main.zip",
        ]
    );
    assert!(sandbox.out().join("feature__x/src/x.rs").exists());
    assert!(!sandbox.out().join("main/.git").exists());

    // workspace released
    assert!(entries(&sandbox.tmp()).is_empty());
}

#[test]
fn include_tags_adds_tag_outputs() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    sandbox
        .archiver()
        .arg("--include-tags")
        .arg("--no-manifest")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Archived 3 of 3 refs"));

    let names = entries(&sandbox.out());
    assert_eq!(names.len(), 9);
    assert!(names.contains(&"v1.zip".to_string()));
    assert!(!names.contains(&".git-archiver-manifest.toml".to_string()));
}

#[test]
fn keep_temp_reports_workspace() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    sandbox
        .archiver()
        .arg("--keep-temp")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Temporary clone kept at"));

    let kept = entries(&sandbox.tmp());
    assert_eq!(kept.len(), 1);
    assert!(kept[0].starts_with("git-archiver-"));
    assert!(sandbox.tmp().join(&kept[0]).join("repo.git").exists());
}

#[test]
fn empty_repository_succeeds_with_warning() {
    let sandbox = Sandbox::new();

    sandbox
        .archiver()
        .assert()
        .code(0)
        .stdout(predicate::str::contains("nothing archived"))
        .stderr(predicate::str::contains("No branches found"));
}

#[test]
fn nonexistent_repository_is_fatal() {
    let sandbox = Sandbox::new();
    let missing = sandbox.root.path().join("missing");

    sandbox
        .archiver_for(&missing)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Clone failed"));

    assert!(!sandbox.out().exists());
    assert!(entries(&sandbox.tmp()).is_empty());
}

#[test]
fn colliding_names_exit_partial() {
    let sandbox = Sandbox::new();
    sandbox.commit_file("a.txt", "a\n");
    sandbox.git(&["branch", "feature/x"]);
    sandbox.git(&["branch", "feature__x"]);

    sandbox
        .archiver()
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED  branch 'feature__x'"));

    assert!(sandbox.out().join("feature__x.zip").exists());
    assert!(sandbox.out().join("main.tar").exists());
}

#[test]
fn config_file_enables_tags() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    let config = sandbox.root.path().join("archiver.toml");
    fs::write(&config, "[output]\ninclude_tags = true\nmanifest = false\n").unwrap();

    sandbox
        .archiver()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(0);

    assert!(sandbox.out().join("v1.tar").exists());
    assert!(!sandbox.out().join(".git-archiver-manifest.toml").exists());
}

#[test]
fn bad_config_file_is_fatal() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    let config = sandbox.root.path().join("archiver.toml");
    fs::write(&config, "[output\n").unwrap();

    sandbox
        .archiver()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn branch_and_tag_with_same_name_are_both_archived() {
    let sandbox = Sandbox::new();
    sandbox.commit_file("a.txt", "a\n");
    sandbox.git(&["tag", "release"]);
    sandbox.git(&["branch", "release"]);

    sandbox
        .archiver()
        .arg("--include-tags")
        .arg("--no-manifest")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Archived 3 of 3 refs"));

    for name in ["release", "release.zip", "tags__release", "tags__release.tar"] {
        assert!(sandbox.out().join(name).exists(), "{}", name);
    }
}

#[test]
fn tag_on_a_blob_fails_alone() {
    let sandbox = Sandbox::new();
    sandbox.populate();
    let blob = sandbox.git(&["hash-object", "-w", "README.md"]);
    sandbox.git(&["tag", "blobtag", &blob]);

    sandbox
        .archiver()
        .arg("--include-tags")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Archived 3 of 4 refs"))
        .stdout(predicate::str::contains("FAILED  tag 'blobtag'"));

    assert!(!sandbox.out().join("blobtag").exists());
    assert!(sandbox.out().join("v1.zip").exists());
    assert!(sandbox.out().join("feature__x.tar").exists());
}

#[test]
fn verbose_logs_each_archive() {
    let sandbox = Sandbox::new();
    sandbox.populate();

    sandbox
        .archiver()
        .arg("--verbose")
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Wrote archive"))
        .stderr(predicate::str::contains("main.zip"));
}

#[cfg(unix)]
#[test]
fn sigterm_removes_workspace_and_exits_130() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::thread;
    use std::time::{Duration, Instant};

    let sandbox = Sandbox::new();
    sandbox.populate();

    // clone never finishes, so the run is still inside git when signalled
    let slow_git = sandbox.root.path().join("slow-git");
    fs::write(&slow_git, "#!/bin/sh\nexec sleep 10\n").unwrap();
    fs::set_permissions(&slow_git, fs::Permissions::from_mode(0o755)).unwrap();

    let mut child = sandbox
        .std_archiver_for(&sandbox.source())
        .arg("--git")
        .arg(&slow_git)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !sandbox.tmp().exists() || entries(&sandbox.tmp()).is_empty() {
        assert!(Instant::now() < deadline, "workspace never created");
        thread::sleep(Duration::from_millis(20));
    }
    thread::sleep(Duration::from_millis(300));

    let killed = process::Command::new("kill")
        .arg("-TERM")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(killed.success());

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(130));
    assert!(entries(&sandbox.tmp()).is_empty());
    assert!(!sandbox.out().exists());
}
