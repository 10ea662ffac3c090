// SPDX-License-Identifier: GPL-2.0-only

//! End-to-end scenarios from spec.md §8, driven against the real `ambox`
//! binary and a real (throwaway) git repository.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

struct Repo {
    dir: tempfile::TempDir,
}

impl Repo {
    fn init() -> Self {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), "git", &["init", "-q"]);
        run(dir.path(), "git", &["config", "user.name", "Test User"]);
        run(dir.path(), "git", &["config", "user.email", "test@example.com"]);
        Repo { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn ambox(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_ambox"))
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("spawning ambox")
    }

    fn log_subjects(&self) -> Vec<String> {
        let out = Command::new("git")
            .args(["log", "--format=%s"])
            .current_dir(self.path())
            .output()
            .unwrap();
        String::from_utf8(out.stdout)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    fn session_dir(&self) -> PathBuf {
        self.path().join(".git").join("rebase-apply")
    }
}

fn run(dir: &Path, cmd: &str, args: &[&str]) {
    let status = Command::new(cmd)
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap_or_else(|e| panic!("spawning {cmd}: {e}"));
    assert!(status.success(), "{cmd} {args:?} failed");
}

fn one_message(subject: &str, author: &str, email: &str, date: &str, diff: &str) -> String {
    format!(
        "From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001\n\
         From: {author} <{email}>\n\
         Date: {date}\n\
         Subject: [PATCH] {subject}\n\
         \n\
         {diff}"
    )
}

fn add_file_diff(path: &str, content: &str) -> String {
    format!(
        "diff --git a/{path} b/{path}\n\
         new file mode 100644\n\
         index 0000000..0000000\n\
         --- /dev/null\n\
         +++ b/{path}\n\
         @@ -0,0 +1 @@\n\
         +{content}\n"
    )
}

#[test]
fn single_patch_mbox_clean_apply() {
    let repo = Repo::init();
    // Give the repo an initial commit so HEAD is born; the empty-history case
    // is covered separately below.
    fs::write(repo.path().join("README"), "seed\n").unwrap();
    run(repo.path(), "git", &["add", "README"]);
    run(repo.path(), "git", &["commit", "-q", "-m", "seed"]);

    let mbox = repo.path().join("patch.mbox");
    fs::write(
        &mbox,
        one_message(
            "Add foo",
            "Ada",
            "ada@x",
            "Wed, 1 Jan 2020 00:00:00 +0000",
            &add_file_diff("foo", "hello"),
        ),
    )
    .unwrap();

    let output = repo.ambox(&[mbox.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let subjects = repo.log_subjects();
    assert_eq!(subjects[0], "Add foo");
    assert!(!repo.session_dir().exists());

    let foo = fs::read_to_string(repo.path().join("foo")).unwrap();
    assert_eq!(foo, "hello\n");
}

#[test]
fn empty_history_first_commit_has_no_parent() {
    let repo = Repo::init();
    let mbox = repo.path().join("patch.mbox");
    fs::write(
        &mbox,
        one_message(
            "Initial commit",
            "Ada",
            "ada@x",
            "Wed, 1 Jan 2020 00:00:00 +0000",
            &add_file_diff("foo", "hello"),
        ),
    )
    .unwrap();

    let output = repo.ambox(&[mbox.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("applying to an empty history"));

    let out = Command::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "1");
}

#[test]
fn empty_patch_fails_with_exit_128() {
    let repo = Repo::init();
    fs::write(repo.path().join("README"), "seed\n").unwrap();
    run(repo.path(), "git", &["add", "README"]);
    run(repo.path(), "git", &["commit", "-q", "-m", "seed"]);

    let mbox = repo.path().join("patch.mbox");
    fs::write(
        &mbox,
        one_message(
            "Nothing here",
            "Ada",
            "ada@x",
            "Wed, 1 Jan 2020 00:00:00 +0000",
            "",
        ),
    )
    .unwrap();

    let output = repo.ambox(&[mbox.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(128));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Patch is empty"));
}

#[test]
fn pine_internal_folder_entry_is_skipped() {
    let repo = Repo::init();
    fs::write(repo.path().join("README"), "seed\n").unwrap();
    run(repo.path(), "git", &["add", "README"]);
    run(repo.path(), "git", &["commit", "-q", "-m", "seed"]);

    let mbox = repo.path().join("patch.mbox");
    let skip_message = one_message(
        "folder internal data",
        "Mail System Internal Data",
        "nobody@nowhere",
        "Wed, 1 Jan 2020 00:00:00 +0000",
        "",
    );
    let real_message = one_message(
        "Add foo",
        "Ada",
        "ada@x",
        "Wed, 1 Jan 2020 00:00:00 +0000",
        &add_file_diff("foo", "hello"),
    );
    fs::write(&mbox, format!("{skip_message}\n{real_message}")).unwrap();

    let output = repo.ambox(&[mbox.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let subjects = repo.log_subjects();
    assert_eq!(subjects[0], "Add foo");
    assert_eq!(subjects.len(), 2); // "Add foo" + the seed commit
}

#[test]
fn abort_restores_original_head() {
    let repo = Repo::init();
    fs::write(repo.path().join("README"), "seed\n").unwrap();
    run(repo.path(), "git", &["add", "README"]);
    run(repo.path(), "git", &["commit", "-q", "-m", "seed"]);

    let original_head = {
        let out = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(repo.path())
            .output()
            .unwrap();
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    };

    // A patch that can't apply (context references a file that doesn't
    // exist) leaves the session Armed.
    let mbox = repo.path().join("patch.mbox");
    fs::write(
        &mbox,
        one_message(
            "Modify missing file",
            "Ada",
            "ada@x",
            "Wed, 1 Jan 2020 00:00:00 +0000",
            "diff --git a/missing b/missing\n\
             index 1111111..2222222 100644\n\
             --- a/missing\n\
             +++ b/missing\n\
             @@ -1 +1 @@\n\
             -old\n\
             +new\n",
        ),
    )
    .unwrap();

    let output = repo.ambox(&[mbox.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(128));
    assert!(repo.session_dir().exists());

    let output = repo.ambox(&["--abort"]);
    assert!(output.status.success());
    assert!(!repo.session_dir().exists());

    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8(out.stdout).unwrap().trim(), original_head);
}
