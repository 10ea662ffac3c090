// SPDX-License-Identifier: GPL-2.0-only

//! Subprocess wrappers around `git` plumbing commands.
//!
//! gitoxide's object-database and ref-transaction APIs cover the read side and
//! commit/ref writes (see `ext.rs`), but staging-area mutation — applying a
//! patch, refreshing the index, turning the index into a tree — is not
//! something this crate's vendored gitoxide exposes at a high level. Those
//! operations are instead delegated to the real `git` binary, exactly as the
//! "external subprocess contract" design note describes: the splitter,
//! parser, and applier are opaque collaborators that may be invoked as
//! subprocesses while the state-machine logic around them stays unchanged.

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{anyhow, bail, Context, Result};
use git_repository::ObjectId;

/// Access to the `git` plumbing commands scoped to one repository.
pub(crate) struct StupidContext {
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
}

pub(crate) trait Stupid {
    fn stupid(&self) -> StupidContext;
}

impl Stupid for git_repository::Repository {
    fn stupid(&self) -> StupidContext {
        StupidContext {
            git_dir: self.git_dir().to_path_buf(),
            work_dir: self.work_dir().map(Path::to_path_buf),
        }
    }
}

impl StupidContext {
    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.env("GIT_DIR", &self.git_dir);
        if let Some(work_dir) = &self.work_dir {
            cmd.current_dir(work_dir);
            cmd.env("GIT_WORK_TREE", work_dir);
        }
        cmd
    }

    /// Invoke `git mailsplit`, writing numbered, zero-padded message files into
    /// `out_dir`. Returns the highest index written.
    ///
    /// When `paths` is empty, the mailbox is read from stdin.
    pub(crate) fn mailsplit(
        &self,
        out_dir: &Path,
        precision: usize,
        paths: &[PathBuf],
    ) -> Result<u32> {
        let mut cmd = self.command();
        cmd.arg("mailsplit")
            .arg(format!("-o{}", out_dir.display()))
            .arg(format!("-d{precision}"))
            .arg("-b");
        if paths.is_empty() {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.arg("--");
            cmd.args(paths);
            cmd.stdin(Stdio::null());
        }
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .context("spawning `git mailsplit`")?;
        if !output.status.success() {
            bail!("`git mailsplit` failed with {}", output.status);
        }
        let stdout = String::from_utf8(output.stdout)
            .context("`git mailsplit` produced non-UTF-8 output")?;
        stdout
            .trim()
            .parse::<u32>()
            .with_context(|| format!("could not parse `git mailsplit` output `{stdout}`"))
    }

    /// Invoke `git mailinfo` against the message at `mail_path`, writing the
    /// header summary to stdout (captured and returned), and the trimmed body
    /// and raw patch to `msg_path`/`patch_path` respectively.
    pub(crate) fn mailinfo(
        &self,
        mail_path: &Path,
        msg_path: &Path,
        patch_path: &Path,
    ) -> Result<Vec<u8>> {
        let mail_file = File::open(mail_path)
            .with_context(|| format!("opening split message {}", mail_path.display()))?;
        let output = self
            .command()
            .arg("mailinfo")
            .arg(msg_path)
            .arg(patch_path)
            .stdin(Stdio::from(mail_file))
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .context("spawning `git mailinfo`")?;
        if !output.status.success() {
            bail!("`git mailinfo` failed with {}", output.status);
        }
        Ok(output.stdout)
    }

    /// Apply a unidiff to the index and worktree. Returns `Ok(true)` if the
    /// patch applied cleanly, `Ok(false)` if it did not (caller is responsible
    /// for preserving session state in that case).
    pub(crate) fn apply_to_index(&self, patch_path: &Path) -> Result<bool> {
        let status = self
            .command()
            .arg("apply")
            .arg("--index")
            .arg("--whitespace=nowarn")
            .arg(patch_path)
            .stdin(Stdio::null())
            .status()
            .context("spawning `git apply`")?;
        Ok(status.success())
    }

    /// Refresh the index's stat-cache against the worktree, failing loudly if
    /// the index cannot be refreshed (spec.md §4.7 `refresh_and_write_index`).
    pub(crate) fn refresh_index(&self) -> Result<()> {
        let status = self
            .command()
            .arg("update-index")
            .arg("-q")
            .arg("--unmerged")
            .arg("--refresh")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .context("spawning `git update-index --refresh`")?;
        if status.success() {
            Ok(())
        } else {
            bail!("index refresh failed; resolve unmerged paths and retry")
        }
    }

    /// Write the current index contents as a tree object, returning its id.
    pub(crate) fn write_tree(&self) -> Result<ObjectId> {
        let output = self
            .command()
            .arg("write-tree")
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .context("spawning `git write-tree`")?;
        if !output.status.success() {
            bail!("`git write-tree` failed with {}", output.status);
        }
        let oid_str = std::str::from_utf8(&output.stdout)
            .context("`git write-tree` produced non-UTF-8 output")?
            .trim();
        ObjectId::from_hex(oid_str.as_bytes())
            .with_context(|| format!("could not parse tree id `{oid_str}`"))
    }

    /// Best-effort background maintenance trigger. Failures are non-fatal: a
    /// failed `gc --auto` must never turn a successful `am` into an error.
    pub(crate) fn gc_auto(&self) {
        if let Err(err) = self
            .command()
            .arg("gc")
            .arg("--auto")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            eprintln!("warning: failed to start `git gc --auto`: {err}");
        }
    }

    /// Hard-reset the worktree and index to the given tree, used by `--abort`.
    pub(crate) fn read_tree_checkout_hard(&self, tree_id: ObjectId) -> Result<()> {
        let status = self
            .command()
            .arg("read-tree")
            .arg("--reset")
            .arg("-u")
            .arg(tree_id.to_string())
            .stdin(Stdio::null())
            .status()
            .context("spawning `git read-tree --reset -u`")?;
        if status.success() {
            Ok(())
        } else {
            bail!("failed to reset worktree to {tree_id}")
        }
    }
}

/// A session-scoped cooperative lock over the staging area, held across the
/// refresh-apply-commit sequence for a single patch (spec.md §5). This is an
/// advisory lock distinct from git's own internal `index.lock` (each `git`
/// subprocess we spawn still manages that one itself for the duration of its
/// own invocation); it only serializes concurrent `ambox` invocations against
/// the same repository when they choose to honor it.
pub(crate) struct IndexLock {
    path: PathBuf,
    _file: File,
}

impl IndexLock {
    pub(crate) fn acquire(git_dir: &Path) -> Result<Self> {
        let path = git_dir.join("ambox.lock");
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::AlreadyExists {
                    anyhow!(
                        "staging area is locked ({}); is another `ambox` running?",
                        path.display()
                    )
                } else {
                    anyhow::Error::new(err).context("acquiring staging-area lock")
                }
            })?;
        Ok(IndexLock { path, _file: file })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
