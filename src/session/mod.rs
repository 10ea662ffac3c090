// SPDX-License-Identifier: GPL-2.0-only

//! Session directory abstraction (spec.md §4.1).
//!
//! Owns the filesystem directory that holds all persistent per-session
//! artifacts and exposes atomic write/read/remove primitives relative to it.
//! Nothing in this module knows about patches, authors, or commits — it is
//! pure directory plumbing, kept separate so the crash-safety argument in
//! spec.md §3/§9 can be checked against this module alone.

pub(crate) mod author_script;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Zero-pad width for split message filenames (`NNNN`), fixed per spec.md §3.
pub(crate) const PRECISION: usize = 4;

pub(crate) struct Dir {
    path: PathBuf,
}

impl Dir {
    pub(crate) fn new(path: PathBuf) -> Self {
        Dir { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn path_in(&self, relname: &str) -> PathBuf {
        self.path.join(relname)
    }

    /// `true` iff the session directory exists and is a directory. Does not by
    /// itself imply a session is in progress (see [`crate::am::is_in_progress`]
    /// for the full I1 predicate, which additionally requires `next` and
    /// `last`).
    pub(crate) fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub(crate) fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.path)
            .with_context(|| format!("creating session directory {}", self.path.display()))
    }

    /// Read the contents of `relname`, returning `Ok(None)` iff the file does
    /// not exist. Any other I/O error is fatal.
    pub(crate) fn read_state(&self, relname: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_in(relname)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("reading session file `{relname}`"))
            }
        }
    }

    /// Like [`Dir::read_state`], but trims a single trailing newline and
    /// requires the result to be UTF-8 — the shape every decimal-counter and
    /// line-oriented session file takes.
    pub(crate) fn read_state_trimmed(&self, relname: &str) -> Result<Option<String>> {
        let Some(bytes) = self.read_state(relname)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes)
            .with_context(|| format!("session file `{relname}` is not valid UTF-8"))?;
        Ok(Some(text.trim_end_matches('\n').to_string()))
    }

    /// Write `contents` to `relname` such that a concurrent reader observes
    /// either the previous contents or the complete new contents: write to a
    /// sibling temp file on the same filesystem, then rename over the target.
    pub(crate) fn write_state_atomic(&self, relname: &str, contents: &[u8]) -> Result<()> {
        let target = self.path_in(relname);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.path)
            .with_context(|| format!("creating temp file for `{relname}`"))?;
        tmp.write_all(contents)
            .with_context(|| format!("writing temp file for `{relname}`"))?;
        tmp.flush()?;
        tmp.persist(&target)
            .with_context(|| format!("renaming temp file onto `{relname}`"))?;
        Ok(())
    }

    pub(crate) fn remove_state(&self, relname: &str) -> Result<()> {
        match fs::remove_file(self.path_in(relname)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("removing session file `{relname}`"))
            }
        }
    }

    /// Recursively remove the session directory. Idempotent.
    pub(crate) fn destroy(&self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("removing session directory {}", self.path.display())
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_state_missing_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path().join("rebase-apply"));
        dir.create().unwrap();
        assert!(dir.read_state("next").unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path().join("rebase-apply"));
        dir.create().unwrap();
        dir.write_state_atomic("next", b"3\n").unwrap();
        assert_eq!(dir.read_state_trimmed("next").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn destroy_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path().join("rebase-apply"));
        dir.create().unwrap();
        dir.destroy().unwrap();
        dir.destroy().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn remove_state_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path().join("rebase-apply"));
        dir.create().unwrap();
        dir.remove_state("author-script").unwrap();
    }
}
