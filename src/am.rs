// SPDX-License-Identifier: GPL-2.0-only

//! Session state machine (spec.md §4.7): the central orchestrator. Holds the
//! in-memory session, drives `setup`/`load`/`next`/`run`, and enforces the
//! invariants that define "session in progress" (spec.md §3 I1-I4).

use std::path::PathBuf;

use anyhow::{Context, Result};
use git_repository::ObjectId;

use crate::{
    commit, error::Error, ext::RepositoryExtended, format, mailinfo, mailsplit,
    session::{self, author_script::AuthorScript},
    stupid::{IndexLock, Stupid},
    wrap::Message,
};

/// `None` encodes an unborn HEAD (no commit yet) in the `abort-safe` file.
const ABORT_SAFE_UNBORN: &str = "unborn";

/// I1: a session is in progress iff the directory exists, and both `next` and
/// `last` exist as regular files. No other file's presence matters.
pub(crate) fn is_in_progress(dir: &session::Dir) -> bool {
    dir.exists() && dir.path_in("last").is_file() && dir.path_in("next").is_file()
}

pub(crate) struct Session {
    dir: session::Dir,
    cur: u32,
    last: u32,
    author_name: Option<String>,
    author_email: Option<String>,
    author_date: Option<String>,
    msg: Option<Message>,
}

impl Session {
    pub(crate) fn dir_for(repo: &git_repository::Repository) -> session::Dir {
        session::Dir::new(repo.git_dir().join("rebase-apply"))
    }

    /// Precondition: no session in progress for `dir`. Detects the format (or
    /// uses `format_hint`), creates the session directory, runs the splitter,
    /// and writes `next`/`last` last, per I3.
    pub(crate) fn setup(
        repo: &git_repository::Repository,
        dir: session::Dir,
        format_hint: Option<&str>,
        paths: &[PathBuf],
    ) -> Result<Self> {
        if is_in_progress(&dir) {
            return Err(Error::SessionAlreadyInProgress.into());
        }

        let _format = match format_hint {
            Some(hint) => format::Format::parse_hint(hint)?,
            None => format::detect(paths)?,
        };

        dir.create()?;

        if let Err(err) = record_abort_safe(repo, &dir) {
            dir.destroy().ok();
            return Err(err);
        }

        let (first, last) = match mailsplit::split(repo, &dir, paths) {
            Ok(range) => range,
            Err(err) => {
                dir.destroy().ok();
                return Err(err.context("splitting input into patches"));
            }
        };

        dir.write_state_atomic("next", format!("{first}\n").as_bytes())?;
        dir.write_state_atomic("last", format!("{last}\n").as_bytes())?;

        Ok(Session {
            dir,
            cur: first,
            last,
            author_name: None,
            author_email: None,
            author_date: None,
            msg: None,
        })
    }

    /// Precondition: a session is Armed for `dir`. Missing `next`/`last` at
    /// this point is a programmer error, not a user error: callers must check
    /// [`is_in_progress`] first.
    pub(crate) fn load(dir: session::Dir) -> Result<Self> {
        let cur: u32 = dir
            .read_state_trimmed("next")?
            .ok_or_else(|| Error::Bug("next missing from armed session".into()))?
            .parse()
            .map_err(|_| Error::Bug("next is not a decimal integer".into()))?;
        let last: u32 = dir
            .read_state_trimmed("last")?
            .ok_or_else(|| Error::Bug("last missing from armed session".into()))?
            .parse()
            .map_err(|_| Error::Bug("last is not a decimal integer".into()))?;

        let (author_name, author_email, author_date) =
            match dir.read_state("author-script")? {
                Some(bytes) => {
                    let script = AuthorScript::decode(&bytes)
                        .map_err(|_| Error::CouldNotParseAuthorScript)?;
                    (Some(script.name), Some(script.email), Some(script.date))
                }
                None => (None, None, None),
            };

        let msg = dir
            .read_state("final-commit")?
            .map(|bytes| Message::Raw {
                bytes,
                encoding: encoding_rs::UTF_8,
            });

        Ok(Session {
            dir,
            cur,
            last,
            author_name,
            author_email,
            author_date,
            msg,
        })
    }

    /// Free per-patch fields, remove their on-disk counterparts, and advance
    /// the cursor. Crash-safe: if interrupted after removing the scratch
    /// files but before `next` is rewritten, the next `load` sees the
    /// unchanged (smaller) `cur` and re-parses the same patch, which is safe
    /// because parsing is deterministic in its inputs.
    fn advance(&mut self) -> Result<()> {
        self.author_name = None;
        self.author_email = None;
        self.author_date = None;
        self.msg = None;
        self.dir.remove_state("author-script")?;
        self.dir.remove_state("final-commit")?;
        self.cur += 1;
        self.dir
            .write_state_atomic("next", format!("{}\n", self.cur).as_bytes())?;
        Ok(())
    }

    fn mail_path(&self) -> PathBuf {
        self.dir.path_in(&mailinfo::msgnum(self.cur))
    }

    /// Drive the main loop from spec.md §4.7. Leaves the session Armed on any
    /// resumable failure (apply failure); destroys it and triggers background
    /// maintenance on full completion.
    pub(crate) fn run(
        &mut self,
        repo: &git_repository::Repository,
        advice_amworkdir: bool,
        use_color: bool,
    ) -> Result<()> {
        let _lock = IndexLock::acquire(repo.git_dir())?;
        repo.stupid().refresh_index()?;
        let mut stdout = crate::color::get_color_stdout(use_color);

        while self.cur <= self.last {
            let mail_path = self.mail_path();
            if !mail_path.exists() {
                // User removed the numbered mail file to force a skip
                // (spec.md §8 P2).
                self.advance()?;
                continue;
            }

            let parsed = match mailinfo::parse_one(repo, &self.dir, &mail_path) {
                Ok(parsed) => parsed,
                // A typed `Error` (e.g. `EmptyPatch`) already carries its own
                // fatal message distinct from the generic parser-failure one
                // (spec.md §7); only untyped I/O errors get a generic wrapper.
                Err(err) if err.downcast_ref::<Error>().is_some() => return Err(err),
                Err(err) => return Err(err.context("could not parse patch")),
            };
            let Some(parsed) = parsed else {
                self.advance()?;
                continue;
            };

            self.author_name = Some(parsed.author_name);
            self.author_email = Some(parsed.author_email);
            self.author_date = Some(parsed.author_date);
            self.msg = Some(parsed.message);

            self.write_author_script()?;
            self.write_final_commit()?;

            let subject = self.msg.as_ref().unwrap().display_first_line();
            crate::color::print_applying(&mut stdout, &subject)?;

            if !repo.stupid().apply_to_index(&self.dir.path_in("patch"))? {
                eprintln!(
                    "Patch failed at {} {subject}",
                    mailinfo::msgnum(self.cur)
                );
                if advice_amworkdir {
                    eprintln!(
                        "The copy of the patch that failed is found in: {}",
                        self.dir.path_in("patch").display()
                    );
                }
                return Err(Error::ApplyFailed {
                    msgnum: self.cur,
                    subject,
                }
                .into());
            }

            let identity = crate::ext::Identity::new(
                self.author_name.as_deref().unwrap_or_default(),
                self.author_email.as_deref().unwrap_or_default(),
                self.author_date.as_deref().unwrap_or_default(),
            )?;
            commit::create(repo, &identity, self.msg.as_ref().unwrap())?;

            self.advance()?;
        }

        self.dir.destroy()?;
        repo.stupid().gc_auto();
        Ok(())
    }

    fn write_author_script(&self) -> Result<()> {
        let script = AuthorScript {
            name: self.author_name.clone().unwrap_or_default(),
            email: self.author_email.clone().unwrap_or_default(),
            date: self.author_date.clone().unwrap_or_default(),
        };
        self.dir
            .write_state_atomic("author-script", &script.encode())
    }

    fn write_final_commit(&self) -> Result<()> {
        let bytes = self.msg.as_ref().map(Message::raw_bytes).unwrap_or(b"");
        self.dir.write_state_atomic("final-commit", bytes)
    }

    pub(crate) fn destroy(self) -> Result<()> {
        self.dir.destroy()
    }

    pub(crate) fn abort(repo: &git_repository::Repository, dir: session::Dir) -> Result<()> {
        let target = read_abort_safe(&dir)?;
        match target {
            Some(commit_id) => {
                let reflog_action = crate::ext::reflog_action();
                repo.advance_head(&reflog_action, "am --abort", commit_id)?;
                let tree_id = repo
                    .find_object(commit_id)
                    .context("resolving pre-session HEAD")?
                    .try_into_commit()
                    .context("pre-session HEAD is not a commit")?
                    .tree_id()?
                    .detach();
                repo.stupid().read_tree_checkout_hard(tree_id)?;
            }
            None => {
                repo.delete_current_branch_ref()?;
            }
        }
        dir.destroy()
    }
}

fn record_abort_safe(repo: &git_repository::Repository, dir: &session::Dir) -> Result<()> {
    let contents = match repo.head_commit_id()? {
        Some(id) => id.to_string(),
        None => ABORT_SAFE_UNBORN.to_string(),
    };
    dir.write_state_atomic("abort-safe", contents.as_bytes())
}

fn read_abort_safe(dir: &session::Dir) -> Result<Option<ObjectId>> {
    let Some(text) = dir.read_state_trimmed("abort-safe")? else {
        return Ok(None);
    };
    if text == ABORT_SAFE_UNBORN {
        return Ok(None);
    }
    ObjectId::from_hex(text.as_bytes())
        .map(Some)
        .map_err(|_| Error::Bug(format!("abort-safe contains invalid object id `{text}`")).into())
}

/// Used only by [`Session::abort`] when the session started on an unborn
/// branch: there is no prior commit to restore, so the least surprising
/// recovery is to make the branch unborn again.
trait DeleteCurrentBranch {
    fn delete_current_branch_ref(&self) -> Result<()>;
}

impl DeleteCurrentBranch for git_repository::Repository {
    fn delete_current_branch_ref(&self) -> Result<()> {
        let head = self.head().context("resolving HEAD")?;
        if let Some(name) = head.referent_name() {
            self.edit_reference(git_repository::refs::transaction::RefEdit {
                change: git_repository::refs::transaction::Change::Delete {
                    expected: git_repository::refs::transaction::PreviousValue::Any,
                    log: git_repository::refs::transaction::RefLog::AndReference,
                },
                name: name.to_owned(),
                deref: false,
            })
            .context("deleting unborn branch ref")?;
        }
        Ok(())
    }
}
