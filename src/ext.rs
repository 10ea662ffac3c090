// SPDX-License-Identifier: GPL-2.0-only

//! Extension methods on [`git_repository::Repository`] for the handful of
//! operations this crate needs that sit outside gitoxide's own surface: reading
//! the `advice.amworkdir` setting, resolving the committer identity, parsing a
//! strict author identity out of the three `GIT_AUTHOR_*` fields, and creating
//! commit objects directly against the object database.

use anyhow::{anyhow, Context, Result};
use bstr::BString;
use git_repository::ObjectId;

use crate::wrap::Message;

/// A strict author or committer identity: used exactly as given, with no
/// autofill of missing fields (spec.md §4.6, "strict mode").
#[derive(Clone)]
pub(crate) struct Identity {
    pub(crate) name: BString,
    pub(crate) email: BString,
    pub(crate) time: git_repository::actor::Time,
}

impl Identity {
    pub(crate) fn new(name: &str, email: &str, date: &str) -> Result<Self> {
        Ok(Identity {
            name: BString::from(name),
            email: BString::from(email),
            time: parse_author_date(date)?,
        })
    }

    fn as_signature(&self) -> git_repository::actor::Signature {
        git_repository::actor::Signature {
            name: self.name.clone(),
            email: self.email.clone(),
            time: self.time,
        }
    }
}

/// Parse a `GIT_AUTHOR_DATE`-style timestamp. Mail parsers typically emit RFC
/// 2822 (`Wed, 1 Jan 2020 00:00:00 +0000`); author-script round trips and test
/// fixtures may also use the more readable `YYYY-MM-DD HH:MM:SS +ZZZZ` form.
pub(crate) fn parse_author_date(s: &str) -> Result<git_repository::actor::Time> {
    let dt = chrono::DateTime::parse_from_rfc2822(s)
        .or_else(|_| chrono::DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z"))
        .with_context(|| format!("invalid author date `{s}`"))?;
    let offset = dt.offset().local_minus_utc();
    Ok(git_repository::actor::Time {
        seconds: dt.timestamp(),
        offset,
        sign: if offset < 0 {
            git_repository::actor::Sign::Minus
        } else {
            git_repository::actor::Sign::Plus
        },
    })
}

/// Read `GIT_REFLOG_ACTION`, defaulting to `am` per spec.md §6.
pub(crate) fn reflog_action() -> String {
    std::env::var("GIT_REFLOG_ACTION").unwrap_or_else(|_| "am".to_string())
}

pub(crate) trait RepositoryExtended {
    /// `None` when HEAD is unborn (no commit yet).
    fn head_commit_id(&self) -> Result<Option<ObjectId>>;

    fn get_committer(&self) -> Result<Identity>;

    /// `advice.amworkdir`, default `true`.
    fn advice_amworkdir(&self) -> bool;

    /// Build a commit object from an already-built tree, with the given strict
    /// author/committer identities and parents, and write it to the object
    /// database. Does not touch any reference. `message` is expected to
    /// already be UTF-8 (callers decode through the patch's charset first);
    /// the written object therefore carries no `encoding` header.
    fn commit_ex(
        &self,
        author: &Identity,
        committer: &Identity,
        message: &Message,
        tree_id: ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId>;

    /// Advance the branch currently pointed to by HEAD from its old value (or
    /// unborn) to `new`, recording a reflog entry `<reflog_action>: <subject>`.
    fn advance_head(&self, reflog_action: &str, subject: &str, new: ObjectId) -> Result<()>;
}

impl RepositoryExtended for git_repository::Repository {
    fn head_commit_id(&self) -> Result<Option<ObjectId>> {
        let head = self.head().context("resolving HEAD")?;
        if head.is_unborn() {
            Ok(None)
        } else {
            Ok(Some(
                head.into_peeled_id()
                    .context("peeling HEAD to a commit")?
                    .detach(),
            ))
        }
    }

    fn get_committer(&self) -> Result<Identity> {
        let sig = self
            .committer()
            .transpose()
            .context("determining committer identity")?
            .ok_or_else(|| {
                anyhow!("committer identity unknown; please set user.name and user.email")
            })?;
        Ok(Identity {
            name: sig.name.to_owned(),
            email: sig.email.to_owned(),
            time: sig.time,
        })
    }

    fn advice_amworkdir(&self) -> bool {
        self.config_snapshot()
            .plumbing()
            .boolean("advice", None, "amworkdir")
            .unwrap_or(Ok(true))
            .unwrap_or(true)
    }

    fn commit_ex(
        &self,
        author: &Identity,
        committer: &Identity,
        message: &Message,
        tree_id: ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId> {
        let commit = git_repository::objs::Commit {
            tree: tree_id,
            parents: parents.iter().copied().collect(),
            author: author.as_signature(),
            committer: committer.as_signature(),
            encoding: None,
            message: BString::from(message.raw_bytes()),
            extra_headers: Vec::new(),
        };
        Ok(self
            .write_object(&commit)
            .context("writing commit object")?
            .detach())
    }

    fn advance_head(&self, reflog_action: &str, subject: &str, new: ObjectId) -> Result<()> {
        let old = self.head_commit_id()?;
        let message = format!("{reflog_action}: {subject}");
        let expected = match old {
            Some(id) => git_repository::refs::transaction::PreviousValue::ExistingMustMatch(
                git_repository::refs::Target::Peeled(id),
            ),
            None => git_repository::refs::transaction::PreviousValue::MustNotExist,
        };
        self.edit_reference(git_repository::refs::transaction::RefEdit {
            change: git_repository::refs::transaction::Change::Update {
                log: git_repository::refs::transaction::LogChange {
                    mode: git_repository::refs::transaction::RefLog::AndReference,
                    force_create_reflog: false,
                    message: message.into(),
                },
                expected,
                new: git_repository::refs::Target::Peeled(new),
            },
            name: "HEAD".try_into()?,
            deref: true,
        })
        .context("updating HEAD")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_rfc2822_date() {
        let t = parse_author_date("Wed, 1 Jan 2020 00:00:00 +0000").unwrap();
        assert_eq!(t.seconds, 1577836800);
        assert_eq!(t.offset, 0);
    }

    #[test]
    fn parses_space_separated_date() {
        let t = parse_author_date("2020-01-01 00:00:00 +0000").unwrap();
        assert_eq!(t.seconds, 1577836800);
    }

    #[test]
    fn rejects_garbage_date() {
        assert!(parse_author_date("not a date").is_err());
    }
}
