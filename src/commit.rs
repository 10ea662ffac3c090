// SPDX-License-Identifier: GPL-2.0-only

//! Commit driver (spec.md §4.6).
//!
//! The patch has already been applied to the staging area by the time this
//! runs: build a tree from it, create a commit object linked to the current
//! HEAD (or no parent), and advance the branch reference with a reflog entry.

use anyhow::{Context, Result};
use git_repository::ObjectId;

use crate::{
    ext::{Identity, RepositoryExtended},
    stupid::Stupid,
    wrap::Message,
};

/// Create a commit from the current staging area and advance HEAD to it.
/// Returns the new commit id.
///
/// `message` is decoded through its detected charset (spec.md's mail-decoding
/// supplement) before being written: commit objects carry no encoding header
/// here, so the bytes actually stored must already be UTF-8.
pub(crate) fn create(
    repo: &git_repository::Repository,
    author: &Identity,
    message: &Message,
) -> Result<ObjectId> {
    let tree_id = repo.stupid().write_tree()?;

    let parent = repo.head_commit_id()?;
    if parent.is_none() {
        eprintln!("applying to an empty history");
    }
    let parents: Vec<ObjectId> = parent.into_iter().collect();

    let decoded: Message = message
        .decode()
        .context("decoding patch message")?
        .into_owned()
        .into();

    let committer = repo.get_committer()?;
    let commit_id = repo.commit_ex(author, &committer, &decoded, tree_id, &parents)?;

    let reflog_action = crate::ext::reflog_action();
    let subject = decoded.display_first_line();
    repo.advance_head(&reflog_action, &subject, commit_id)?;

    Ok(commit_id)
}
