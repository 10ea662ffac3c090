// SPDX-License-Identifier: GPL-2.0-only

//! Mail splitter driver (spec.md §4.4).

use std::path::PathBuf;

use anyhow::Result;

use crate::{session, stupid::Stupid};

/// Invoke the splitter against `paths`, writing numbered message files
/// directly into the session directory. Returns `(first, last)`, with `first`
/// always `1` on success.
pub(crate) fn split(
    repo: &git_repository::Repository,
    dir: &session::Dir,
    paths: &[PathBuf],
) -> Result<(u32, u32)> {
    let last = repo
        .stupid()
        .mailsplit(dir.path(), session::PRECISION, paths)?;
    Ok((1, last))
}
