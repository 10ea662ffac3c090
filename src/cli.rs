// SPDX-License-Identifier: GPL-2.0-only

//! Command entry (spec.md §4.8 / §6): top-level dispatcher. Decides resume vs.
//! fresh start, resolves input paths, drives the run loop, and releases
//! resources.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches};

use crate::{
    am::{self, Session},
    argset,
    ext::RepositoryExtended,
};

pub(crate) fn build() -> clap::Command {
    clap::Command::new("ambox")
        .about("Apply a queue of mailbox patches onto the current branch")
        .long_about(
            "Apply a queue of email-formatted patches onto the current branch, \
             producing one commit per patch. The process is resumable: if it is \
             interrupted by a failed patch or a signal, re-invoke with no \
             arguments to continue the session where it left off.",
        )
        .arg(
            Arg::new("paths")
                .help("Mailbox file(s) or Maildir(s) to apply; `-` or omitted reads stdin")
                .value_name("mbox|Maildir")
                .num_args(0..)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("patch-format")
                .long("patch-format")
                .help("Specify the patch format (currently only `mbox`)")
                .value_name("format")
                .num_args(1),
        )
        .arg(
            Arg::new("abort")
                .long("abort")
                .help("Restore the original branch and abandon the session in progress")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with_all(["paths", "patch-format"]),
        )
        .arg(
            Arg::new("skip")
                .long("skip")
                .help("Skip the current patch and continue the session in progress")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with_all(["paths", "patch-format", "abort"]),
        )
        .args(crate::color::color_args())
}

pub(crate) fn dispatch(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open().map_err(|err| anyhow!("{err}"))?;
    let dir = Session::dir_for(&repo);

    if matches.get_flag("abort") {
        if !am::is_in_progress(&dir) {
            return Err(crate::error::Error::NoSessionInProgress.into());
        }
        return Session::abort(&repo, dir);
    }

    let use_color = crate::color::use_color(matches);

    if matches.get_flag("skip") {
        if !am::is_in_progress(&dir) {
            return Err(crate::error::Error::NoSessionInProgress.into());
        }
        let mut session = Session::load(dir)?;
        let advice = repo.advice_amworkdir();
        return session.run(&repo, advice, use_color);
    }

    let mut session = if am::is_in_progress(&dir) {
        Session::load(dir)?
    } else {
        let paths = resolve_paths(matches)?;
        let format_hint = argset::get_one_str(matches, "patch-format");
        Session::setup(&repo, dir, format_hint, &paths)?
    };

    let advice = repo.advice_amworkdir();
    session.run(&repo, advice, use_color)
}

/// Resolve positional path arguments against the caller's working directory at
/// invocation time, before the session starts (spec.md §6).
fn resolve_paths(matches: &ArgMatches) -> Result<Vec<PathBuf>> {
    let cwd = std::env::current_dir()?;
    let mut paths = Vec::new();
    if let Some(values) = matches.get_many::<PathBuf>("paths") {
        for path in values {
            if path == std::path::Path::new("-") {
                paths.push(path.clone());
            } else if path.is_absolute() {
                paths.push(path.clone());
            } else {
                paths.push(cwd.join(path));
            }
        }
    }
    Ok(paths)
}
