// SPDX-License-Identifier: GPL-2.0-only

//! Small shared argument-parsing helpers.

/// Get a single string-valued argument by id, or `None` if it was not provided.
pub(crate) fn get_one_str<'a>(matches: &'a clap::ArgMatches, id: &str) -> Option<&'a str> {
    matches.get_one::<String>(id).map(String::as_str)
}
