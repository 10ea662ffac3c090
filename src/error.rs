// SPDX-License-Identifier: GPL-2.0-only

//! Error taxonomy and exit-code mapping for `ambox`.
//!
//! Every fatal condition the state machine can raise is represented here so that
//! `main` can translate it into one of the three exit codes from the CLI contract
//! (0 success, 1 option-parsing error, 128 everything else). Errors that do not
//! originate from this enum (e.g. a `git2`-style I/O error bubbled up through
//! `anyhow::Context`) are treated as generic 128s.

use thiserror::Error;

/// Fatal errors raised by the session state machine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Patch format detection failed.")]
    FormatDetectionFailed,

    #[error("unrecognized patch format `{0}`")]
    UnknownPatchFormat(String),

    #[error("Patch is empty. Was it split wrong?")]
    EmptyPatch,

    #[error("Patch failed at {msgnum:04} {subject}")]
    ApplyFailed { msgnum: u32, subject: String },

    #[error("could not parse patch")]
    CouldNotParsePatch,

    #[error("could not parse author script")]
    CouldNotParseAuthorScript,

    #[error("no session in progress")]
    NoSessionInProgress,

    #[error("session already in progress; use --abort or --skip first")]
    SessionAlreadyInProgress,

    #[error("BUG: {0}")]
    Bug(String),

    #[error("option error: {0}")]
    OptionError(String),
}

impl Error {
    /// Exit status this error implies, per the CLI contract in spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::OptionError(_) | Error::UnknownPatchFormat(_) => 1,
            _ => 128,
        }
    }
}

/// Inspect an [`anyhow::Error`] chain for an [`Error`] and return the process exit
/// code it implies, defaulting to 128 for any other error (I/O failures,
/// subprocess failures reported via `anyhow::Context`, etc).
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(128)
}
