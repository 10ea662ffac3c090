// SPDX-License-Identifier: GPL-2.0-only

//! Thin wrapper types around values that need to carry more than a plain
//! `String` can: commit messages that may not be valid UTF-8 until decoded
//! against a known charset.

use std::borrow::Cow;

use anyhow::{anyhow, Result};

/// A commit message, either already-decoded text or raw bytes paired with the
/// encoding that should be used to decode them.
///
/// The split exists because the mail parser composes the commit message from
/// pieces (`Subject` plus the trimmed body) that are only known to be
/// well-formed once a charset from the message's `Content-Type` header, if
/// any, has been applied.
pub(crate) enum Message {
    String(String),
    Raw {
        bytes: Vec<u8>,
        encoding: &'static encoding_rs::Encoding,
    },
}

impl Message {
    /// The message as it would be written to a commit object: exact bytes, no
    /// re-encoding.
    pub(crate) fn raw_bytes(&self) -> &[u8] {
        match self {
            Message::String(s) => s.as_bytes(),
            Message::Raw { bytes, .. } => bytes,
        }
    }

    /// Decode the message as text, failing if the bytes are not valid under
    /// the associated encoding.
    pub(crate) fn decode(&self) -> Result<Cow<'_, str>> {
        match self {
            Message::String(s) => Ok(Cow::Borrowed(s)),
            Message::Raw { bytes, encoding } => {
                let (text, _, had_errors) = encoding.decode(bytes);
                if had_errors {
                    Err(anyhow!(
                        "message could not be decoded with `{}`",
                        encoding.name()
                    ))
                } else {
                    Ok(text)
                }
            }
        }
    }

    /// First line of the raw, possibly non-UTF-8 bytes. Only safe to use for
    /// display when the caller has no charset to decode against; prefer
    /// [`Message::display_first_line`].
    fn first_line(&self) -> String {
        let bytes = self.raw_bytes();
        let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// First line of the message, decoded through its associated encoding so
    /// non-ASCII subjects render correctly. Falls back to a lossy read of the
    /// raw bytes if decoding fails, since this is used for progress/error
    /// display, not for data that ends up in a commit object.
    pub(crate) fn display_first_line(&self) -> String {
        match self.decode() {
            Ok(text) => text.lines().next().unwrap_or_default().to_string(),
            Err(_) => self.first_line(),
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::String(s)
    }
}
