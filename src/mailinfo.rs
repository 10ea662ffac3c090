// SPDX-License-Identifier: GPL-2.0-only

//! Per-patch parser driver (spec.md §4.5).
//!
//! Invokes the mail parser on one split message, reads its header summary,
//! applies the "Mail System Internal Data" skip heuristic, and composes the
//! commit message. Returns a value, never a pointer into a reused buffer —
//! the "static scratch buffer for msgnum" design note in spec.md §9 applies
//! to the whole module, not just the filename formatter.

use std::path::Path;

use anyhow::{Context, Result};
use bstr::ByteSlice;

use crate::{error::Error, session, stupid::Stupid, wrap::Message};

/// Literal sentinel some mailboxes (notably Pine/IMAP folder bookkeeping
/// entries) use as the "author" of non-patch metadata messages.
const SKIP_AUTHOR_SENTINEL: &str = "Mail System Internal Data";

/// Zero-padded message filename for patch number `n`, e.g. `msgnum(3) ==
/// "0003"`.
pub(crate) fn msgnum(n: u32) -> String {
    format!("{n:0width$}", width = session::PRECISION)
}

pub(crate) struct ParsedPatch {
    pub(crate) author_name: String,
    pub(crate) author_email: String,
    pub(crate) author_date: String,
    pub(crate) message: Message,
}

/// Parse the split message at `mail_path`. Returns `Ok(None)` if the skip
/// heuristic fires; otherwise the parsed author fields and composed commit
/// message.
pub(crate) fn parse_one(
    repo: &git_repository::Repository,
    dir: &session::Dir,
    mail_path: &Path,
) -> Result<Option<ParsedPatch>> {
    let msg_path = dir.path_in("msg");
    let patch_path = dir.path_in("patch");

    let info_bytes = repo
        .stupid()
        .mailinfo(mail_path, &msg_path, &patch_path)
        .context("running mail parser")?;
    dir.write_state_atomic("info", &info_bytes)?;

    let fields = parse_info_fields(&info_bytes)?;

    if fields.author.as_deref() == Some(SKIP_AUTHOR_SENTINEL) {
        return Ok(None);
    }

    let patch_bytes = dir.read_state("patch")?.unwrap_or_default();
    if patch_bytes.is_empty() {
        return Err(Error::EmptyPatch.into());
    }

    let msg_bytes = dir.read_state("msg")?.unwrap_or_default();
    let message = compose_message(&fields, &msg_bytes, detect_charset(&info_bytes));

    Ok(Some(ParsedPatch {
        author_name: fields.author.unwrap_or_default(),
        author_email: fields.email.unwrap_or_default(),
        author_date: fields.date.unwrap_or_default(),
        message,
    }))
}

#[derive(Default)]
struct InfoFields {
    subject: Option<String>,
    author: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

/// Strip the first matching key prefix from each `info` line and accumulate
/// values per spec.md §4.5 step 2: subjects concatenate, the rest take only
/// their first value.
fn parse_info_fields(info_bytes: &[u8]) -> Result<InfoFields> {
    let text = std::str::from_utf8(info_bytes).context("`info` is not valid UTF-8")?;
    let mut fields = InfoFields::default();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Subject: ") {
            fields.subject = Some(match fields.subject.take() {
                Some(mut acc) => {
                    acc.push('\n');
                    acc.push_str(rest);
                    acc
                }
                None => rest.to_string(),
            });
        } else if let Some(rest) = line.strip_prefix("Author: ") {
            fields.author.get_or_insert_with(|| rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Email: ") {
            fields.email.get_or_insert_with(|| rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Date: ") {
            fields.date.get_or_insert_with(|| rest.to_string());
        }
    }

    Ok(fields)
}

/// Look for a `charset=` parameter on a `Content-Type:` line in `info`. Falls
/// back to UTF-8 when absent or unrecognized.
fn detect_charset(info_bytes: &[u8]) -> &'static encoding_rs::Encoding {
    let text = String::from_utf8_lossy(info_bytes);
    for line in text.lines() {
        if let Some(rest) = line
            .strip_prefix("Content-Type:")
            .or_else(|| line.strip_prefix("Content-Type :"))
        {
            if let Some(idx) = rest.find("charset=") {
                let charset = rest[idx + "charset=".len()..]
                    .trim_matches(|c: char| c == '"' || c.is_whitespace());
                let charset = charset.split(|c: char| c == ';' || c.is_whitespace()).next().unwrap_or(charset);
                if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                    return encoding;
                }
            }
        }
    }
    encoding_rs::UTF_8
}

/// Compose the commit message: `Subject` accumulator, blank line, `msg`
/// contents, then whitespace-normalized (trailing blank lines trimmed, runs
/// of internal blank lines collapsed to one).
fn compose_message(
    fields: &InfoFields,
    msg_bytes: &[u8],
    encoding: &'static encoding_rs::Encoding,
) -> Message {
    let subject = fields.subject.clone().unwrap_or_default();

    let mut composed: Vec<u8> = Vec::with_capacity(subject.len() + msg_bytes.len() + 2);
    composed.extend_from_slice(subject.as_bytes());
    composed.extend_from_slice(b"\n\n");
    composed.extend_from_slice(msg_bytes);

    let normalized = normalize_whitespace(&composed);

    if encoding == encoding_rs::UTF_8 {
        match String::from_utf8(normalized.clone()) {
            Ok(s) => Message::String(s),
            Err(_) => Message::Raw {
                bytes: normalized,
                encoding,
            },
        }
    } else {
        Message::Raw {
            bytes: normalized,
            encoding,
        }
    }
}

/// Trim trailing blank lines and collapse runs of internal blank lines to a
/// single blank line.
fn normalize_whitespace(bytes: &[u8]) -> Vec<u8> {
    let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    // `split` on a trailing '\n' yields a final empty element; drop it so
    // "trailing blank lines" logic below sees real lines only.
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    let mut out: Vec<&[u8]> = Vec::with_capacity(lines.len());
    let mut prev_blank = false;
    for line in lines {
        let blank = line.is_empty();
        if blank && prev_blank {
            continue;
        }
        out.push(line);
        prev_blank = blank;
    }

    let mut result = out.join(&b'\n');
    result.push(b'\n');
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn msgnum_is_zero_padded() {
        assert_eq!(msgnum(3), "0003");
        assert_eq!(msgnum(12345), "12345");
    }

    #[test]
    fn parses_info_fields() {
        let info = b"Subject: first line\nAuthor: Ada\nEmail: ada@x\nDate: 2020-01-01\nSubject: second line\n";
        let fields = parse_info_fields(info).unwrap();
        assert_eq!(fields.subject.as_deref(), Some("first line\nsecond line"));
        assert_eq!(fields.author.as_deref(), Some("Ada"));
        assert_eq!(fields.email.as_deref(), Some("ada@x"));
        assert_eq!(fields.date.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn only_first_author_value_kept() {
        let info = b"Author: First\nAuthor: Second\n";
        let fields = parse_info_fields(info).unwrap();
        assert_eq!(fields.author.as_deref(), Some("First"));
    }

    #[test]
    fn normalize_collapses_internal_blank_runs() {
        let input = b"a\n\n\n\nb\n";
        assert_eq!(normalize_whitespace(input), b"a\n\nb\n");
    }

    #[test]
    fn normalize_trims_trailing_blank_lines() {
        let input = b"a\nb\n\n\n\n";
        assert_eq!(normalize_whitespace(input), b"a\nb\n");
    }

    #[test]
    fn detects_charset_from_content_type() {
        let info = b"Subject: x\nContent-Type: text/plain; charset=ISO-8859-1\n";
        let enc = detect_charset(info);
        assert_eq!(enc.name(), "windows-1252");
    }

    #[test]
    fn defaults_to_utf8_without_charset_hint() {
        let info = b"Subject: x\n";
        assert_eq!(detect_charset(info).name(), "UTF-8");
    }
}
