// SPDX-License-Identifier: GPL-2.0-only

//! Patch format detection (spec.md §4.3).
//!
//! Only one format is implemented today (`Mbox`), but the detector is
//! structured as a dispatch over a small enum so a future format (stgit
//! series, `hg export`, ...) slots in beside it without touching callers —
//! the "dynamic dispatch on patch format" design note in spec.md §9.

use std::path::Path;

use anyhow::{Context, Result};
use bstr::ByteSlice;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Mbox,
}

impl Format {
    pub(crate) fn parse_hint(hint: &str) -> Result<Self> {
        match hint {
            "mbox" => Ok(Format::Mbox),
            other => Err(Error::UnknownPatchFormat(other.to_string()).into()),
        }
    }
}

/// Detect the patch format of `paths` per spec.md §4.3's ordered rules.
/// Returns [`Error::FormatDetectionFailed`] if none of the rules match.
pub(crate) fn detect(paths: &[std::path::PathBuf]) -> Result<Format> {
    match paths {
        [] => Ok(Format::Mbox),
        [only] if only == Path::new("-") => Ok(Format::Mbox),
        [first, ..] if first.is_dir() => Ok(Format::Mbox),
        [first, ..] => detect_from_file(first),
    }
}

fn detect_from_file(path: &Path) -> Result<Format> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {} for format detection", path.display()))?;

    let mut lines = bytes.lines_with_terminator().map(|l| l.trim_end());
    let first_non_blank = loop {
        match lines.next() {
            Some(line) if line.is_empty() => continue,
            Some(line) => break Some(line),
            None => break None,
        }
    };

    let Some(first) = first_non_blank else {
        return Err(Error::FormatDetectionFailed.into());
    };

    if first.starts_with(b"From ") || first.starts_with(b"From: ") {
        return Ok(Format::Mbox);
    }

    if probe_rfc2822_headers(first, &mut lines) {
        return Ok(Format::Mbox);
    }

    Err(Error::FormatDetectionFailed.into())
}

/// `^[!-9;-~]+:` — a printable-ASCII header name (excluding `:` itself, which
/// sits at 0x3A between the two allowed ranges) followed by a colon.
fn is_header_name_start(line: &[u8]) -> bool {
    let Some(colon) = line.find_byte(b':') else {
        return false;
    };
    if colon == 0 {
        return false;
    }
    line[..colon]
        .iter()
        .all(|&b| (0x21..=0x39).contains(&b) || (0x3b..=0x7e).contains(&b))
}

fn probe_rfc2822_headers<'a>(
    first: &[u8],
    rest: &mut impl Iterator<Item = &'a [u8]>,
) -> bool {
    if !is_header_name_start(first) {
        return false;
    }
    for line in rest {
        if line.is_empty() {
            return true;
        }
        if line.starts_with(b" ") || line.starts_with(b"\t") {
            continue; // folded header continuation
        }
        if !is_header_name_start(line) {
            return false;
        }
    }
    // EOF before the blank line that ends the header block: treat as a
    // successful probe only if we saw at least one header (the caller already
    // validated `first`).
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn empty_paths_is_mbox() {
        assert_eq!(detect(&[]).unwrap(), Format::Mbox);
    }

    #[test]
    fn dash_is_mbox() {
        assert_eq!(
            detect(&[std::path::PathBuf::from("-")]).unwrap(),
            Format::Mbox
        );
    }

    #[test]
    fn directory_is_mbox() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect(&[dir.path().to_path_buf()]).unwrap(), Format::Mbox);
    }

    #[test]
    fn from_line_is_mbox() {
        let f = write_temp(b"From abc Mon Jan 1 00:00:00 2020\nSubject: x\n\ndiff\n");
        assert_eq!(detect(&[f.path().to_path_buf()]).unwrap(), Format::Mbox);
    }

    #[test]
    fn rfc2822_headers_detected_as_mbox() {
        let f = write_temp(b"Subject: x\nFrom: a@b\n\nbody\n");
        assert_eq!(detect(&[f.path().to_path_buf()]).unwrap(), Format::Mbox);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let f = write_temp(b"\n\nFrom abc Mon Jan 1 00:00:00 2020\n");
        assert_eq!(detect(&[f.path().to_path_buf()]).unwrap(), Format::Mbox);
    }

    #[test]
    fn garbage_is_unknown() {
        let f = write_temp(b"this is not a patch at all\njust text\n");
        assert!(detect(&[f.path().to_path_buf()]).is_err());
    }
}
