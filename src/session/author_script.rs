// SPDX-License-Identifier: GPL-2.0-only

//! Author script codec (spec.md §4.2).
//!
//! Serializes the three author fields as shell-single-quoted `KEY='value'`
//! assignments, and parses them back with a strict, round-trip-exact decoder.
//! The file is evaluated by sibling shell tooling, so the quoting must match
//! POSIX `sh` semantics bit for bit; the strictness of the decoder exists
//! because this file is a trust boundary, not a convenience format.

use anyhow::{anyhow, Result};

const KEYS: [&str; 3] = ["GIT_AUTHOR_NAME", "GIT_AUTHOR_EMAIL", "GIT_AUTHOR_DATE"];

pub(crate) struct AuthorScript {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) date: String,
}

/// POSIX single-quote escape: a literal `'` becomes `'\''`.
fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Undo [`shell_quote`]. Expects `input` to start immediately after `KEY=` and
/// to be exactly one shell-single-quoted value followed by nothing else
/// (callers strip the trailing newline before calling this).
///
/// [`shell_quote`] encodes each embedded `'` as the four-character sequence
/// close-quote, backslash, quote, reopen-quote (`'\''`). Decoding therefore
/// can't just alternate "literal run" / "final terminator" on the first `'`
/// seen: a `'` at that position may instead be the closing half of that
/// escape, with three more characters (`\''`) still to consume before the
/// value continues or truly ends.
fn shell_unquote(input: &str) -> Result<String> {
    let chars: Vec<char> = input.chars().collect();
    if chars.first() != Some(&'\'') {
        return Err(anyhow!("expected opening quote"));
    }

    let mut out = String::new();
    let mut i = 1;
    loop {
        match chars.get(i) {
            None => return Err(anyhow!("unterminated quoted string")),
            Some('\'') => {
                let is_escaped_quote = chars.get(i + 1) == Some(&'\\')
                    && chars.get(i + 2) == Some(&'\'')
                    && chars.get(i + 3) == Some(&'\'');
                if is_escaped_quote {
                    out.push('\'');
                    i += 4;
                    continue;
                }
                if i + 1 != chars.len() {
                    return Err(anyhow!("trailing data after closing quote"));
                }
                return Ok(out);
            }
            Some(&ch) => {
                out.push(ch);
                i += 1;
            }
        }
    }
}

impl AuthorScript {
    /// Emit exactly three lines, NAME/EMAIL/DATE in that fixed order, each
    /// shell-single-quoted with a trailing newline.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (key, value) in KEYS.iter().zip([&self.name, &self.email, &self.date]) {
            out.push_str(key);
            out.push('=');
            out.push_str(&shell_quote(value));
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Strict decode: three lines, fixed key order, EOF required immediately
    /// after. Any deviation is a parse failure.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|_| anyhow!("author script is not UTF-8"))?;
        let mut lines = text.split('\n');
        let mut values = Vec::with_capacity(3);
        for key in KEYS {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("author script ended before `{key}`"))?;
            let rest = line
                .strip_prefix(key)
                .and_then(|s| s.strip_prefix('='))
                .ok_or_else(|| anyhow!("expected `{key}=...`, got `{line}`"))?;
            values.push(shell_unquote(rest).map_err(|e| anyhow!("parsing `{key}`: {e}"))?);
        }
        // After the third line's trailing newline, `split('\n')` yields one
        // empty trailing element for a well-formed file, then nothing.
        match (lines.next(), lines.next()) {
            (Some(""), None) => {}
            _ => return Err(anyhow!("trailing data after author script")),
        }
        let date = values.pop().unwrap();
        let email = values.pop().unwrap();
        let name = values.pop().unwrap();
        Ok(AuthorScript { name, email, date })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_plain_values() {
        let script = AuthorScript {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            date: "2020-01-01 00:00:00 +0000".into(),
        };
        let encoded = script.encode();
        let decoded = AuthorScript::decode(&encoded).unwrap();
        assert_eq!(decoded.name, script.name);
        assert_eq!(decoded.email, script.email);
        assert_eq!(decoded.date, script.date);
    }

    #[test]
    fn round_trips_shell_special_characters() {
        for raw in [
            "O'Brien",
            "back\\slash",
            "  spaces  ",
            "$(rm -rf /)",
            "`echo hi`",
            "\"double\"",
            "semi;colon",
            "Tom'",
            "''",
            "a'b'c",
        ] {
            let script = AuthorScript {
                name: raw.to_string(),
                email: "x@y".into(),
                date: "2020-01-01 00:00:00 +0000".into(),
            };
            let decoded = AuthorScript::decode(&script.encode()).unwrap();
            assert_eq!(decoded.name, raw, "round trip failed for {raw:?}");
        }
    }

    #[test]
    fn rejects_wrong_key_order() {
        let bytes = b"GIT_AUTHOR_EMAIL='a@b'\nGIT_AUTHOR_NAME='A'\nGIT_AUTHOR_DATE='D'\n";
        assert!(AuthorScript::decode(bytes).is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        let script = AuthorScript {
            name: "A".into(),
            email: "a@b".into(),
            date: "D".into(),
        };
        let mut encoded = script.encode();
        encoded.extend_from_slice(b"garbage\n");
        assert!(AuthorScript::decode(&encoded).is_err());
    }

    #[test]
    fn rejects_missing_lines() {
        assert!(AuthorScript::decode(b"GIT_AUTHOR_NAME='A'\n").is_err());
    }
}
