//! Block normalization (spec.md §4.1).
//!
//! In one pass: uppercase, strip whitespace/control characters and the
//! punctuation blacklist, stop at a `(` to open a comment, and forward
//! `MSG`-prefixed comments to the console. A leading `/` deletes the
//! whole block.

/// Result of normalizing one line.
pub struct Normalized {
    /// The normalized command text (comment and deleted text removed).
    pub command: String,
    /// `true` if the block was block-deleted (`/` prefix) — caller
    /// returns NOOP without parsing `command`.
    pub deleted: bool,
    /// Text forwarded from a `(MSG...)` comment, if present.
    pub message: Option<String>,
}

const PASSTHROUGH_PUNCTUATION: &str = "+-./*<=>|%#()[]{}";
const REJECTED_PUNCTUATION: &str = "!$,;:?@^_~`'\"";

/// Normalize a raw line per spec.md §4.1.
pub fn normalize(line: &str) -> Normalized {
    let trimmed_start = line.trim_start();
    if trimmed_start.starts_with('/') {
        return Normalized {
            command: String::new(),
            deleted: true,
            message: None,
        };
    }

    let mut command = String::with_capacity(line.len());
    let mut comment: Option<String> = None;
    let mut chars = line.chars();

    while let Some(raw) = chars.next() {
        let c = raw.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            command.push(c);
            continue;
        }
        if c == '(' {
            let rest: String = chars.collect();
            let body = match rest.find(')') {
                Some(idx) => &rest[..idx],
                None => rest.as_str(),
            };
            comment = Some(body.to_string());
            break;
        }
        if (c as u32) < 0x20 || c == '\u{7F}' {
            continue; // control characters and DEL
        }
        if c.is_ascii_whitespace() {
            continue;
        }
        if REJECTED_PUNCTUATION.contains(c) {
            continue;
        }
        if PASSTHROUGH_PUNCTUATION.contains(c) {
            command.push(c);
        }
        // anything else (lowercase already folded, other symbols) is dropped
    }

    let message = comment.as_deref().and_then(|body| {
        let upper_prefix: String = body.chars().take(3).map(|c| c.to_ascii_uppercase()).collect();
        if upper_prefix == "MSG" {
            Some(body[3.min(body.len())..].to_string())
        } else {
            None
        }
    });

    Normalized {
        command,
        deleted: false,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_whitespace_independence() {
        let a = normalize("g1 x10 y20");
        let b = normalize("G1X10Y20");
        assert_eq!(a.command, b.command);
        assert_eq!(a.command, "G1X10Y20");
    }

    #[test]
    fn block_delete_prefix() {
        let n = normalize("  /G1 X1");
        assert!(n.deleted);
    }

    #[test]
    fn comment_terminates_command() {
        let n = normalize("G1 X1 (some comment) Y2");
        assert_eq!(n.command, "G1X1");
        assert!(n.message.is_none());
    }

    #[test]
    fn msg_comment_forwarded() {
        let n = normalize("G1 X1 (MSGhello world)");
        assert_eq!(n.command, "G1X1");
        assert_eq!(n.message.as_deref(), Some("hello world"));
    }

    #[test]
    fn msg_comment_case_insensitive_prefix() {
        let n = normalize("(msgtool change)");
        assert_eq!(n.message.as_deref(), Some("tool change"));
    }

    #[test]
    fn rejected_punctuation_is_dropped() {
        let n = normalize("G1;X1?Y2");
        assert_eq!(n.command, "G1X1Y2");
    }

    #[test]
    fn passthrough_punctuation_is_kept() {
        let n = normalize("G1X-10.5");
        assert_eq!(n.command, "G1X-10.5");
    }
}
