//! Decoding of `progress` event payloads.
//!
//! The backend writes each snapshot with its native dict representation
//! (`{'status': 'downloading', 'eta': None}`) rather than JSON. Payloads are
//! parsed as JSON first and only rewritten when that fails.

use std::fmt::Write;
use std::iter::Peekable;
use std::str::Chars;

use super::models::ProgressData;

pub fn parse_progress(data: &str) -> Result<ProgressData, serde_json::Error> {
    match serde_json::from_str(data) {
        Ok(progress) => Ok(progress),
        Err(_) => serde_json::from_str(&normalize_literals(data)),
    }
}

/// Rewrites single-quoted strings and `True`/`False`/`None` into JSON.
///
/// Only tokens outside string values are touched, so apostrophes and literal
/// words inside titles or messages survive.
pub fn normalize_literals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => copy_string(&mut chars, &mut out, c),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }

    out
}

fn copy_string(chars: &mut Peekable<Chars<'_>>, out: &mut String, quote: char) {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some('x') => push_escaped_code(chars, out, 2),
                Some('U') => push_escaped_code(chars, out, 8),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            c if c == quote => break,
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 => push_code_point(out, c as u32),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// `\xHH` and `\UHHHHHHHH` have no JSON spelling; decode them to a char.
fn push_escaped_code(chars: &mut Peekable<Chars<'_>>, out: &mut String, digits: usize) {
    let hex: String = (0..digits).filter_map(|_| chars.next()).collect();
    match u32::from_str_radix(&hex, 16) {
        Ok(code) if hex.len() == digits => push_code_point(out, code),
        _ => {
            // Leave the malformed escape for serde_json to reject
            out.push('\\');
            out.push_str(&hex);
        }
    }
}

fn push_code_point(out: &mut String, code: u32) {
    match char::from_u32(code) {
        Some('"') => out.push_str("\\\""),
        Some('\\') => out.push_str("\\\\"),
        Some(c) if (c as u32) >= 0x20 => out.push(c),
        _ => {
            let _ = write!(out, "\\u{:04x}", code.min(0xffff));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ProgressStatus;
    use serde_json::Value;

    #[test]
    fn test_python_literals_match_json_equivalent() {
        let native = "{'status': 'downloading', 'percentage': 42.5, 'downloaded': 1024, \
                      'total': 4096, 'speed': None, 'eta': 3, 'done': False, 'ok': True}";
        let standard = r#"{"status": "downloading", "percentage": 42.5, "downloaded": 1024,
                          "total": 4096, "speed": null, "eta": 3, "done": false, "ok": true}"#;

        let lhs: Value = serde_json::from_str(&normalize_literals(native)).unwrap();
        let rhs: Value = serde_json::from_str(standard).unwrap();
        assert_eq!(lhs, rhs);

        assert_eq!(parse_progress(native).unwrap(), parse_progress(standard).unwrap());
    }

    #[test]
    fn test_words_inside_strings_are_preserved() {
        let native = r#"{'status': 'error', 'message': "Don't say None or True", 'filename': 'a "quoted" name'}"#;
        let progress = parse_progress(native).unwrap();

        assert_eq!(progress.status, ProgressStatus::Error);
        assert_eq!(progress.message.as_deref(), Some("Don't say None or True"));
        assert_eq!(progress.filename.as_deref(), Some("a \"quoted\" name"));
    }

    #[test]
    fn test_escapes() {
        let native = r"{'status': 'processing', 'message': 'it\'s \x41 tab\there'}";
        let progress = parse_progress(native).unwrap();
        assert_eq!(progress.message.as_deref(), Some("it's A tab\there"));
    }

    #[test]
    fn test_standard_json_is_accepted_unchanged() {
        let progress = parse_progress(r#"{"status": "completed", "filename": "x.mp4"}"#).unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert_eq!(progress.filename.as_deref(), Some("x.mp4"));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(parse_progress("{'status': ").is_err());
        assert!(parse_progress("Stream closed").is_err());
    }
}
