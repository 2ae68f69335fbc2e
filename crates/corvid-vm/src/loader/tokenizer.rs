// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Line tokenizer.
//!
//! Tokens are separated by whitespace. A double-quoted token may contain
//! whitespace and escapes; `#` outside quotes starts a comment.

use std::iter::Peekable;
use std::str::CharIndices;

use corvid_macros::bail;

/// A token of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text with quotes removed and escapes resolved
    pub text: String,
    /// Whether the token was written as a quoted string
    pub quoted: bool,
}

impl Token {
    fn bare(text: &str) -> Self {
        Self {
            text: text.to_string(),
            quoted: false,
        }
    }
}

/// Splits one line into tokens.
pub fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => break,
            '"' => {
                chars.next();
                tokens.push(scan_quoted(&mut chars)?);
                match chars.peek() {
                    Some(&(_, next)) if !next.is_whitespace() && next != '#' => {
                        bail!("unexpected '{}' after string literal", next);
                    }
                    _ => {}
                }
            }
            _ => {
                let mut end = line.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == '#' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::bare(&line[start..end]));
            }
        }
    }

    Ok(tokens)
}

fn scan_quoted(chars: &mut Peekable<CharIndices<'_>>) -> Result<Token, String> {
    let mut text = String::new();
    loop {
        match chars.next() {
            None => bail!("unterminated string literal"),
            Some((_, '"')) => break,
            Some((_, '\\')) => text.push(scan_escape(chars)?),
            Some((_, ch)) => text.push(ch),
        }
    }
    Ok(Token { text, quoted: true })
}

fn scan_escape(chars: &mut Peekable<CharIndices<'_>>) -> Result<char, String> {
    let Some((_, escaped)) = chars.next() else {
        bail!("unterminated escape sequence");
    };
    match escaped {
        'n' => Ok('\n'),
        't' => Ok('\t'),
        'r' => Ok('\r'),
        '0' => Ok('\0'),
        '\\' => Ok('\\'),
        '"' => Ok('"'),
        '\'' => Ok('\''),
        'u' => scan_unicode(chars),
        other => Err(format!("unknown escape sequence '\\{}'", other)),
    }
}

/// `\uXXXX` or `\u{X..XXXXXX}`.
fn scan_unicode(chars: &mut Peekable<CharIndices<'_>>) -> Result<char, String> {
    let mut digits = String::new();
    if chars.peek().map(|&(_, c)| c) == Some('{') {
        chars.next();
        loop {
            match chars.next() {
                Some((_, '}')) => break,
                Some((_, c)) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
                _ => bail!("malformed \\u{...} escape"),
            }
        }
        if digits.is_empty() {
            bail!("empty \\u{} escape");
        }
    } else {
        for _ in 0..4 {
            match chars.next() {
                Some((_, c)) if c.is_ascii_hexdigit() => digits.push(c),
                _ => bail!("\\u escape needs 4 hex digits"),
            }
        }
    }
    let code = u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())?;
    char::from_u32(code).ok_or_else(|| format!("invalid code point U+{:X}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &str) -> Vec<String> {
        tokenize(line).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_splits_on_whitespace() {
        assert_eq!(texts("  PUSH_INT\t42  "), vec!["PUSH_INT", "42"]);
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_comments() {
        assert_eq!(texts("ADD # sum"), vec!["ADD"]);
        assert_eq!(texts("ADD# sum"), vec!["ADD"]);
        assert_eq!(texts(r#"PUSH_STR "a # b""#), vec!["PUSH_STR", "a # b"]);
        assert!(tokenize("# only a comment").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_tokens() {
        let tokens = tokenize(r#"PUSH_STR "hello world""#).unwrap();
        assert_eq!(tokens[1], Token { text: "hello world".into(), quoted: true });
        assert!(!tokens[0].quoted);
        assert_eq!(texts(r#"PUSH_STR """#), vec!["PUSH_STR", ""]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            texts(r#""a\nb\t\r\0\\\"\'""#),
            vec!["a\nb\t\r\0\\\"'".to_string()]
        );
        assert_eq!(texts(r#""é\u{1F600}""#), vec!["é😀".to_string()]);
    }

    #[test]
    fn test_malformed_strings() {
        assert!(tokenize(r#""open"#).is_err());
        assert!(tokenize(r#""\q""#).is_err());
        assert!(tokenize(r#""\u12""#).is_err());
        assert!(tokenize(r#""\u{}""#).is_err());
        assert!(tokenize(r#""\u{D800}""#).is_err());
        assert!(tokenize(r#""\u{1234567}""#).is_err());
        assert!(tokenize(r#""a"b"#).is_err());
    }
}
