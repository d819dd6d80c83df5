//! MySQL string literal escaping.
//!
//! Statements are parsed without unescaping so untouched literals are written
//! back exactly as the dump had them. A masked literal is unescaped before its
//! template runs and the rendered text is escaped again before it goes back
//! into the statement. Hex literals are handled the same way with
//! [`decode_hex`] and [`encode_hex`].

use std::borrow::Cow;

/// Decode the raw content of a quoted literal into the value it denotes.
///
/// `quote` is the delimiter of the literal; a doubled delimiter inside the
/// content stands for one delimiter character.
pub fn unescape(raw: &str, quote: char) -> Cow<'_, str> {
    if !raw.contains('\\') && !raw.contains(quote) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('Z') => out.push('\u{1a}'),
                // `\%` and `\_` keep their backslash.
                Some(c @ ('%' | '_')) => {
                    out.push('\\');
                    out.push(c);
                }
                Some(c) => out.push(c),
                None => out.push('\\'),
            },
            c if c == quote && chars.peek() == Some(&quote) => {
                chars.next();
                out.push(quote);
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Encode a value as quoted-literal content, escaping the characters
/// `mysqldump` escapes.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 8);
    for ch in value.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// Decode the digits of a hex literal. `None` for an odd digit count or a
/// non-hex character.
pub fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

/// Encode bytes as uppercase hex digits, the way `mysqldump --hex-blob`
/// writes them.
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(DIGITS[usize::from(byte >> 4)] as char);
        out.push(DIGITS[usize::from(byte & 0x0f)] as char);
    }
    out
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_content_is_borrowed() {
        assert!(matches!(unescape("alice", '\''), Cow::Borrowed("alice")));
    }

    #[test]
    fn decodes_backslash_and_doubled_quotes() {
        assert_eq!(unescape(r"O\'Brien", '\''), "O'Brien");
        assert_eq!(unescape("O''Brien", '\''), "O'Brien");
        assert_eq!(unescape(r#"say \"hi\""#, '"'), "say \"hi\"");
        assert_eq!(unescape(r#"say ""hi"""#, '"'), "say \"hi\"");
        assert_eq!(unescape(r"line\nbreak\ttab", '\''), "line\nbreak\ttab");
        assert_eq!(unescape(r"C:\\dir", '\''), r"C:\dir");
        assert_eq!(unescape(r"50\%", '\''), r"50\%");
    }

    #[test]
    fn encodes_special_characters() {
        assert_eq!(escape("O'Brien"), r"O\'Brien");
        assert_eq!(escape("a\"b"), r#"a\"b"#);
        assert_eq!(escape("C:\\dir"), r"C:\\dir");
        assert_eq!(escape("x\ny\0"), r"x\ny\0");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn escape_inverts_unescape() {
        for value in ["O'Brien", "tab\there", "back\\slash", "quote\"d", "\u{1a}end"] {
            assert_eq!(unescape(&escape(value), '\''), value);
        }
    }

    #[test]
    fn hex_digits_decode_in_pairs() {
        assert_eq!(decode_hex("414243"), Some(b"ABC".to_vec()));
        assert_eq!(decode_hex("ff00Ab"), Some(vec![0xff, 0x00, 0xab]));
        assert_eq!(decode_hex(""), Some(vec![]));
        assert_eq!(decode_hex("ABC"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn hex_encoding_is_uppercase() {
        assert_eq!(encode_hex(b"ABC"), "414243");
        assert_eq!(encode_hex(&[0x00, 0xab, 0xff]), "00ABFF");
        assert_eq!(encode_hex(&[]), "");
    }
}
