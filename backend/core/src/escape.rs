//! CSS identifier escaping (the CSSOM `CSS.escape` algorithm).

use std::fmt::Write;

/// Escape `ident` so it can be embedded in a selector and match literally.
pub fn escape_identifier(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (i, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1F).contains(&code)
            || code == 0x7F
            || (i == 0 && ch.is_ascii_digit())
            || (i == 1 && ch.is_ascii_digit() && chars[0] == '-')
        {
            let _ = write!(out, "\\{code:x} ");
        } else if i == 0 && ch == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_are_untouched() {
        assert_eq!(escape_identifier("ad-banner"), "ad-banner");
        assert_eq!(escape_identifier("_private"), "_private");
        assert_eq!(escape_identifier("über"), "über");
    }

    #[test]
    fn leading_digits_become_code_points() {
        assert_eq!(escape_identifier("42"), "\\34 2");
        assert_eq!(escape_identifier("-1x"), "-\\31 x");
    }

    #[test]
    fn punctuation_is_backslash_escaped() {
        assert_eq!(escape_identifier("a:b"), "a\\:b");
        assert_eq!(escape_identifier("w-1/2"), "w-1\\/2");
        assert_eq!(escape_identifier("-"), "\\-");
    }
}
