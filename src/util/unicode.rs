//! Character classes of the lexical grammar and UTF-16 indexing
//!
//! Script strings are stored as UTF-8 but measured and indexed in UTF-16
//! code units, as `length` and `s[i]` require.

/// LF, CR, LS and PS
#[inline]
pub fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Whitespace that separates tokens, line terminators excluded
pub fn is_whitespace(c: char) -> bool {
    match c {
        '\t' | '\u{000B}' | '\u{000C}' | ' ' | '\u{00A0}' | '\u{FEFF}' => true,
        c if c.is_ascii() => false,
        // Zs category
        c => matches!(c, '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'),
    }
}

pub fn is_id_start(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_alphabetic() || c == '_' || c == '$'
    } else {
        c.is_alphabetic()
    }
}

/// Identifier part: start characters plus digits, marks and ZWNJ/ZWJ
pub fn is_id_continue(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_alphanumeric() || c == '_' || c == '$'
    } else {
        c.is_alphanumeric() || matches!(c, '\u{200C}' | '\u{200D}') || is_combining_mark(c)
    }
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{20D0}'..='\u{20FF}' | '\u{FE20}'..='\u{FE2F}')
}

/// Length in UTF-16 code units
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Character starting at UTF-16 offset `index`
///
/// `None` past the end and for an offset that points at the second half of
/// a surrogate pair.
pub fn char_at_utf16(s: &str, index: usize) -> Option<char> {
    let mut offset = 0;
    s.chars()
        .find_map(|c| {
            let here = offset;
            offset += c.len_utf16();
            (here >= index).then_some((here == index).then_some(c))
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_classes() {
        assert!(is_line_terminator('\u{2028}'));
        assert!(!is_whitespace('\n'));
        assert!(is_whitespace('\u{3000}'));
        assert!(is_id_start('é'));
        assert!(!is_id_start('1'));
        assert!(is_id_continue('1'));
        assert!(is_id_continue('\u{0301}'));
    }

    #[test]
    fn test_utf16_indexing() {
        let s = "a😀b";
        assert_eq!(utf16_len(s), 4);
        assert_eq!(char_at_utf16(s, 0), Some('a'));
        assert_eq!(char_at_utf16(s, 1), Some('😀'));
        assert_eq!(char_at_utf16(s, 2), None);
        assert_eq!(char_at_utf16(s, 3), Some('b'));
        assert_eq!(char_at_utf16(s, 4), None);
    }
}
