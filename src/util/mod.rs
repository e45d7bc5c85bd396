//! Utility functions
//!
//! Number formatting and Unicode helpers shared by the lexer and the
//! value conversions.

pub mod dtoa;
pub mod unicode;

pub use dtoa::{number_to_string, string_to_number};
pub use unicode::utf16_len;

/// Check whether `key` is a canonical array index ("0", "1", ... without
/// leading zeros, below 2^32 - 1)
pub fn array_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let idx: u64 = key.parse().ok()?;
    if idx < u32::MAX as u64 {
        Some(idx as usize)
    } else {
        None
    }
}
