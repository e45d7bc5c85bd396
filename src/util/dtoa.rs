//! Number <-> string conversion
//!
//! Implements the JavaScript `Number::toString` layout on top of the
//! shortest round-trip digits produced by Rust's `{:e}` formatting, and the
//! `StringToNumber` grammar used by `ToNumber`.

use super::unicode::{is_line_terminator, is_whitespace};

/// Format a number the way JavaScript's `String(n)` does
pub fn number_to_string(val: f64) -> String {
    if val.is_nan() {
        return "NaN".to_string();
    }
    if val == 0.0 {
        // Covers -0 as well
        return "0".to_string();
    }
    if val.is_infinite() {
        return if val > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if val < 0.0 {
        return format!("-{}", number_to_string(-val));
    }

    let sci = format!("{:e}", val);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exp: i32 = exp.parse().unwrap_or(0);
    let k = digits.len() as i32;
    // Position of the decimal point relative to the digit string
    let n = exp + 1;

    if k <= n && n <= 21 {
        let mut out = digits;
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
        out
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        if k == 1 {
            format!("{}e{}{}", digits, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e.abs())
        }
    }
}

/// Parse a string with JavaScript `ToNumber` semantics
///
/// Returns NaN for anything that is not a valid numeric literal.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| is_whitespace(c) || is_line_terminator(c));
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return parse_radix(rest, radix);
        }
    }

    // Rust accepts "inf"/"nan"; JavaScript does not
    let valid = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse an unsigned integer literal in the given radix
fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut result = 0.0f64;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => result = result * radix as f64 + d as f64,
            None => return f64::NAN,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-123.0), "-123");
        assert_eq!(number_to_string(2147483647.0), "2147483647");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(3.25), "3.25");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  12  "), 12.0);
        assert_eq!(string_to_number("-1.5"), -1.5);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number("Infinity"), f64::INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("0xzz").is_nan());
    }
}
