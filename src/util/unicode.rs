//! Unicode utilities
//!
//! Character classes used by the lexer and string builtins, plus UTF-16
//! helpers for code unit sequences that may contain lone surrogates.

/// Check if a code point is a line terminator
#[inline]
pub fn is_line_terminator(c: u32) -> bool {
    matches!(c, 0x000A | 0x000D | 0x2028 | 0x2029)
}

/// Check if a code point is whitespace (line terminators excluded)
#[inline]
pub fn is_whitespace(c: u32) -> bool {
    matches!(
        c,
        0x0009  // Tab
        | 0x000B // Vertical Tab
        | 0x000C // Form Feed
        | 0x0020 // Space
        | 0x00A0 // No-Break Space
        | 0xFEFF // BOM
    ) || is_unicode_space(c)
}

/// Check if a code point is a Unicode space character
#[inline]
pub fn is_unicode_space(c: u32) -> bool {
    matches!(c, 0x1680 | 0x2000..=0x200A | 0x202F | 0x205F | 0x3000)
}

/// Check if a code point can start an identifier
#[inline]
pub fn is_id_start(c: u32) -> bool {
    matches!(c, 0x61..=0x7A | 0x41..=0x5A | 0x5F | 0x24) // a-z, A-Z, _, $
        || (c >= 0x80 && char::from_u32(c).is_some_and(char::is_alphabetic))
}

/// Check if a code point can continue an identifier
#[inline]
pub fn is_id_continue(c: u32) -> bool {
    matches!(c, 0x61..=0x7A | 0x41..=0x5A | 0x30..=0x39 | 0x5F | 0x24) // a-z, A-Z, 0-9, _, $
        || matches!(c, 0x200C | 0x200D)
        || (c >= 0x80 && char::from_u32(c).is_some_and(char::is_alphanumeric))
}

/// Check for whitespace as `String.prototype.trim` sees it
#[inline]
pub fn is_trim_space(unit: u16) -> bool {
    is_whitespace(unit as u32) || is_line_terminator(unit as u32)
}

/// Append a code point as UTF-16
pub fn push_code_point(out: &mut Vec<u16>, c: u32) {
    if c < 0x10000 {
        out.push(c as u16);
    } else {
        let c = c - 0x10000;
        out.push(0xD800 | (c >> 10) as u16);
        out.push(0xDC00 | (c & 0x3FF) as u16);
    }
}

/// Map every character through a case conversion, keeping lone surrogates
pub fn map_case(units: &[u16], upper: bool) -> Vec<u16> {
    let mut out = Vec::with_capacity(units.len());
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                let mut buf = [0u16; 2];
                if upper {
                    for m in c.to_uppercase() {
                        out.extend_from_slice(m.encode_utf16(&mut buf));
                    }
                } else {
                    for m in c.to_lowercase() {
                        out.extend_from_slice(m.encode_utf16(&mut buf));
                    }
                }
            }
            Err(e) => out.push(e.unpaired_surrogate()),
        }
    }
    out
}

/// Trim leading and trailing whitespace
pub fn trim(units: &[u16]) -> &[u16] {
    let start = units.iter().position(|&u| !is_trim_space(u)).unwrap_or(units.len());
    let end = units
        .iter()
        .rposition(|&u| !is_trim_space(u))
        .map_or(start, |i| i + 1);
    &units[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_line_terminator() {
        assert!(is_line_terminator(0x0A));
        assert!(is_line_terminator(0x0D));
        assert!(is_line_terminator(0x2028));
        assert!(!is_line_terminator(0x20));
    }

    #[test]
    fn test_whitespace() {
        assert!(is_whitespace(0x20));
        assert!(is_whitespace(0x09));
        assert!(is_whitespace(0xA0));
        assert!(!is_whitespace(0x41));
        assert!(!is_whitespace(0x0A));
    }

    #[test]
    fn test_id_chars() {
        assert!(is_id_start('a' as u32));
        assert!(is_id_start('$' as u32));
        assert!(is_id_start('é' as u32));
        assert!(!is_id_start('0' as u32));
        assert!(is_id_continue('0' as u32));
        assert!(!is_id_continue('-' as u32));
    }

    #[test]
    fn test_push_code_point() {
        let mut out = Vec::new();
        push_code_point(&mut out, 0x41);
        push_code_point(&mut out, 0x1F600);
        assert_eq!(out, units("A😀"));
    }

    #[test]
    fn test_map_case() {
        assert_eq!(map_case(&units("Hello"), true), units("HELLO"));
        assert_eq!(map_case(&units("ÀB"), false), units("àb"));
        assert_eq!(map_case(&[0xD800, 0x61], true), vec![0xD800, 0x41]);
    }

    #[test]
    fn test_trim() {
        assert_eq!(trim(&units("  hi \n")), &units("hi")[..]);
        assert_eq!(trim(&units("   ")), &[] as &[u16]);
    }
}
