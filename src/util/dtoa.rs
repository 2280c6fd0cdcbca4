//! Number to string conversion and back
//!
//! `number_to_string` follows the ECMAScript Number::toString algorithm.
//! The shortest round-trip digits come from Rust's float formatting; only the
//! placement of the decimal point and exponent is done here.

/// Convert a number to its JavaScript string form
pub fn number_to_string(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let mut out = String::new();
    if x < 0.0 {
        out.push('-');
    }

    let (digits, n) = shortest_digits(x.abs());
    let k = digits.len() as i32;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(&digits);
    } else {
        let e = n - 1;
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if e < 0 { '-' } else { '+' });
        out.push_str(&e.abs().to_string());
    }
    out
}

/// Shortest decimal digits of a positive finite number and the position of
/// the decimal point (value = 0.d1d2... * 10^n)
fn shortest_digits(x: f64) -> (String, i32) {
    let formatted = format!("{:e}", x);
    let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    (digits.to_string(), exp + 1)
}

const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Convert a number to a string in the given radix (2..=36)
pub fn number_to_string_radix(x: f64, radix: u32) -> String {
    if radix == 10 || !x.is_finite() || x == 0.0 {
        return number_to_string(x);
    }
    let negative = x < 0.0;
    let x = x.abs();
    let mut int_part = x.trunc();
    let mut frac = x - int_part;

    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push(b'0');
    }
    while int_part >= 1.0 {
        let d = (int_part % radix as f64) as usize;
        int_digits.push(DIGITS[d]);
        int_part = (int_part / radix as f64).trunc();
    }
    int_digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(std::str::from_utf8(&int_digits).unwrap_or("0"));

    if frac > 0.0 {
        out.push('.');
        // 52 bits of mantissa is enough precision for any radix >= 2
        for _ in 0..52 {
            frac *= radix as f64;
            let d = frac.trunc();
            out.push(DIGITS[d as usize] as char);
            frac -= d;
            if frac == 0.0 {
                break;
            }
        }
        while out.ends_with('0') {
            out.pop();
        }
    }
    out
}

/// Number.prototype.toFixed
pub fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() || x.abs() >= 1e21 {
        return number_to_string(x);
    }
    let s = format!("{:.*}", digits, x);
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
        // -0.00 prints without the sign
        return s[1..].to_string();
    }
    s
}

/// Check for a JavaScript whitespace or line terminator character
fn is_js_space(c: char) -> bool {
    crate::util::unicode::is_whitespace(c as u32) || crate::util::unicode::is_line_terminator(c as u32)
}

/// StringToNumber: the conversion used by `Number(s)` and arithmetic
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(is_js_space);
    if s.is_empty() {
        return 0.0;
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return parse_radix_digits(rest, radix).unwrap_or(f64::NAN);
        }
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let valid = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid || s.contains("inf") {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse a whole digit string in a radix; None if empty or invalid
pub fn parse_radix_digits(s: &str, radix: u32) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let mut n = 0.0f64;
    for c in s.chars() {
        let d = c.to_digit(radix)?;
        n = n * radix as f64 + d as f64;
    }
    Some(n)
}

/// parseFloat: longest decimal prefix
pub fn parse_float(s: &str) -> f64 {
    let s = s.trim_start_matches(is_js_space);
    let (sign, body) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if body.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = body.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        seen_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            seen_digit = true;
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    let text = body[..end].trim_end_matches('.');
    sign * text.parse::<f64>().unwrap_or(f64::NAN)
}

/// parseInt with an optional radix (0 = detect)
pub fn parse_int(s: &str, radix: u32) -> f64 {
    let s = s.trim_start_matches(is_js_space);
    let (sign, mut body) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(rest) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            body = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let end = body
        .char_indices()
        .find(|(_, c)| c.to_digit(radix).is_none())
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    match parse_radix_digits(&body[..end], radix) {
        Some(n) if radix == 10 => sign * body[..end].parse::<f64>().unwrap_or(n),
        Some(n) => sign * n,
        None => f64::NAN,
    }
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
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(1.25), "1.25");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(std::f64::consts::PI), "3.141592653589793");
    }

    #[test]
    fn test_special() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_radix() {
        assert_eq!(number_to_string_radix(255.0, 16), "ff");
        assert_eq!(number_to_string_radix(255.0, 2), "11111111");
        assert_eq!(number_to_string_radix(-35.0, 36), "-z");
        assert_eq!(number_to_string_radix(0.5, 2), "0.1");
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.2345, 2), "1.23");
        assert_eq!(to_fixed(3.0, 0), "3");
        assert_eq!(to_fixed(-0.0001, 2), "0.00");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
    }

    #[test]
    fn test_parse_float_and_int() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("  -2e3x"), -2000.0);
        assert_eq!(parse_float("5."), 5.0);
        assert!(parse_float("abc").is_nan());
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("0x1F", 0), 31.0);
        assert_eq!(parse_int("-101", 2), -5.0);
        assert!(parse_int("z", 10).is_nan());
    }
}
