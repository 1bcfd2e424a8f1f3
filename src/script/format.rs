//! Number/string conversions with JavaScript semantics.

use once_cell::sync::Lazy;
use regex::Regex;

/// `Number.prototype.toString()` with no radix.
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
    if x < 0.0 {
        return format!("-{}", number_to_string(-x));
    }

    // Shortest round-trip digits, then laid out the way JS does.
    let sci = format!("{:e}", x);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exp + 1;

    if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{}.{}", int, frac)
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

/// `Number.prototype.toString(radix)`.
pub fn number_to_radix(x: f64, radix: u32) -> String {
    if radix == 10 || !x.is_finite() {
        return number_to_string(x);
    }
    let negative = x < 0.0;
    let mut int = x.abs().trunc();
    let mut frac = x.abs() - int;

    let mut int_digits = Vec::new();
    if int == 0.0 {
        int_digits.push('0');
    }
    while int >= 1.0 {
        let d = (int % radix as f64) as u32;
        int_digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int = (int / radix as f64).trunc();
    }
    int_digits.reverse();

    let mut out: String = int_digits.into_iter().collect();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..52 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac -= d as f64;
            if frac <= 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

/// True when `x * 10^digits` lies exactly halfway between two integers.
fn is_decimal_tie(x: f64, digits: usize) -> bool {
    if x == 0.0 || !x.is_finite() {
        return false;
    }
    let bits = x.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut m, mut e) = if exp_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exp_bits - 1075)
    };
    while m & 1 == 0 {
        m >>= 1;
        e += 1;
    }
    e + digits as i32 == -1
}

/// Adds one unit in the last place of a plain decimal string.
fn increment_decimal(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    let mut i = chars.len();
    while i > 0 {
        i -= 1;
        match chars[i] {
            '.' => continue,
            '9' => chars[i] = '0',
            c => {
                chars[i] = std::char::from_digit(c.to_digit(10).unwrap_or(0) + 1, 10).unwrap_or('0');
                return chars.into_iter().collect();
            }
        }
    }
    chars.insert(0, '1');
    chars.into_iter().collect()
}

/// `Number.prototype.toFixed`. Exact ties round away from zero.
pub fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() || x.abs() >= 1e21 {
        return number_to_string(x);
    }
    let abs = x.abs();
    let body = if is_decimal_tie(abs, digits) {
        let mut long = format!("{:.*}", digits + 1, abs);
        long.pop();
        if long.ends_with('.') {
            long.pop();
        }
        increment_decimal(&long)
    } else {
        format!("{:.*}", digits, abs)
    };
    if x < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// `Number.prototype.toExponential(digits)`.
pub fn to_exponential(x: f64, digits: Option<usize>) -> String {
    if !x.is_finite() {
        return number_to_string(x);
    }
    let sci = match digits {
        Some(d) => format!("{:.*e}", d, x),
        None => format!("{:e}", x),
    };
    match sci.split_once('e') {
        Some((m, e)) if e.starts_with('-') => format!("{}e{}", m, e),
        Some((m, e)) => format!("{}e+{}", m, e),
        None => sci,
    }
}

/// `Number.prototype.toPrecision(precision)`.
pub fn to_precision(x: f64, precision: usize) -> String {
    if !x.is_finite() || x == 0.0 {
        return if x == 0.0 {
            to_fixed(0.0, precision.saturating_sub(1))
        } else {
            number_to_string(x)
        };
    }
    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, x);
    let exp: i32 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exp < -6 || exp >= p as i32 {
        to_exponential(x, Some(p - 1))
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, x)
    }
}

/// `toLocaleString()` for the `en-US` locale: grouping, at most three
/// fraction digits.
pub fn to_locale_string(x: f64) -> String {
    if !x.is_finite() {
        return number_to_string(x);
    }
    let fixed = to_fixed(x, 3);
    let (sign, rest) = match fixed.strip_prefix('-') {
        Some(r) => ("-", r),
        None => ("", fixed.as_str()),
    };
    let (int, frac) = rest.split_once('.').unwrap_or((rest, ""));
    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let frac = frac.trim_end_matches('0');
    let sign = if grouped == "0" && frac.is_empty() { "" } else { sign };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

pub fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// `Number(string)`.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_js_whitespace);
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0b", 2), ("0B", 2), ("0o", 8), ("0O", 8)] {
        if let Some(rest) = t.strip_prefix(prefix) {
            return u64::from_str_radix(rest, radix).map_or(f64::NAN, |v| v as f64);
        }
    }
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("valid float regex")
});

/// `parseFloat`.
pub fn parse_float(s: &str) -> f64 {
    let t = s.trim_start_matches(is_js_whitespace);
    let Some(m) = FLOAT_PREFIX.find(t) else {
        return f64::NAN;
    };
    match m.as_str().trim_start_matches('+') {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        text => text.parse().unwrap_or(f64::NAN),
    }
}

/// `parseInt`.
pub fn parse_int(s: &str, radix: Option<u32>) -> f64 {
    let mut t = s.trim_start_matches(is_js_whitespace);
    let mut sign = 1.0;
    if let Some(rest) = t.strip_prefix('-') {
        sign = -1.0;
        t = rest;
    } else if let Some(rest) = t.strip_prefix('+') {
        t = rest;
    }

    let mut radix = radix.unwrap_or(0);
    if radix != 0 && !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 0 || radix == 16 {
        if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            t = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }

    let mut value = 0.0;
    let mut any = false;
    for c in t.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * radix as f64 + d as f64;
        any = true;
    }
    if any {
        sign * value
    } else {
        f64::NAN
    }
}

pub fn to_int32(x: f64) -> i32 {
    to_uint32(x) as i32
}

pub fn to_uint32(x: f64) -> u32 {
    if !x.is_finite() {
        return 0;
    }
    x.trunc().rem_euclid(4294967296.0) as u32
}

/// ToIntegerOrInfinity: NaN becomes 0, fractions truncate.
pub fn to_integer(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.trunc()
    }
}

/// Resolves a relative index (`slice`, `at`, ...) against a length.
pub fn relative_index(x: f64, len: usize) -> usize {
    let n = to_integer(x);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_like_javascript() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789.0), "123456789");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn to_fixed_rounds_ties_away_from_zero() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(10.125, 2), "10.13");
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(-1.005, 2), "-1.00");
        assert_eq!(to_fixed(0.0, 2), "0.00");
        assert_eq!(to_fixed(9.995, 2), "9.99");
    }

    #[test]
    fn precision_and_exponential() {
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.00012345, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_exponential(12345.0, Some(2)), "1.23e+4");
    }

    #[test]
    fn string_and_prefix_parsing() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(parse_int("12px", None), 12.0);
        assert_eq!(parse_int("ff", Some(16)), 255.0);
        assert!(parse_int("px", None).is_nan());
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("-.5e2x"), -50.0);
    }

    #[test]
    fn locale_grouping_and_radix() {
        assert_eq!(to_locale_string(1234567.891), "1,234,567.891");
        assert_eq!(to_locale_string(-1000.0), "-1,000");
        assert_eq!(number_to_radix(255.0, 16), "ff");
        assert_eq!(number_to_radix(5.0, 2), "101");
        assert_eq!(to_int32(4294967297.0), 1);
        assert_eq!(to_int32(-1.0), -1);
    }
}
