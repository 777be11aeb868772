//! Numeral and byte-block literals used for defaults, expected values and bit masks

/// Parse an integer literal: decimal or `0x` hexadecimal, optionally signed
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a float literal; hexadecimal integers are accepted as well
pub(crate) fn parse_float(text: &str) -> Option<f32> {
    let text = text.trim();
    if text.contains("0x") || text.contains("0X") {
        return parse_int(text).map(|v| v as f32);
    }
    text.parse::<f32>().ok()
}

/// Decode a string of hex digit pairs into exactly `size` bytes
pub(crate) fn parse_hex_bytes(text: &str, size: usize) -> Option<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    let bytes = hex::decode(digits).ok()?;
    (bytes.len() == size).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("0x182007d"), Some(0x182007d));
        assert_eq!(parse_int("0XFF"), Some(255));
        assert_eq!(parse_int(" 0xffffffff "), Some(0xffff_ffff));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("1.0"), Some(1.0));
        assert_eq!(parse_float("-2.5e1"), Some(-25.0));
        assert_eq!(parse_float("0x10"), Some(16.0));
        assert_eq!(parse_float("inf"), Some(f32::INFINITY));
        assert_eq!(parse_float("one"), None);
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(
            parse_hex_bytes("3433444d", 4),
            Some(vec![0x34, 0x33, 0x44, 0x4d])
        );
        assert_eq!(parse_hex_bytes("00 ff", 2), Some(vec![0x00, 0xff]));
        assert_eq!(parse_hex_bytes("00ff", 3), None);
        assert_eq!(parse_hex_bytes("zz", 1), None);
    }
}
