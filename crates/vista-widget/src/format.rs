//! Cell and header value formatting.
//!
//! [`format_value`] is total: every input produces a string and nothing panics.

use serde_json::Value;

use crate::model::ColumnFormat;

/// Placeholder rendered for null or empty values.
pub const EMPTY_PLACEHOLDER: &str = "—";

/// Render a raw value under a display format.
///
/// Numeric formats accept numbers and numeric strings; anything else is
/// returned as its plain text.
pub fn format_value(value: Option<&Value>, format: ColumnFormat) -> String {
    let raw = match value {
        None | Some(Value::Null) => return EMPTY_PLACEHOLDER.to_string(),
        Some(Value::String(s)) if s.is_empty() => return EMPTY_PLACEHOLDER.to_string(),
        Some(v) => v,
    };

    if format == ColumnFormat::Text {
        return plain_text(raw);
    }

    let Some(number) = as_number(raw) else {
        return plain_text(raw);
    };

    match format {
        ColumnFormat::Currency => {
            // The sign follows the currency symbol.
            let (negative, int, frac) = split_fixed(number, 2);
            let sign = if negative { "-" } else { "" };
            format!("${sign}{}.{frac}", group_thousands(&int))
        }
        ColumnFormat::Percent => {
            let (negative, int, frac) = split_fixed(number, 2);
            let sign = if negative { "-" } else { "" };
            format!("{sign}{int}.{frac}%")
        }
        ColumnFormat::Number => {
            let (negative, int, frac) = split_fixed(number, 3);
            let sign = if negative { "-" } else { "" };
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{sign}{}", group_thousands(&int))
            } else {
                format!("{sign}{}.{frac}", group_thousands(&int))
            }
        }
        ColumnFormat::Text => plain_text(raw),
    }
}

/// Strict numeric coercion: numbers and fully numeric strings, finite only.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Text rendering without quotes for strings.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => EMPTY_PLACEHOLDER.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fixed-point split into sign, integer digits and fraction digits.
fn split_fixed(number: f64, digits: usize) -> (bool, String, String) {
    let rendered = format!("{:.*}", digits, number.abs());
    let (int, frac) = rendered
        .split_once('.')
        .map(|(i, f)| (i.to_string(), f.to_string()))
        .unwrap_or((rendered.clone(), String::new()));
    let is_zero = int.chars().chain(frac.chars()).all(|c| c == '0');
    (number < 0.0 && !is_zero, int, frac)
}

/// Insert commas every three digits from the right.
pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fmt(value: Value, format: ColumnFormat) -> String {
        format_value(Some(&value), format)
    }

    #[test]
    fn test_null_and_empty_render_placeholder() {
        for format in [
            ColumnFormat::Text,
            ColumnFormat::Currency,
            ColumnFormat::Percent,
            ColumnFormat::Number,
        ] {
            assert_eq!(format_value(None, format), "—");
            assert_eq!(fmt(Value::Null, format), "—");
            assert_eq!(fmt(json!(""), format), "—");
        }
    }

    #[test]
    fn test_currency() {
        assert_eq!(fmt(json!("1234.5"), ColumnFormat::Currency), "$1,234.50");
        assert_eq!(fmt(json!(1234567.891), ColumnFormat::Currency), "$1,234,567.89");
        assert_eq!(fmt(json!(0), ColumnFormat::Currency), "$0.00");
        assert_eq!(fmt(json!(-42.1), ColumnFormat::Currency), "$-42.10");
        assert_eq!(fmt(json!("-1234.5"), ColumnFormat::Currency), "$-1,234.50");
    }

    #[test]
    fn test_percent() {
        assert_eq!(fmt(json!(12.3456), ColumnFormat::Percent), "12.35%");
        assert_eq!(fmt(json!("7"), ColumnFormat::Percent), "7.00%");
    }

    #[test]
    fn test_number_grouping_and_fraction_digits() {
        assert_eq!(fmt(json!(1234567), ColumnFormat::Number), "1,234,567");
        assert_eq!(fmt(json!(1234.5), ColumnFormat::Number), "1,234.5");
        assert_eq!(fmt(json!(0.123456), ColumnFormat::Number), "0.123");
        assert_eq!(fmt(json!(-999.9999), ColumnFormat::Number), "-1,000");
    }

    #[test]
    fn test_non_numeric_passthrough() {
        assert_eq!(fmt(json!("abc"), ColumnFormat::Number), "abc");
        assert_eq!(fmt(json!("12abc"), ColumnFormat::Currency), "12abc");
        assert_eq!(fmt(json!(true), ColumnFormat::Percent), "true");
    }

    #[test]
    fn test_text_is_unquoted() {
        assert_eq!(fmt(json!("Apple Inc."), ColumnFormat::Text), "Apple Inc.");
        assert_eq!(fmt(json!(42), ColumnFormat::Text), "42");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1,234");
        assert_eq!(group_thousands("123456"), "123,456");
    }
}
