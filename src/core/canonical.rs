//! Canonical serialization and SHA-256 checksums for journal records.
//!
//! The canonical form is the one every existing journal was hashed with:
//! object keys sorted by code point, `", "` / `": "` separators, strings
//! escaped to pure ASCII (`\uXXXX`, surrogate pairs above the BMP), and
//! floats rendered in shortest round-trip form with a `1e+16` style
//! exponent outside `[1e-4, 1e16)`. Insertion order never reaches the
//! digest.

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Field that carries the digest and is excluded from it.
pub const CHECKSUM_FIELD: &str = "checksum";

/// Render `value` in canonical form.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, None);
    out
}

/// Canonical form of `value` with the top-level checksum field left out.
pub fn canonical_without_checksum(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, Some(CHECKSUM_FIELD));
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest over every field of `record` except the checksum itself.
pub fn hash_entry(record: &Value) -> String {
    sha256_hex(canonical_without_checksum(record).as_bytes())
}

/// True only when `record` carries a checksum equal to the recomputed digest.
/// A record with no checksum field is unverifiable and yields false.
pub fn verify_entry(record: &Value) -> bool {
    match record.get(CHECKSUM_FIELD) {
        Some(Value::String(stored)) => *stored == hash_entry(record),
        _ => false,
    }
}

pub fn has_checksum(record: &Value) -> bool {
    record
        .as_object()
        .is_some_and(|obj| obj.contains_key(CHECKSUM_FIELD))
}

fn write_value(out: &mut String, value: &Value, skip_key: Option<&str>) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, None);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| skip_key != Some(k.as_str()))
                .collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, &map[key.as_str()], None);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{}", i);
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{}", u);
    } else if n.is_f64() {
        if let Some(f) = n.as_f64() {
            write_float(out, f);
        }
    } else {
        // Integer wider than 64 bits: the parsed digits are kept verbatim.
        let _ = write!(out, "{}", n);
    }
}

fn write_float(out: &mut String, f: f64) {
    if f == 0.0 {
        out.push_str(if f.is_sign_negative() { "-0.0" } else { "0.0" });
        return;
    }

    // `{:e}` yields the shortest round-trip digits, e.g. `-1.25e-7`.
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    out.push_str(sign);
    if (-4..16).contains(&exp) {
        let point = exp + 1;
        if point <= 0 {
            out.push_str("0.");
            out.push_str(&"0".repeat((-point) as usize));
            out.push_str(&digits);
        } else if point as usize >= digits.len() {
            out.push_str(&digits);
            out.push_str(&"0".repeat(point as usize - digits.len()));
            out.push_str(".0");
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        }
    } else {
        out.push_str(mantissa);
        let exp_sign = if exp < 0 { '-' } else { '+' };
        let _ = write!(out, "e{}{:02}", exp_sign, exp.abs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "m": null}, "c": [{"y": 1, "x": 2}]});
        assert_eq!(
            canonical_string(&value),
            r#"{"a": {"m": null, "z": true}, "b": 1, "c": [{"x": 2, "y": 1}]}"#
        );
    }

    #[test]
    fn strings_escaped_to_ascii() {
        let value = json!("tab\there \"q\" é 🦀 \u{7f}");
        assert_eq!(
            canonical_string(&value),
            r#""tab\there \"q\" \u00e9 \ud83e\udd80 \u007f""#
        );
    }

    #[test]
    fn floats_use_shortest_repr() {
        let cases = [
            (1.0, "1.0"),
            (0.1, "0.1"),
            (-2.5, "-2.5"),
            (123456.789, "123456.789"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (1e15, "1000000000000000.0"),
            (1e16, "1e+16"),
            (1.5e-7, "1.5e-07"),
            (2.5e300, "2.5e+300"),
        ];
        for (input, expected) in cases {
            assert_eq!(canonical_string(&json!(input)), expected, "input {input}");
        }
    }

    #[test]
    fn wide_integers_keep_their_digits() {
        let value: Value =
            serde_json::from_str(r#"{"big": 18446744073709551616, "neg": -99999999999999999999}"#)
                .unwrap();
        assert_eq!(
            canonical_string(&value),
            r#"{"big": 18446744073709551616, "neg": -99999999999999999999}"#
        );
        let float: Value = serde_json::from_str("[1.50, 2E3]").unwrap();
        assert_eq!(canonical_string(&float), "[1.5, 2000.0]");
    }

    #[test]
    fn checksum_field_excluded_only_at_top_level() {
        let with = json!({"a": 1, "checksum": "abc", "nested": {"checksum": "keep"}});
        assert_eq!(
            canonical_without_checksum(&with),
            r#"{"a": 1, "nested": {"checksum": "keep"}}"#
        );
    }

    #[test]
    fn known_digest_is_stable() {
        // sha256 of `{"a": 1}`
        assert_eq!(
            hash_entry(&json!({"a": 1})),
            "f9d86028c6e0d64e225186f96acb69338b2c59764df79162107f5c4bb34d1310"
        );
    }

    #[test]
    fn verify_rejects_missing_and_non_string_checksum() {
        let mut record = json!({"content": "x"});
        assert!(!verify_entry(&record));
        assert!(!has_checksum(&record));

        record["checksum"] = json!(42);
        assert!(has_checksum(&record));
        assert!(!verify_entry(&record));

        let digest = hash_entry(&record);
        record["checksum"] = json!(digest);
        assert!(verify_entry(&record));
    }
}
