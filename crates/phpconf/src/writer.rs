//! Writer for generating config document content.
//!
//! Output follows PHP's `var_export` layout, which is what ownCloud itself
//! writes, so a document that ownCloud produced serializes back to the same
//! bytes.

use crate::types::{Array, ConfigDocument, Key, Value};

const INDENT: &str = "  ";

/// Serialize a document to a string.
pub fn write_string(doc: &ConfigDocument) -> String {
    let mut output = format!("<?php\n${} = ", doc.variable);
    write_array(&mut output, &doc.entries, 0);
    output.push_str(";\n");
    output
}

/// Write an `array (...)` body whose opening line is already positioned.
fn write_array(output: &mut String, array: &Array, depth: usize) {
    let pad = INDENT.repeat(depth);
    output.push_str("array (\n");
    for (key, value) in array.iter() {
        output.push_str(&pad);
        output.push_str(INDENT);
        write_key(output, key);
        output.push_str(" => ");
        if let Value::Array(nested) = value {
            output.push('\n');
            output.push_str(&pad);
            output.push_str(INDENT);
            write_array(output, nested, depth + 1);
        } else {
            write_scalar(output, value);
        }
        output.push_str(",\n");
    }
    output.push_str(&pad);
    output.push(')');
}

fn write_key(output: &mut String, key: &Key) {
    match key {
        Key::Int(i) => output.push_str(&i.to_string()),
        Key::Str(s) => write_quoted(output, s),
    }
}

fn write_scalar(output: &mut String, value: &Value) {
    match value {
        Value::Null => output.push_str("NULL"),
        Value::Bool(true) => output.push_str("true"),
        Value::Bool(false) => output.push_str("false"),
        Value::Int(i) => output.push_str(&i.to_string()),
        Value::Float(f) => output.push_str(&format_float(*f)),
        Value::String(s) => write_quoted(output, s),
        // Nested arrays need the depth, see write_array
        Value::Array(nested) => write_array(output, nested, 0),
    }
}

/// Format a float the way `var_export` does: always with a decimal point.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let repr = format!("{f:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let mantissa = if mantissa.contains('.') {
                mantissa.to_string()
            } else {
                format!("{mantissa}.0")
            };
            let exponent = exponent
                .strip_prefix('-')
                .map_or_else(|| format!("+{exponent}"), |e| format!("-{e}"));
            format!("{mantissa}E{exponent}")
        }
        None if repr.contains('.') => repr,
        None => format!("{repr}.0"),
    }
}

fn write_quoted(output: &mut String, s: &str) {
    output.push('\'');
    for c in s.chars() {
        match c {
            '\\' => output.push_str("\\\\"),
            '\'' => output.push_str("\\'"),
            c => output.push(c),
        }
    }
    output.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_write_var_export_layout() {
        let mut doc = ConfigDocument::default();
        doc.set("instanceid", "oc8f2a1c");
        let mut domains = Array::new();
        domains.push("localhost");
        doc.set("trusted_domains", domains);
        doc.set("installed", true);
        doc.set("theme", Value::Null);

        let expected = "<?php\n$CONFIG = array (\n  'instanceid' => 'oc8f2a1c',\n  \
                        'trusted_domains' => \n  array (\n    0 => 'localhost',\n  ),\n  \
                        'installed' => true,\n  'theme' => NULL,\n);\n";
        assert_eq!(write_string(&doc), expected);
    }

    #[test]
    fn test_write_empty_document() {
        let doc = ConfigDocument::default();
        assert_eq!(write_string(&doc), "<?php\n$CONFIG = array (\n);\n");
    }

    #[test]
    fn test_write_escapes_quotes() {
        let mut doc = ConfigDocument::default();
        doc.set("motd", "it's C:\\owncloud");
        let output = write_string(&doc);
        assert!(output.contains(r"'motd' => 'it\'s C:\\owncloud',"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e20), "1.0E+20");
        assert_eq!(format_float(1.5e-7), "1.5E-7");
        assert_eq!(format_float(f64::INFINITY), "INF");
    }

    #[test]
    fn test_canonical_document_round_trips_byte_identical() {
        let canonical = "<?php\n$CONFIG = array (\n  'passwordsalt' => 'Zq1bX9kLmN0pQrStUvWx',\n  \
                         'trusted_domains' => \n  array (\n    0 => 'localhost',\n    \
                         1 => 'cloud.example.com',\n  ),\n  'dbport' => 3306,\n  \
                         'loglevel' => 2.5,\n  'maintenance' => false,\n);\n";
        let doc = parse(canonical).unwrap();
        assert_eq!(write_string(&doc), canonical);
    }

    #[test]
    fn test_hand_written_document_round_trips_semantically() {
        let hand = "<?php\n// edited\n$CONFIG = ['a' => \"x\\ty\", 'b' => [1, 2,], 'c' => -7];";
        let doc = parse(hand).unwrap();
        let reparsed = parse(&write_string(&doc)).unwrap();
        assert_eq!(reparsed, doc);
    }
}
