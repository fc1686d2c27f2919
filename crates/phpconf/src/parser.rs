//! Parser for PHP array-literal config documents.
//!
//! Handles the subset of PHP that ownCloud writes to `config.php`:
//! ```text
//! <?php
//! $CONFIG = array (
//!   'instanceid' => 'oc8f2a1c',
//!   'trusted_domains' =>
//!   array (
//!     0 => 'localhost',
//!   ),
//!   'installed' => true,
//! );
//! ```
//!
//! Short array syntax (`[...]`), double-quoted strings, comments and a
//! closing `?>` tag are accepted as well.

use crate::error::{Error, Result};
use crate::types::{Array, ConfigDocument, Key, Value};
use std::path::Path;

/// Parse a config document from a file path.
pub fn parse_file(path: &Path) -> Result<ConfigDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::io(path, e)
        }
    })?;
    parse(&content)
}

/// Parse a config document from a string.
pub fn parse(content: &str) -> Result<ConfigDocument> {
    Parser::new(content).document()
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(content: &'a str) -> Self {
        let src = content.as_bytes();
        // Editors on some hosts leave a BOM in front of the open tag
        let pos = if src.starts_with(b"\xEF\xBB\xBF") { 3 } else { 0 };
        Self { src, pos }
    }

    fn document(mut self) -> Result<ConfigDocument> {
        self.skip_trivia()?;
        if self.eat_keyword("<?php") {
            self.skip_trivia()?;
        }

        self.expect(b'$')?;
        let variable = self.identifier()?;
        self.skip_trivia()?;
        self.expect(b'=')?;
        self.skip_trivia()?;

        let entries = match self.value()? {
            Value::Array(array) => array,
            other => {
                return Err(self.error(format!(
                    "expected an array literal, found {}",
                    other.type_name()
                )));
            }
        };

        self.skip_trivia()?;
        self.expect(b';')?;
        self.skip_trivia()?;
        if self.eat_keyword("?>") {
            self.skip_trivia()?;
        }
        if self.pos < self.src.len() {
            return Err(self.error("unexpected content after the assignment"));
        }

        Ok(ConfigDocument { variable, entries })
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'\'') => self.single_quoted().map(Value::String),
            Some(b'"') => self.double_quoted().map(Value::String),
            Some(b'[') => {
                self.pos += 1;
                self.array_items(b']').map(Value::Array)
            }
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.keyword_value(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c as char))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn keyword_value(&mut self) -> Result<Value> {
        let start = self.pos;
        let word = self.identifier()?;
        match word.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            "nan" => Ok(Value::Float(f64::NAN)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            "array" => {
                self.skip_trivia()?;
                self.expect(b'(')?;
                self.array_items(b')').map(Value::Array)
            }
            _ => {
                self.pos = start;
                Err(self.error(format!("unsupported expression '{word}'")))
            }
        }
    }

    fn array_items(&mut self, close: u8) -> Result<Array> {
        let mut array = Array::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(array);
            }

            let first = self.value()?;
            self.skip_trivia()?;
            if self.src[self.pos..].starts_with(b"=>") {
                self.pos += 2;
                let key = self.key_from(first)?;
                self.skip_trivia()?;
                let value = self.value()?;
                array.insert(key, value);
            } else if array.push(first).is_none() {
                return Err(self.error(
                    "cannot add element to the array as the next element is already occupied",
                ));
            }

            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(c) => {
                    return Err(self.error(format!(
                        "expected ',' or '{}', found '{}'",
                        close as char, c as char
                    )));
                }
                None => return Err(self.error("unclosed array")),
            }
        }
    }

    /// Apply PHP's key casts: decimal strings and scalars become integers
    fn key_from(&self, value: Value) -> Result<Key> {
        match value {
            Value::String(s) => Ok(Key::from(s)),
            Value::Int(i) => Ok(Key::Int(i)),
            Value::Bool(b) => Ok(Key::Int(i64::from(b))),
            Value::Float(f) if f.is_finite() => Ok(Key::Int(f.trunc() as i64)),
            Value::Null => Ok(Key::Str(String::new())),
            other => Err(self.error(format!("illegal array key of type {}", other.type_name()))),
        }
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        self.skip_trivia()?;

        if self.eat_keyword("INF") {
            return Ok(Value::Float(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }

        let digits_start = self.pos;
        let rest = &self.src[self.pos..];
        if rest.len() > 1 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X' | b'b' | b'B') {
            let radix = if rest[1].eq_ignore_ascii_case(&b'x') { 16 } else { 2 };
            self.pos += 2;
            let body = self.take_while(|c| c.is_ascii_hexdigit() || c == b'_');
            return self.integer(&body, radix, negative, start);
        }

        let mut is_float = false;
        self.take_while(|c| c.is_ascii_digit() || c == b'_');
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit() || c == b'_');
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.pos += 1;
            }
            self.take_while(|c| c.is_ascii_digit());
        }

        let text: String = String::from_utf8_lossy(&self.src[digits_start..self.pos])
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if text.is_empty() || text == "." {
            self.pos = start;
            return Err(self.error("malformed number"));
        }

        if is_float {
            let parsed: f64 = text.parse().map_err(|_| {
                self.error_at(start, format!("malformed float '{text}'"))
            })?;
            return Ok(Value::Float(if negative { -parsed } else { parsed }));
        }

        if text.len() > 1 && text.starts_with('0') {
            let octal = text.trim_start_matches(['0', 'o', 'O']);
            return self.integer(octal, 8, negative, start);
        }
        self.integer(&text, 10, negative, start)
    }

    fn integer(&self, digits: &str, radix: u32, negative: bool, start: usize) -> Result<Value> {
        let digits: String = digits.chars().filter(|c| *c != '_').collect();
        if digits.is_empty() {
            return Ok(Value::Int(0));
        }
        let magnitude = i128::from_str_radix(&digits, radix)
            .map_err(|_| self.error_at(start, format!("malformed integer '{digits}'")))?;
        let signed = if negative { -magnitude } else { magnitude };
        match i64::try_from(signed) {
            Ok(i) => Ok(Value::Int(i)),
            // PHP silently promotes overflowing integers to floats
            Err(_) => Ok(Value::Float(signed as f64)),
        }
    }

    fn single_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error_at(start, "unclosed string")),
                Some(b'\'') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') if matches!(self.peek_at(1), Some(b'\\' | b'\'')) => {
                    out.push(self.src[self.pos + 1]);
                    self.pos += 2;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8(out).map_err(|_| self.error_at(start, "string is not valid UTF-8"))
    }

    fn double_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at(start, "unclosed string"));
            };
            self.pos += 1;
            match c {
                b'"' => break,
                b'$' if self
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphabetic() || n == b'_' || n == b'{') =>
                {
                    self.pos -= 1;
                    return Err(self.error("variable interpolation is not supported"));
                }
                b'\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
        String::from_utf8(out).map_err(|_| self.error_at(start, "string is not valid UTF-8"))
    }

    fn escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let Some(c) = self.peek() else {
            out.push(b'\\');
            return Ok(());
        };
        let simple = match c {
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'v' => Some(0x0b),
            b'e' => Some(0x1b),
            b'f' => Some(0x0c),
            b'\\' | b'$' | b'"' => Some(c),
            _ => None,
        };
        if let Some(byte) = simple {
            self.pos += 1;
            out.push(byte);
            return Ok(());
        }

        match c {
            b'0'..=b'7' => {
                let digits = self.take_up_to(3, |c| (b'0'..=b'7').contains(&c));
                let code = u32::from_str_radix(&digits, 8).unwrap_or(0);
                out.push((code & 0xff) as u8);
            }
            b'x' if self.peek_at(1).is_some_and(|c| c.is_ascii_hexdigit()) => {
                self.pos += 1;
                let digits = self.take_up_to(2, |c| c.is_ascii_hexdigit());
                out.push(u8::from_str_radix(&digits, 16).unwrap_or(0));
            }
            b'u' if self.peek_at(1) == Some(b'{') => {
                self.pos += 2;
                let digits = self.take_while(|c| c.is_ascii_hexdigit());
                self.expect(b'}')?;
                let ch = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode escape"))?;
                let mut buf = [0; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            // Unknown escapes are kept verbatim, backslash included
            _ => out.push(b'\\'),
        }
        Ok(())
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {}
            _ => return Err(self.error("expected an identifier")),
        }
        Ok(self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_'))
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    let body = &self.src[self.pos + 2..];
                    let end = body
                        .windows(2)
                        .position(|w| w == b"*/")
                        .ok_or_else(|| self.error_at(start, "unclosed comment"))?;
                    self.pos += 2 + end + 2;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            // A close tag ends a one-line comment
            if self.src[self.pos..].starts_with(b"?>") {
                break;
            }
            self.pos += 1;
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        if end <= self.src.len() && self.src[self.pos..end].eq_ignore_ascii_case(keyword.as_bytes())
        {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        match self.peek() {
            Some(c) if c == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!(
                "expected '{}', found '{}'",
                byte as char, c as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", byte as char))),
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn take_up_to(&mut self, max: usize, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.pos - start < max && self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> Error {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> Error {
        let consumed = &self.src[..pos.min(self.src.len())];
        let line = consumed.iter().filter(|&&c| c == b'\n').count() + 1;
        let line_start = consumed
            .iter()
            .rposition(|&c| c == b'\n')
            .map_or(0, |i| i + 1);
        let column = String::from_utf8_lossy(&consumed[line_start..]).chars().count() + 1;
        Error::Parse {
            line,
            column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNCLOUD_CONFIG: &str = r"<?php
$CONFIG = array (
  'instanceid' => 'oc8f2a1c9d3e',
  'passwordsalt' => 'Zq1bX9kLmN0pQrStUvWx',
  'trusted_domains' =>
  array (
    0 => 'localhost',
    1 => 'cloud.example.com',
  ),
  'datadirectory' => '/var/www/owncloud/data',
  'dbtype' => 'mysql',
  'version' => '8.0.4.2',
  'dbport' => 3306,
  'installed' => true,
  'maintenance' => false,
  'loglevel' => 2.5,
  'theme' => NULL,
);
";

    #[test]
    fn test_parse_owncloud_config() {
        let doc = parse(OWNCLOUD_CONFIG).unwrap();

        assert_eq!(doc.variable, "CONFIG");
        assert_eq!(doc.len(), 11);
        assert_eq!(doc.get("instanceid"), Some(&Value::from("oc8f2a1c9d3e")));
        assert_eq!(doc.get("dbport"), Some(&Value::Int(3306)));
        assert_eq!(doc.get("installed"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("loglevel"), Some(&Value::Float(2.5)));
        assert_eq!(doc.get("theme"), Some(&Value::Null));

        let domains = doc.get("trusted_domains").and_then(Value::as_array).unwrap();
        assert_eq!(
            domains.get_key(&Key::Int(1)),
            Some(&Value::from("cloud.example.com"))
        );

        let keys: Vec<String> = doc.entries.keys().map(ToString::to_string).collect();
        assert_eq!(keys[0], "instanceid");
        assert_eq!(keys[10], "theme");
    }

    #[test]
    fn test_parse_short_syntax_and_comments() {
        let content = r#"<?php
// generated by hand
# another comment
/* block
   comment */
$AUTOCONFIG = [
  "dbtype" => "mysql",
  'dbhost' => 'localhost', // trailing
  "adminlogin" => "admin\t\"root\"",
  'list' => ['a', 'b',],
];
?>
"#;
        let doc = parse(content).unwrap();

        assert_eq!(doc.variable, "AUTOCONFIG");
        assert_eq!(doc.get("adminlogin"), Some(&Value::from("admin\t\"root\"")));
        let list = doc.get("list").and_then(Value::as_array).unwrap();
        assert_eq!(list.get_key(&Key::Int(0)), Some(&Value::from("a")));
        assert_eq!(list.get_key(&Key::Int(1)), Some(&Value::from("b")));
    }

    #[test]
    fn test_parse_literals() {
        let doc = parse(
            "<?php $C = array('neg' => -42, 'hex' => 0x1F, 'oct' => 0755, 'exp' => 1.5e3, \
             'T' => TRUE, 'f' => False, 'n' => Null, 'esc' => 'it\\'s a \\\\ path \\n');",
        )
        .unwrap();

        assert_eq!(doc.get("neg"), Some(&Value::Int(-42)));
        assert_eq!(doc.get("hex"), Some(&Value::Int(31)));
        assert_eq!(doc.get("oct"), Some(&Value::Int(493)));
        assert_eq!(doc.get("exp"), Some(&Value::Float(1500.0)));
        assert_eq!(doc.get("T"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("f"), Some(&Value::Bool(false)));
        assert_eq!(doc.get("n"), Some(&Value::Null));
        assert_eq!(doc.get("esc"), Some(&Value::from("it's a \\ path \\n")));
    }

    #[test]
    fn test_numeric_string_keys_become_ints() {
        let doc = parse("<?php $C = array('5' => 'a', '05' => 'b');").unwrap();
        assert!(doc.entries.contains_key(&Key::Int(5)));
        assert!(doc.entries.contains_key(&Key::Str("05".into())));
    }

    #[test]
    fn test_parse_rejects_append_after_max_key() {
        let err = parse("<?php $CONFIG = array(9223372036854775807 => 'a', 'b');").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("next element is already occupied"));
    }

    #[test]
    fn test_parse_error_position() {
        let content = "<?php\n$CONFIG = array (\n  'dbtype' => mysql,\n);\n";
        let err = parse(content).unwrap_err();

        match err {
            Error::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_unterminated() {
        assert!(parse("<?php $CONFIG = array ('a' => 'b'").unwrap_err().is_parse());
        assert!(parse("<?php $CONFIG = array ('a' => 'b)").unwrap_err().is_parse());
        assert!(parse("<?php $CONFIG = array ()").unwrap_err().is_parse());
        assert!(parse("<?php $CONFIG = 'x';").unwrap_err().is_parse());
        assert!(parse("<?php $CONFIG = array (); echo 1;").unwrap_err().is_parse());
    }

    #[test]
    fn test_parse_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(&dir.path().join("config.php")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
