//! Value model for PHP array-literal config documents.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Key of an array entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Borrow the key as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// PHP treats `"42"` as the integer key 42, but not `"042"` or `"+42"`
fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty()
        || !digits.bytes().all(|c| c.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
        || s == "-0"
    {
        return None;
    }
    s.parse().ok()
}

// String keys go through PHP's integer-key cast
impl From<&str> for Key {
    fn from(s: &str) -> Self {
        canonical_int(s).map_or_else(|| Self::Str(s.to_string()), Self::Int)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        match canonical_int(&s) {
            Some(i) => Self::Int(i),
            None => Self::Str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Array),
}

impl Value {
    /// Whether the value counts as unset: `null`, `''` or an empty array
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::Array(a) => a.is_empty(),
            _ => false,
        }
    }

    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as a bool, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the value as an array, if it is one
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Name of the value's type, for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(a) => a.serialize(serializer),
        }
    }
}

/// An ordered PHP array: keys keep their insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    entries: Vec<(Key, Value)>,
}

impl Array {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the array has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key given as a string
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_key(&Key::from(key))
    }

    /// Look up any key
    pub fn get_key(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &Key) -> bool {
        self.get_key(key).is_some()
    }

    /// Set a key, replacing in place or appending at the end
    ///
    /// Returns the previous value if the key existed.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(existing, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Append a value under the next free integer key, like `$a[] = v`
    ///
    /// Returns the key used, or `None` when the largest integer key is
    /// already `i64::MAX` and nothing was appended.
    pub fn push(&mut self, value: impl Into<Value>) -> Option<i64> {
        let next = match self
            .entries
            .iter()
            .filter_map(|(k, _)| match k {
                Key::Int(i) => Some(*i),
                Key::Str(_) => None,
            })
            .max()
        {
            Some(max) => max.checked_add(1)?.max(0),
            None => 0,
        };
        self.entries.push((Key::Int(next), value.into()));
        Some(next)
    }

    /// Remove a key, preserving the order of the rest
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Array {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut array = Self::new();
        for (k, v) in iter {
            array.insert(k, v);
        }
        array
    }
}

impl Serialize for Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(&k.to_string(), v)?;
        }
        map.end()
    }
}

/// Variable name ownCloud stores its configuration in
pub const DEFAULT_VARIABLE: &str = "CONFIG";

/// A parsed config document: `$<variable> = array (...);`
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    /// PHP variable name, without the `$`
    pub variable: String,
    /// Top-level entries
    pub entries: Array,
}

impl ConfigDocument {
    /// Create an empty document for `$variable`
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            entries: Array::new(),
        }
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Set a top-level key
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the document has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the entries as pretty JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::new(DEFAULT_VARIABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut array = Array::new();
        array.insert("a", 1_i64);
        array.insert("b", 2_i64);
        assert_eq!(array.insert("a", 9_i64), Some(Value::Int(1)));

        let keys: Vec<String> = array.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(array.get("a"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_push_uses_next_int_key() {
        let mut array = Array::new();
        array.push("localhost");
        array.insert(5_i64, "cloud.example.com");
        array.push("10.0.0.1");

        assert_eq!(
            array.get_key(&Key::Int(6)),
            Some(&Value::from("10.0.0.1"))
        );
    }

    #[test]
    fn test_push_stops_at_max_key() {
        let mut array = Array::new();
        array.insert(i64::MAX, "last");

        assert_eq!(array.push("overflow"), None);
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_string_keys_cast_like_php() {
        assert_eq!(Key::from("0"), Key::Int(0));
        assert_eq!(Key::from("-7".to_string()), Key::Int(-7));
        assert_eq!(Key::from("07"), Key::Str("07".into()));
        assert_eq!(Key::from("-0"), Key::Str("-0".into()));
        assert_eq!(Key::from("9223372036854775808"), Key::Str("9223372036854775808".into()));
        assert_eq!(Key::from("dbname"), Key::Str("dbname".into()));
    }

    #[test]
    fn test_is_empty_value() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::Array(Array::new()).is_empty());
        assert!(!Value::from("x").is_empty());
        assert!(!Value::Bool(false).is_empty());
        assert!(!Value::Int(0).is_empty());
    }

    #[test]
    fn test_json_rendering() {
        let mut doc = ConfigDocument::default();
        doc.set("installed", true);
        doc.set("dbtype", "mysql");
        doc.set("maintenance", Value::Null);

        let json = doc.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["installed"], serde_json::Value::Bool(true));
        assert_eq!(value["dbtype"], "mysql");
        assert!(value["maintenance"].is_null());
    }
}
