//! value representation
//!
//! Plans reach the validator as an untyped tree. The document format does not matter, every supported
//! format (yaml, json, hcl) is converted into a [Value] first.
//!
//! The model contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", keyed by [Key])
//!
//! Additionally:
//! - keys are accessed indifferently: `name` and `:name` are the same key
//! - an explicit `null` is treated like an absent field by [Value::field]
//!
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::fmt::Formatter;

pub type Map = indexmap::IndexMap<Key, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

/// Object key
///
/// String keys written in symbol notation (`:name`) are normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(normalize_key(value).to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::String(normalize_key(&value).to_string())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::String(s) => f.write_str(s),
            Key::Integer(i) => write!(f, "{i}"),
            Key::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Strip the symbol marker of `:name` style keys
fn normalize_key(key: &str) -> &str {
    match key.strip_prefix(':') {
        Some(rest) if !rest.is_empty() && !rest.starts_with(':') => rest,
        _ => key,
    }
}

impl Value {
    /// Parse a yaml document
    pub fn from_yaml_str(document: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<serde_yaml::Value>(document).map(Into::into)
    }

    /// Look up a field of an object
    ///
    /// Returns `None` for missing fields, `null` values and non-object values.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(&Key::from(key)).filter(|value| !value.is_null()),
            _ => None,
        }
    }

    /// Whether the key exists at all, even with a `null` value
    pub fn has_key(&self, key: &str) -> bool {
        match self {
            Value::Object(map) => map.contains_key(&Key::from(key)),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Human readable type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "hash",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Object(Map::new())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Object(value)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => b.into(),
            Yaml::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                // u64 above i64::MAX and floats end up here
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            Yaml::String(s) => s.into(),
            Yaml::Sequence(seq) => seq.into(),
            Yaml::Mapping(mapping) => Value::Object(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), v.into()))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => tagged.value.into(),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Key {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s.into(),
        Yaml::Bool(b) => Key::Boolean(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(int) => Key::Integer(int),
            None => Key::String(n.to_string()),
        },
        other => Key::String(
            serde_yaml::to_string(&other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        ),
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => b.into(),
            Json::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => s.into(),
            Json::Array(array) => array.into(),
            Json::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(k, v)| (Key::from(k), v.into()))
                    .collect(),
            ),
        }
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(k, v)| (Key::from(k), v.into()))
                    .collect(),
            ),
        }
    }
}

impl serde::ser::Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

/// Utility macro to create a [Value] from a yaml document
///
/// ```
/// # use dopc::value;
/// let plan = value!("name: myplan");
/// assert_eq!(plan.field("name").and_then(|v| v.as_str()), Some("myplan"));
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use dopc::value;
/// value!("not: [valid");
/// ```
#[macro_export]
macro_rules! value {
    { $expr:expr } => {
        $crate::value::Value::from_yaml_str($expr).expect("yaml must parse")
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indifferent_key_access() {
        let value = value!("':name': symbol\nother: string");
        assert_eq!(value.field("name"), Some(&Value::from("symbol")));
        assert_eq!(value.field(":other"), Some(&Value::from("string")));
    }

    #[test]
    fn null_is_absent() {
        let value = value!("image: ~");
        assert!(value.has_key("image"));
        assert_eq!(value.field("image"), None);
    }

    #[test]
    fn non_string_keys_survive() {
        let value = value!("2: {}\ntrue: x");
        let map = value.as_object().unwrap();
        assert!(map.contains_key(&Key::Integer(2)));
        assert!(map.contains_key(&Key::Boolean(true)));
    }

    #[test]
    fn json_and_yaml_agree() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, "b", true, null], "c": {"d": 1.5}}"#).unwrap();
        let yaml = value!("a: [1, b, true, ~]\nc:\n  d: 1.5");
        assert_eq!(Value::from(json), yaml);
    }

    #[test]
    fn serializes_keys_as_strings() {
        let value = value!("1: one\nname: two");
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"1":"one","name":"two"}"#
        );
    }
}
