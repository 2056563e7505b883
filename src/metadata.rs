//! Typed GGUF key/value metadata and the lookup interface the resolvers read.

use crate::error::{GgufArchError, Result};
use crate::numeric::{self, Numeric};
use std::collections::{HashMap, HashSet};

/// GGUF metadata value types, with their on-disk type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MetadataValueType {
    Uint8 = 0,
    Int8 = 1,
    Uint16 = 2,
    Int16 = 3,
    Uint32 = 4,
    Int32 = 5,
    Float32 = 6,
    Bool = 7,
    String = 8,
    Array = 9,
    Uint64 = 10,
    Int64 = 11,
    Float64 = 12,
}

/// An array value.
///
/// `len` is the element count declared in the file. `items` may be shorter
/// (or empty) when the reader skipped a large payload such as the token list.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataArray {
    pub item_type: MetadataValueType,
    pub len: u64,
    pub items: Vec<MetadataValue>,
}

impl MetadataArray {
    /// Array holding all of its items.
    pub fn new(item_type: MetadataValueType, items: Vec<MetadataValue>) -> Self {
        MetadataArray {
            item_type,
            len: items.len() as u64,
            items,
        }
    }

    /// Array whose payload was not loaded; only the declared length is known.
    pub fn skipped(item_type: MetadataValueType, len: u64) -> Self {
        MetadataArray {
            item_type,
            len,
            items: Vec::new(),
        }
    }
}

/// A tagged metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    String(String),
    Array(MetadataArray),
    Uint64(u64),
    Int64(i64),
    Float64(f64),
}

impl MetadataValue {
    pub fn value_type(&self) -> MetadataValueType {
        match self {
            Self::Uint8(_) => MetadataValueType::Uint8,
            Self::Int8(_) => MetadataValueType::Int8,
            Self::Uint16(_) => MetadataValueType::Uint16,
            Self::Int16(_) => MetadataValueType::Int16,
            Self::Uint32(_) => MetadataValueType::Uint32,
            Self::Int32(_) => MetadataValueType::Int32,
            Self::Float32(_) => MetadataValueType::Float32,
            Self::Bool(_) => MetadataValueType::Bool,
            Self::String(_) => MetadataValueType::String,
            Self::Array(_) => MetadataValueType::Array,
            Self::Uint64(_) => MetadataValueType::Uint64,
            Self::Int64(_) => MetadataValueType::Int64,
            Self::Float64(_) => MetadataValueType::Float64,
        }
    }

    /// String payload, or `""` for any other type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String(s) => s,
            _ => "",
        }
    }

    /// Boolean payload, or `false` for any other type.
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Numeric payload coerced into `T`, see [`crate::numeric`].
    #[inline]
    pub fn numeric<T: Numeric>(&self) -> T {
        numeric::coerce(self)
    }

    /// Declared array length, or 0 for non-array values.
    pub fn array_len(&self) -> u64 {
        match self {
            Self::Array(a) => a.len,
            _ => 0,
        }
    }
}

/// Read access to a metadata table.
pub trait MetadataLookup {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<&MetadataValue>;

    /// Values for every present key in `keys`, keyed by the caller's strings.
    ///
    /// Implementations backed by a sequential store should override this
    /// with a single pass; the default calls [`get`](Self::get) per key.
    fn get_many<'a, 'k>(&'a self, keys: &[&'k str]) -> HashMap<&'k str, &'a MetadataValue> {
        keys.iter()
            .filter_map(|&k| self.get(k).map(|v| (k, v)))
            .collect()
    }
}

impl MetadataLookup for HashMap<String, MetadataValue> {
    fn get(&self, key: &str) -> Option<&MetadataValue> {
        HashMap::get(self, key)
    }
}

/// A single key/value pair, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: MetadataValue,
}

/// Ordered in-memory metadata table, as laid out in a GGUF header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataKV {
    entries: Vec<MetadataEntry>,
}

impl MetadataKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value under `key`. New keys keep insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(MetadataEntry { key, value }),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    /// Load a table from a JSON object of `key: value` pairs.
    ///
    /// Integers become `Int64` (`Uint64` above `i64::MAX`), other numbers
    /// `Float64`. Arrays must be homogeneous; an empty array is typed as a
    /// string array. `null` and nested objects are rejected.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(s)?;
        let serde_json::Value::Object(map) = root else {
            return Err(GgufArchError::InvalidMetadata(
                "metadata document must be a JSON object".into(),
            ));
        };

        let mut kv = MetadataKV::new();
        for (key, value) in map {
            let value = json_to_value(&key, value)?;
            kv.insert(key, value);
        }
        log::trace!("loaded {} metadata entries from JSON", kv.len());
        Ok(kv)
    }
}

impl MetadataLookup for MetadataKV {
    fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    fn get_many<'a, 'k>(&'a self, keys: &[&'k str]) -> HashMap<&'k str, &'a MetadataValue> {
        let wanted: HashSet<&'k str> = keys.iter().copied().collect();
        let mut found = HashMap::with_capacity(wanted.len());
        for entry in &self.entries {
            if let Some(&k) = wanted.get(entry.key.as_str()) {
                found.insert(k, &entry.value);
                if found.len() == wanted.len() {
                    break;
                }
            }
        }
        found
    }
}

impl<K: Into<String>> FromIterator<(K, MetadataValue)> for MetadataKV {
    fn from_iter<I: IntoIterator<Item = (K, MetadataValue)>>(iter: I) -> Self {
        let mut kv = MetadataKV::new();
        for (k, v) in iter {
            kv.insert(k, v);
        }
        kv
    }
}

fn json_to_value(key: &str, value: serde_json::Value) -> Result<MetadataValue> {
    use serde_json::Value;

    match value {
        Value::Bool(b) => Ok(MetadataValue::Bool(b)),
        Value::String(s) => Ok(MetadataValue::String(s)),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(MetadataValue::Int64(v))
            } else if let Some(v) = n.as_u64() {
                Ok(MetadataValue::Uint64(v))
            } else {
                n.as_f64().map(MetadataValue::Float64).ok_or_else(|| {
                    GgufArchError::InvalidMetadata(format!("{key}: unrepresentable number {n}"))
                })
            }
        }
        Value::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| json_to_value(key, item))
                .collect::<Result<Vec<_>>>()?;
            let item_type = items
                .first()
                .map_or(MetadataValueType::String, MetadataValue::value_type);
            if items.iter().any(|item| item.value_type() != item_type) {
                return Err(GgufArchError::InvalidMetadata(format!(
                    "{key}: array elements must share one type"
                )));
            }
            Ok(MetadataValue::Array(MetadataArray::new(item_type, items)))
        }
        Value::Null => Err(GgufArchError::InvalidMetadata(format!(
            "{key}: null is not a metadata value"
        ))),
        Value::Object(_) => Err(GgufArchError::InvalidMetadata(format!(
            "{key}: nested objects are not metadata values"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MetadataKV {
        MetadataKV::new()
            .with("general.architecture", MetadataValue::String("llama".into()))
            .with("llama.block_count", MetadataValue::Uint32(32))
            .with("llama.rope.freq_base", MetadataValue::Float32(10000.0))
    }

    #[test]
    fn test_get() {
        let kv = table();
        assert_eq!(kv.get("general.architecture").map(|v| v.as_str()), Some("llama"));
        assert_eq!(kv.get("llama.block_count").map(|v| v.numeric::<u64>()), Some(32));
        assert!(kv.get("llama.vocab_size").is_none());
    }

    #[test]
    fn test_get_many_returns_only_present_keys() {
        let kv = table();
        let found = kv.get_many(&["llama.block_count", "llama.vocab_size", "llama.rope.freq_base"]);
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("llama.block_count"));
        assert!(!found.contains_key("llama.vocab_size"));
    }

    #[test]
    fn test_default_get_many_matches_single_pass() {
        let kv = table();
        let map: HashMap<String, MetadataValue> = kv
            .iter()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect();
        let keys = ["llama.block_count", "missing", "general.architecture"];
        assert_eq!(map.get_many(&keys), kv.get_many(&keys));
    }

    #[test]
    fn test_insert_replaces() {
        let mut kv = table();
        kv.insert("llama.block_count", MetadataValue::Uint32(40));
        assert_eq!(kv.len(), 3);
        assert_eq!(kv.get("llama.block_count"), Some(&MetadataValue::Uint32(40)));
    }

    #[test]
    fn test_accessors_on_wrong_type() {
        let v = MetadataValue::Uint32(1);
        assert_eq!(v.as_str(), "");
        assert!(!v.as_bool());
        assert_eq!(v.array_len(), 0);
    }

    #[test]
    fn test_skipped_array_keeps_declared_len() {
        let v = MetadataValue::Array(MetadataArray::skipped(MetadataValueType::String, 151_936));
        assert_eq!(v.array_len(), 151_936);
    }

    #[test]
    fn test_from_json_str() {
        let kv = MetadataKV::from_json_str(
            r#"{
                "general.architecture": "qwen2",
                "qwen2.block_count": 28,
                "qwen2.rope.freq_base": 1000000.0,
                "qwen2.attention.layer_norm_rms_epsilon": 1e-6,
                "tokenizer.ggml.add_bos_token": false,
                "tokenizer.ggml.tokens": ["a", "b", "c"],
                "big": 18446744073709551615
            }"#,
        )
        .unwrap();
        assert_eq!(kv.get("qwen2.block_count"), Some(&MetadataValue::Int64(28)));
        assert_eq!(kv.get("big"), Some(&MetadataValue::Uint64(u64::MAX)));
        assert_eq!(kv.get("tokenizer.ggml.tokens").map(|v| v.array_len()), Some(3));
        assert_eq!(
            kv.get("qwen2.rope.freq_base").map(|v| v.numeric::<f32>()),
            Some(1_000_000.0)
        );
    }

    #[test]
    fn test_from_json_str_rejects_bad_documents() {
        assert!(matches!(
            MetadataKV::from_json_str("[1, 2]"),
            Err(GgufArchError::InvalidMetadata(_))
        ));
        assert!(matches!(
            MetadataKV::from_json_str(r#"{"a": null}"#),
            Err(GgufArchError::InvalidMetadata(_))
        ));
        assert!(matches!(
            MetadataKV::from_json_str(r#"{"a": [1, "x"]}"#),
            Err(GgufArchError::InvalidMetadata(_))
        ));
        assert!(matches!(
            MetadataKV::from_json_str("{"),
            Err(GgufArchError::Json(_))
        ));
    }
}
