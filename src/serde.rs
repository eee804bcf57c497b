//! Serde utilities
use serde_yml::{Mapping, Value};
use thiserror::Error;

/// An error layering one YAML document over another.
#[derive(Debug, Error)]
pub enum Error {
    /// The same key holds different kinds of values.
    #[error("Cannot merge {path}: {base} is not compatible with {overlay}")]
    InvalidTypes {
        /// Dotted path of the key
        path: String,
        /// Kind of value in the base document
        base: &'static str,
        /// Kind of value in the overlay document
        overlay: &'static str,
    },
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

fn merge_at(path: &str, base: Value, overlay: Value) -> Result<Value, Error> {
    match (base, overlay) {
        (base, Value::Null) => Ok(base),
        (Value::Null, overlay) => Ok(overlay),
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            let mut result = Mapping::new();
            for (key, overlay_value) in overlay {
                let child = if path.is_empty() {
                    key_to_string(&key)
                } else {
                    format!("{path}.{}", key_to_string(&key))
                };
                let base_value = base.remove(key.clone()).unwrap_or(Value::Null);
                result.insert(key, merge_at(&child, base_value, overlay_value)?);
            }
            for (key, base_value) in base {
                result.insert(key, base_value);
            }
            Ok(Value::Mapping(result))
        }
        (base, overlay) if kind(&base) == kind(&overlay) => Ok(overlay),
        (base, overlay) => Err(Error::InvalidTypes {
            path: path.to_string(),
            base: kind(&base),
            overlay: kind(&overlay),
        }),
    }
}

/// Layer `overlay` over `base`.
///
/// Mappings are merged key by key, any other value in `overlay` replaces the
/// value in `base`. A null in `overlay` leaves the value in `base` alone.
///
/// # Errors
///
/// Will return an error if a key holds different kinds of values in the two
/// documents.
pub fn merge_yaml(base: Value, overlay: Value) -> Result<Value, Error> {
    merge_at("", base, overlay)
}

/// Serde serialization deserialization for a non zero duration in whole seconds.
pub mod with_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Deserialize a duration given as a number of seconds.
    ///
    /// # Errors
    ///
    /// If the value is not a positive integer.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds: u64 = Deserialize::deserialize(deserializer)?;
        if seconds == 0 {
            return Err(serde::de::Error::custom("duration must be at least 1 second"));
        }
        Ok(Duration::from_secs(seconds))
    }

    /// Serialize a duration as a number of seconds.
    ///
    /// # Errors
    ///
    /// If the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }
}
