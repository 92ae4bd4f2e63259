use serde::de::{Deserialize, Deserializer, Error as _};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{DsffError, Result};

/// Ordered mapping from column name to a free-text description
///
/// Insertion order is kept because it is the row order of the features
/// worksheet and of the feature comments emitted by text codecs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    entries: Vec<(String, String)>,
}

impl Features {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a description, keeping the original position on replace
    pub fn insert(&mut self, name: impl Into<String>, description: impl Into<String>) -> Option<String> {
        let name = name.into();
        let description = description.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, d)) => Some(std::mem::replace(d, description)),
            None => {
                self.entries.push((name, description));
                None
            }
        }
    }

    /// Description of a feature
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_str())
    }

    /// Whether a feature is described
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of described features
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no feature is described
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, description)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    /// Build from a JSON object whose values are all strings
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| DsffError::BadInputData("features must be a mapping".to_string()))?;
        let mut features = Self::new();
        for (name, description) in map {
            let description = description.as_str().ok_or_else(|| {
                DsffError::BadInputData(format!(
                    "description of feature '{}' is not a string",
                    name
                ))
            })?;
            features.insert(name.clone(), description);
        }
        Ok(features)
    }

    /// Render as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(n, d)| (n.clone(), Value::String(d.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Features {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut features = Self::new();
        for (name, description) in iter {
            features.insert(name, description);
        }
        features
    }
}

impl Serialize for Features {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, description) in &self.entries {
            map.serialize_entry(name, description)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Features {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Features::from_json(&value).map_err(D::Error::custom)
    }
}
