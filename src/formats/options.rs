use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXCLUDED, MISSING_TOKEN, TARGET_NAME};

/// Settings shared by every codec call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecOptions {
    /// Name of the target (label) column
    pub target: String,
    /// Textual placeholder for a missing value
    pub missing: String,
    /// Columns dropped from attribute-relation exports and feature derivation
    pub exclude: Vec<String>,
    /// Position of the column declared as primary key in database exports
    pub primary_index: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            target: TARGET_NAME.to_string(),
            missing: MISSING_TOKEN.to_string(),
            exclude: DEFAULT_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            primary_index: 0,
        }
    }
}

impl CodecOptions {
    /// Whether `name` is an excluded column
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|e| e == name)
    }

    /// Set the target column name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the missing-value token
    pub fn with_missing(mut self, missing: impl Into<String>) -> Self {
        self.missing = missing.into();
        self
    }
}
