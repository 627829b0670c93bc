//! Coordinator settings
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Forwarded to the view with every batch.
    pub animated: bool,
    /// Debug-assert when sibling keys collide. Collisions are always logged.
    pub assert_unique_keys: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            animated: true,
            assert_unique_keys: cfg!(debug_assertions),
        }
    }
}

impl ReconcilerConfig {
    pub fn from_json(source: &str) -> Result<Self, ReconcilerError> {
        Ok(serde_json::from_str(source)?)
    }
}
