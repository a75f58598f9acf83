use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::IdGenerator;

/// Descriptive information about the running process or container.
/// Reported by the status service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextInfo {
    /// Name of the service or container.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Unique id of this process instance.
    pub context_id: String,
    /// Arbitrary additional properties.
    pub properties: BTreeMap<String, String>,
}

impl ContextInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

impl Default for ContextInfo {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            description: String::new(),
            context_id: IdGenerator::next_long(),
            properties: BTreeMap::new(),
        }
    }
}
