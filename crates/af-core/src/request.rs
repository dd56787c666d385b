use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::category::AssetCategory;

/// Immutable input describing one asset to generate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AssetCategory,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl GenerationRequest {
    /// Create a request with a fresh id
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: AssetCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            category,
            subtype: None,
            style: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a request with a caller-supplied id
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        category: AssetCategory,
    ) -> Self {
        Self {
            id: id.into(),
            ..Self::new(name, description, category)
        }
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Reject malformed requests before any remote call is made.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("request id must not be empty".into());
        }
        if self.name.trim().is_empty() {
            return Err(format!("request `{}` has an empty name", self.id));
        }
        if self.description.trim().is_empty() {
            return Err(format!("request `{}` has an empty description", self.id));
        }
        Ok(())
    }
}
