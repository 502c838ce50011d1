//! Workflow descriptor.
//!
//! The engine runs pre-resolved workflow definitions identified by id;
//! templating and parameter substitution happen upstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Reference to a remote workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Identifier of the workflow on the remote system.
    pub id: String,

    /// Human-readable name, for logs and stats.
    #[serde(default)]
    pub name: Option<String>,

    /// Caller-supplied tags propagated into the execution context.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl WorkflowRef {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Name for display purposes; falls back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Reject obviously invalid references before admission.
    ///
    /// This is a programmer-misuse check: it raises instead of producing a
    /// failed execution result.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("workflow id is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(WorkflowRef::new("").validate().is_err());
        assert!(WorkflowRef::new("   ").validate().is_err());
        assert!(WorkflowRef::new("wf-1").validate().is_ok());
    }

    #[test]
    fn test_display_name_fallback() {
        let bare = WorkflowRef::new("wf-1");
        assert_eq!(bare.display_name(), "wf-1");

        let named = WorkflowRef::new("wf-1").with_name("order-sync");
        assert_eq!(named.display_name(), "order-sync");
    }
}
