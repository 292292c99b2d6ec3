//! Agent descriptors as published by the catalog.

use serde::{Deserialize, Serialize};

/// An invocable agent, as listed by the catalog.
///
/// Descriptors are fetched once per session and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable agent identifier used for invocation.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the agent is good at.
    #[serde(default)]
    pub description: String,
    /// Free-form capability tags.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Model backing this agent.
    #[serde(default, alias = "modelId")]
    pub model_id: String,
}

impl AgentDescriptor {
    /// Create a descriptor with an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
            model_id: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the capability tags.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the backing model.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// One-line summary used when listing agents in prompts and logs.
    pub fn summary(&self) -> String {
        if self.capabilities.is_empty() {
            format!("{} ({}): {}", self.name, self.id, self.description)
        } else {
            format!(
                "{} ({}): {} [capabilities: {}]",
                self.name,
                self.id,
                self.description,
                self.capabilities.join(", ")
            )
        }
    }
}
