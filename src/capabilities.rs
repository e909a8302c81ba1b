//! Model capability lookup and pre-flight validation.
//!
//! Before any request is sent, the entry points ask a [`ModelCapabilities`] source whether
//! the chosen model can honour a response schema and tool calling. The built-in
//! [`CapabilityTable`] maps model-name prefixes to capability profiles; unknown models are
//! treated as supporting neither feature.

use crate::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

/// Source of per-model feature support
pub trait ModelCapabilities: Send + Sync {
    /// Whether the model can be constrained to a JSON schema
    fn supports_response_schema(&self, model: &str) -> bool;

    /// Whether the model can request tool executions
    fn supports_function_calling(&self, model: &str) -> bool;
}

/// Feature profile of one model or model family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub response_schema: bool,
    pub function_calling: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        response_schema: false,
        function_calling: false,
    };

    pub const ALL: Capabilities = Capabilities {
        response_schema: true,
        function_calling: true,
    };

    pub const TOOLS_ONLY: Capabilities = Capabilities {
        response_schema: false,
        function_calling: true,
    };
}

/// Prefix-matched capability table with exact-name overrides.
///
/// Lookup order for `provider/model` style names: exact override on the full name, exact
/// override on the last path segment, longest matching family prefix on the last segment,
/// then the fallback profile.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    families: Vec<(String, Capabilities)>,
    overrides: HashMap<String, Capabilities>,
    fallback: Capabilities,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::empty()
            .with_family("gpt-4o", Capabilities::ALL)
            .with_family("gpt-4.1", Capabilities::ALL)
            .with_family("gpt-4-turbo", Capabilities::TOOLS_ONLY)
            .with_family("gpt-4", Capabilities::TOOLS_ONLY)
            .with_family("gpt-3.5-turbo", Capabilities::TOOLS_ONLY)
            .with_family("o1", Capabilities::ALL)
            .with_family("o3", Capabilities::ALL)
            .with_family("o4-mini", Capabilities::ALL)
            .with_family("gemini-1.5", Capabilities::ALL)
            .with_family("gemini-2", Capabilities::ALL)
            .with_family("claude-3", Capabilities::ALL)
            .with_family("claude-sonnet-4", Capabilities::ALL)
            .with_family("claude-opus-4", Capabilities::ALL)
            .with_family("mistral-large", Capabilities::TOOLS_ONLY)
    }
}

impl CapabilityTable {
    /// Table with no entries; every model resolves to [`Capabilities::NONE`]
    pub fn empty() -> Self {
        Self {
            families: Vec::new(),
            overrides: HashMap::new(),
            fallback: Capabilities::NONE,
        }
    }

    /// Table that reports every feature for every model.
    ///
    /// Useful for local OpenAI-compatible servers whose model names carry no meaning.
    pub fn permissive() -> Self {
        Self {
            fallback: Capabilities::ALL,
            ..Self::empty()
        }
    }

    /// Register a model family by name prefix
    pub fn with_family(mut self, prefix: impl Into<String>, capabilities: Capabilities) -> Self {
        self.families.push((prefix.into(), capabilities));
        self
    }

    /// Register an exact model name
    pub fn with_model(mut self, model: impl Into<String>, capabilities: Capabilities) -> Self {
        self.overrides.insert(model.into(), capabilities);
        self
    }

    /// Profile used for models matching no entry
    pub fn with_fallback(mut self, capabilities: Capabilities) -> Self {
        self.fallback = capabilities;
        self
    }

    pub fn lookup(&self, model: &str) -> Capabilities {
        if let Some(caps) = self.overrides.get(model) {
            return *caps;
        }

        let base = model.rsplit('/').next().unwrap_or(model);
        if let Some(caps) = self.overrides.get(base) {
            return *caps;
        }

        self.families
            .iter()
            .filter(|(prefix, _)| !prefix.is_empty() && base.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, caps)| *caps)
            .unwrap_or(self.fallback)
    }
}

impl ModelCapabilities for CapabilityTable {
    fn supports_response_schema(&self, model: &str) -> bool {
        self.lookup(model).response_schema
    }

    fn supports_function_calling(&self, model: &str) -> bool {
        self.lookup(model).function_calling
    }
}

/// Reject a call whose requested features the model cannot honour.
///
/// The schema check runs first, so a model lacking both features reports the schema
/// failure.
pub fn validate_model_capabilities(
    capabilities: &dyn ModelCapabilities,
    model: &str,
    wants_schema: bool,
    has_tools: bool,
) -> Result<()> {
    if wants_schema && !capabilities.supports_response_schema(model) {
        return Err(Error::capability(format!(
            "Model {} lacks JSON support but a response schema was requested",
            model
        )));
    }

    if has_tools && !capabilities.supports_function_calling(model) {
        return Err(Error::capability(format!(
            "Model {} lacks tool calling but tools provided",
            model
        )));
    }

    debug!(model, wants_schema, has_tools, "model capabilities validated");
    Ok(())
}
