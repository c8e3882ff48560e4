//! Renderer configuration.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tunables for a [`Renderer`](crate::render::Renderer).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use arbor_core::RendererConfig;
///
/// let config = RendererConfig::from_json(r#"{ "max_depth": 16 }"#).unwrap();
/// assert_eq!(config.max_depth, 16);
/// assert_eq!(config.error_tag, "render-error");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Tag of the element rendered in place of a failed component.
    pub error_tag: String,

    /// Attribute on the error placeholder that carries the failure message.
    pub error_attribute: String,

    /// Whether failure messages are written into the placeholder at all.
    pub expose_errors: bool,

    /// Maximum component nesting within a single pass. Deeper components
    /// render as error placeholders.
    pub max_depth: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            error_tag: "render-error".to_string(),
            error_attribute: "data-error".to_string(),
            expose_errors: true,
            max_depth: 128,
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from JSON, filling omitted fields with defaults.
    pub fn from_json(source: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(source)?)
    }
}
