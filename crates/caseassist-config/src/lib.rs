#![deny(unsafe_code)]

//! Configuration loading and validation for CaseAssist.
//!
//! Loads the TOML file describing the search-interface host (engine id,
//! search hub, locale, context defaults, where the remote engine
//! configuration lives) and validates it. The [`templates`] module holds the
//! result-template rule engine.

/// Result-template rules with first-match selection.
pub mod templates;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use templates::{FieldMatch, TemplateRule, TemplateSelector};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search-interface component properties.
    #[serde(default)]
    pub interface: InterfaceConfig,

    /// Context layer defaults.
    #[serde(default)]
    pub context: ContextConfig,

    /// Where the remote engine configuration is fetched from.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Result-template rules. Empty means the built-in set.
    #[serde(default)]
    pub templates: Vec<TemplateRuleConfig>,
}

/// Properties of the search-interface controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Engine session the interface registers to.
    #[serde(default = "default_engine_id")]
    pub engine_id: String,

    /// Search hub sent with every query.
    #[serde(default = "default_search_hub")]
    pub search_hub: String,

    /// Query pipeline; unset lets the platform route.
    #[serde(default)]
    pub pipeline: Option<String>,

    /// Locale override for the engine.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Timezone override for the engine.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Do not mirror engine state into the URL fragment.
    #[serde(default)]
    pub disable_state_in_url: bool,

    /// Skip the first search once the engine is constructed.
    #[serde(default)]
    pub skip_first_search: bool,

    /// Query issued by the first search.
    #[serde(default = "default_query")]
    pub default_query: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            engine_id: default_engine_id(),
            search_hub: default_search_hub(),
            pipeline: None,
            locale: default_locale(),
            timezone: default_timezone(),
            disable_state_in_url: false,
            skip_first_search: false,
            default_query: default_query(),
        }
    }
}

fn default_engine_id() -> String {
    "case-assist-engine".to_string()
}

fn default_search_hub() -> String {
    "CaseAssist_GenAI".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_query() -> String {
    "how to enhance working".to_string()
}

/// Context layer defaults.
///
/// ## TOML Example
///
/// ```toml
/// [context]
/// website = "support"
/// guest = false
///
/// [context.authenticated]
/// interests = "sailing"
/// products_owned = "barca skipper pro"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Static site identifier added to every context payload.
    #[serde(default = "default_website")]
    pub website: String,

    /// Whether the current user is anonymous. Guests get an empty
    /// authenticated layer.
    #[serde(default)]
    pub guest: bool,

    /// Identity-derived values for signed-in users.
    #[serde(default = "default_authenticated")]
    pub authenticated: BTreeMap<String, String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            website: default_website(),
            guest: false,
            authenticated: default_authenticated(),
        }
    }
}

fn default_website() -> String {
    "support".to_string()
}

fn default_authenticated() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("interests".to_string(), "sailing".to_string()),
        ("products_owned".to_string(), "barca skipper pro".to_string()),
    ])
}

/// Location of the remote engine configuration payload.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// HTTP endpoint returning the JSON configuration.
    #[serde(default)]
    pub configuration_url: Option<String>,

    /// Local JSON file used instead of the endpoint.
    #[serde(default)]
    pub configuration_file: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A single template rule as expressed in TOML.
///
/// A rule without `field` is the catch-all and must come last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRuleConfig {
    /// Template name.
    pub name: String,
    /// Raw field the predicate reads.
    #[serde(default)]
    pub field: Option<String>,
    /// Accepted values for `field`.
    #[serde(default)]
    pub values: Vec<String>,
    /// Fields the template renders.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl TemplateRuleConfig {
    fn to_rule(&self) -> TemplateRule {
        let conditions = match &self.field {
            Some(field) => vec![FieldMatch {
                field: field.clone(),
                values: self.values.clone(),
            }],
            None => Vec::new(),
        };
        TemplateRule {
            name: self.name.clone(),
            conditions,
            fields: self.fields.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading configuration");
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.engine_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "interface.engine_id must not be empty".to_string(),
            ));
        }
        if self.interface.search_hub.trim().is_empty() {
            return Err(ConfigError::Validation(
                "interface.search_hub must not be empty".to_string(),
            ));
        }
        if self.interface.locale.is_empty() {
            return Err(ConfigError::Validation(
                "interface.locale must not be empty".to_string(),
            ));
        }
        if self.context.website.is_empty() {
            return Err(ConfigError::Validation(
                "context.website must not be empty".to_string(),
            ));
        }
        if let Some(url) = &self.remote.configuration_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "remote.configuration_url must be an http(s) URL, got {url:?}"
                )));
            }
        }

        for (i, rule) in self.templates.iter().enumerate() {
            if rule.name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "templates[{i}].name must not be empty"
                )));
            }
            if rule.field.is_some() && rule.values.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "templates[{i}].values must not be empty when field is set"
                )));
            }
        }
        if !self.templates.is_empty() {
            TemplateSelector::new(self.templates.iter().map(|r| r.to_rule()).collect())
                .map_err(|e| ConfigError::Validation(format!("templates: {e}")))?;
        }

        debug!(
            engine_id = %self.interface.engine_id,
            templates = self.templates.len(),
            "Configuration validated"
        );
        Ok(())
    }

    /// Build the [`TemplateSelector`] from the configured rules, or the
    /// built-in set when none are configured.
    pub fn build_template_selector(&self) -> Result<TemplateSelector, ConfigError> {
        if self.templates.is_empty() {
            return Ok(TemplateSelector::default());
        }
        TemplateSelector::new(self.templates.iter().map(|r| r.to_rule()).collect())
            .map_err(|e| ConfigError::Validation(format!("templates: {e}")))
    }
}
