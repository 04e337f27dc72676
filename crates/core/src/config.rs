//! Secrets file model.
//!
//! The secrets file is TOML with a `[salesforce]` table, an `[azure]` table,
//! and an optional `[agent]` table for conversation settings.

use serde::{Deserialize, Serialize};

use crate::conversation::DEFAULT_MAX_ROUND;
use crate::execution::DEFAULT_TIMEOUT_SECS;
use crate::extract::DEFAULT_LANGUAGE;
use crate::salesforce::SalesforceCredentials;

/// Azure deployment used when the secrets file does not name one.
pub const DEFAULT_AZURE_MODEL: &str = "productgpt-4";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid secrets file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    #[serde(default = "default_azure_model")]
    pub model: String,
}

fn default_azure_model() -> String {
    DEFAULT_AZURE_MODEL.to_string()
}

/// Conversation and execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_round: usize,
    pub timeout_secs: u64,
    pub language: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_round: DEFAULT_MAX_ROUND,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Parsed secrets file. Every table is optional on disk so that values can be
/// supplied through the environment instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub salesforce: Option<SalesforceCredentials>,
    #[serde(default)]
    pub azure: Option<AzureConfig>,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Secrets {
    pub fn salesforce(&self) -> Result<&SalesforceCredentials, ConfigError> {
        self.salesforce
            .as_ref()
            .ok_or(ConfigError::Missing("[salesforce]"))
    }

    pub fn azure(&self) -> Result<&AzureConfig, ConfigError> {
        self.azure.as_ref().ok_or(ConfigError::Missing("[azure]"))
    }
}

/// Parse the contents of a secrets file.
pub fn parse_secrets(contents: &str) -> Result<Secrets, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Overrides for individual values, usually read from the environment.
#[derive(Debug, Clone, Default)]
pub struct SecretOverrides {
    pub salesforce_username: Option<String>,
    pub salesforce_password: Option<String>,
    pub salesforce_security_token: Option<String>,
    pub salesforce_domain: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_base_url: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_model: Option<String>,
}

impl Secrets {
    /// Apply overrides on top of the file values.
    ///
    /// A table missing from the file is created only when every required
    /// field is provided by the overrides.
    pub fn with_overrides(mut self, overrides: SecretOverrides) -> Self {
        self.salesforce = merge_salesforce(self.salesforce.take(), &overrides);
        self.azure = merge_azure(self.azure.take(), &overrides);
        self
    }
}

fn merge_salesforce(
    current: Option<SalesforceCredentials>,
    o: &SecretOverrides,
) -> Option<SalesforceCredentials> {
    match current {
        Some(mut creds) => {
            if let Some(v) = &o.salesforce_username {
                creds.username = v.clone();
            }
            if let Some(v) = &o.salesforce_password {
                creds.password = v.clone();
            }
            if let Some(v) = &o.salesforce_security_token {
                creds.security_token = v.clone();
            }
            if let Some(v) = &o.salesforce_domain {
                creds.domain = v.clone();
            }
            Some(creds)
        }
        None => Some(SalesforceCredentials {
            username: o.salesforce_username.clone()?,
            password: o.salesforce_password.clone()?,
            security_token: o.salesforce_security_token.clone()?,
            domain: o
                .salesforce_domain
                .clone()
                .unwrap_or_else(|| "login".to_string()),
        }),
    }
}

fn merge_azure(current: Option<AzureConfig>, o: &SecretOverrides) -> Option<AzureConfig> {
    match current {
        Some(mut azure) => {
            if let Some(v) = &o.azure_api_key {
                azure.api_key = v.clone();
            }
            if let Some(v) = &o.azure_base_url {
                azure.base_url = v.clone();
            }
            if let Some(v) = &o.azure_api_version {
                azure.api_version = v.clone();
            }
            if let Some(v) = &o.azure_model {
                azure.model = v.clone();
            }
            Some(azure)
        }
        None => Some(AzureConfig {
            api_key: o.azure_api_key.clone()?,
            base_url: o.azure_base_url.clone()?,
            api_version: o.azure_api_version.clone()?,
            model: o.azure_model.clone().unwrap_or_else(default_azure_model),
        }),
    }
}
