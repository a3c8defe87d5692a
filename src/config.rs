//! Provider-level configuration.
//!
//! Each setting comes from the provider block first and falls back to an
//! environment variable when the block leaves it unset.

use serde::Deserialize;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Default Anypoint platform URL.
pub const DEFAULT_BASE_URL: &str = "https://devx.anypoint.mulesoft.com/";

/// Environment variable overriding `base_url`.
pub const ENV_BASE_URL: &str = "MULEB2B_BASE_URL";
/// Environment variable overriding `organization_id`.
pub const ENV_ORG: &str = "MULEB2B_ORG";
/// Environment variable overriding `username`.
pub const ENV_USERNAME: &str = "MULEB2B_USERNAME";
/// Environment variable overriding `password`.
pub const ENV_PASSWORD: &str = "MULEB2B_PASSWORD";

/// The provider block as written by the user. Every field may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProviderConfig {
    /// Platform base URL.
    pub base_url: Option<String>,
    /// Anypoint organization id.
    pub organization_id: Option<String>,
    /// Login user.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

/// Fully resolved provider settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Platform base URL, always ending in `/`.
    pub base_url: String,
    /// Anypoint organization id.
    pub organization_id: String,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    /// The schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "base_url",
                Attribute::optional_string()
                    .with_description("Anypoint platform URL")
                    .with_default(serde_json::json!(DEFAULT_BASE_URL)),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_string().with_description("Anypoint organization ID"),
            )
            .with_attribute(
                "username",
                Attribute::optional_string().with_description("Anypoint login user"),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .with_description("Anypoint login password")
                    .sensitive(),
            )
    }

    /// Decode the provider block and apply process environment fallbacks.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Decode the provider block, resolving unset fields through `env`.
    pub fn from_value_with_env<F>(value: serde_json::Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawProviderConfig = if value.is_null() {
            RawProviderConfig::default()
        } else {
            serde_json::from_value(value)?
        };

        let lookup = |given: Option<String>, var: &str| {
            given
                .filter(|v| !v.is_empty())
                .or_else(|| env(var).filter(|v| !v.is_empty()))
        };

        let mut base_url =
            lookup(raw.base_url, ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let require = |given: Option<String>, attr: &str, var: &str| {
            lookup(given, var).ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "{} needs to be set in the muleb2b provider configuration or {} environment variable must be set",
                    attr, var
                ))
            })
        };

        Ok(Self {
            base_url,
            organization_id: require(raw.organization_id, "organization_id", ENV_ORG)?,
            username: require(raw.username, "username", ENV_USERNAME)?,
            password: require(raw.password, "password", ENV_PASSWORD)?,
        })
    }
}
