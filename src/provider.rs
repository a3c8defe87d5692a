//! The Mule B2B provider: wires resource and data source types to the
//! plugin protocol.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{B2bApi, HttpB2bClient};
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan::plan;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::PlanResult;
use crate::validation::validate;

/// Provider for the Anypoint Partner Manager.
///
/// Holds no API client until `configure` succeeds; resource calls made
/// before that fail with [`ProviderError::FailedPrecondition`].
pub struct MuleB2bProvider {
    api: RwLock<Option<Arc<dyn B2bApi>>>,
}

impl MuleB2bProvider {
    /// An unconfigured provider.
    pub fn new() -> Self {
        Self {
            api: RwLock::new(None),
        }
    }

    /// A provider already bound to an API implementation.
    pub fn with_api(api: Arc<dyn B2bApi>) -> Self {
        Self {
            api: RwLock::new(Some(api)),
        }
    }

    async fn api(&self) -> Result<Arc<dyn B2bApi>, ProviderError> {
        self.api.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider is not configured".to_string())
        })
    }
}

impl Default for MuleB2bProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn resource(type_name: &str) -> Result<&'static dyn Resource, ProviderError> {
    resources::find(type_name).ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
}

fn data_source(type_name: &str) -> Result<&'static dyn DataSource, ProviderError> {
    data_sources::find(type_name)
        .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
}

fn resource_diagnostics(resource: &dyn Resource, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(&resource.schema(), config);
    diagnostics.extend(resource.validate(config));
    diagnostics
}

/// Reject a state that fails validation before any remote call is made.
fn ensure_valid(resource: &dyn Resource, state: &Value) -> Result<(), ProviderError> {
    let errors: Vec<String> = resource_diagnostics(resource, state)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(|d| match d.attribute {
            Some(attr) => format!("{}: {}", attr, d.summary),
            None => d.summary,
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(errors.join("; ")))
    }
}

#[async_trait]
impl ProviderService for MuleB2bProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = resources::all()
            .into_iter()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        data_sources::all()
            .into_iter()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(config)?;
        let client = HttpB2bClient::new(&config)?;
        client.login(&config.username, &config.password).await?;
        info!(
            base_url = %config.base_url,
            organization_id = %config.organization_id,
            "Provider configured"
        );

        *self.api.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.api.write().await.take();
        debug!("Released API client");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(resource_diagnostics(resource(resource_type)?, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = resource(resource_type)?;
        Ok(plan(&resource.schema(), prior_state, proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        ensure_valid(resource, &planned_state)?;
        let api = self.api().await?;
        resource.create(api.as_ref(), planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        let api = self.api().await?;
        match resource.read(api.as_ref(), current_state).await {
            Err(e) if e.is_not_found() => {
                warn!(resource_type, error = %e, "Resource no longer exists, dropping from state");
                Ok(Value::Null)
            },
            other => other,
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        ensure_valid(resource, &planned_state)?;
        let api = self.api().await?;
        resource.update(api.as_ref(), prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = resource(resource_type)?;
        let api = self.api().await?;
        match resource.delete(api.as_ref(), current_state).await {
            Err(e) if e.is_not_found() => {
                warn!(resource_type, error = %e, "Resource already deleted");
                Ok(())
            },
            other => other,
        }
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = data_source(data_source_type)?;
        let mut diagnostics = validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = data_source(data_source_type)?;
        let api = self.api().await?;
        data_source.read(api.as_ref(), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;
    use serde_json::json;

    #[test]
    fn test_schema_lists_every_type() {
        let schema = MuleB2bProvider::new().schema();
        assert_eq!(schema.resources.len(), resources::all().len());
        assert!(schema.data_sources.contains_key("muleb2b_ediDocumentType"));
        assert!(schema.provider.block.attributes.contains_key("organization_id"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_refuses_remote_calls() {
        let provider = MuleB2bProvider::new();
        let err = provider
            .read_data_source("muleb2b_environment", json!({"name": "Sandbox"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = MuleB2bProvider::with_api(Arc::new(InMemoryB2bApi::new()));
        let err = provider.create("muleb2b_widget", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown resource type: muleb2b_widget");
        assert!(provider
            .validate_data_source_config("muleb2b_widget", json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_state_before_calling_api() {
        let api = Arc::new(InMemoryB2bApi::new());
        let provider = MuleB2bProvider::with_api(api.clone());
        let err = provider
            .create("muleb2b_certificate", json!({"environment_id": "env-1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_of_deleted_entity_returns_null() {
        let api = Arc::new(InMemoryB2bApi::new());
        let provider = MuleB2bProvider::with_api(api.clone());
        let state = json!({
            "id": "missing",
            "environment_id": "env-1",
            "partner_id": "p-1",
            "name": "gone",
            "certificate_body": "pem"
        });
        let read = provider.read("muleb2b_certificate", state.clone()).await.unwrap();
        assert!(read.is_null());
        provider.delete("muleb2b_certificate", state).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_releases_client() {
        let provider = MuleB2bProvider::with_api(Arc::new(InMemoryB2bApi::new()));
        provider.stop().await.unwrap();
        assert!(provider.api().await.is_err());
    }
}
