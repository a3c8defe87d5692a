//! `muleb2b_identifier`: a single partner identifier managed on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{decode, encode, require_id, Resource};
use crate::api::models::{Identifier, STATUS_ACTIVE};
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::reconcile::ChildRecord;
use crate::schema::{Attribute, Schema};

const TYPE_NAME: &str = "muleb2b_identifier";

/// The `muleb2b_identifier` resource.
pub struct IdentifierResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct IdentifierState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    partner_id: String,
    environment_id: String,
    identifier_type_id: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl IdentifierState {
    fn with_record(&self, record: Identifier) -> Self {
        Self {
            id: record.id,
            identifier_type_id: record
                .identifier_type_qualifier_id
                .unwrap_or_else(|| self.identifier_type_id.clone()),
            value: record.value.unwrap_or_else(|| self.value.clone()),
            status: record.status,
            ..self.clone()
        }
    }
}

#[async_trait]
impl Resource for IdentifierResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "partner_id",
                Attribute::required_string()
                    .with_description("ID of the partner the identifier belongs to")
                    .with_force_new(),
            )
            .with_attribute(
                "environment_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "identifier_type_id",
                Attribute::required_string()
                    .with_description("ID of the identifier type qualifier")
                    .with_force_new(),
            )
            .with_attribute(
                "value",
                Attribute::required_string()
                    .with_description("The identifier value")
                    .with_force_new(),
            )
            .with_attribute("status", Attribute::computed_string())
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: IdentifierState = decode(planned)?;
        let env = planned.environment_id.as_str();
        let record = Identifier {
            identifier_type_qualifier_id: Some(planned.identifier_type_id.clone()),
            value: Some(planned.value.clone()),
            status: Some(STATUS_ACTIVE.to_string()),
            ..Default::default()
        };
        api.create_identifier(env, &planned.partner_id, &record).await?;

        // the create call does not return an id
        let key = record.natural_key();
        let created = api
            .list_identifiers(env, &planned.partner_id)
            .await?
            .into_iter()
            .find(|i| i.natural_key() == key && i.server_id().is_some())
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "identifier ({}, {}) not created for partner ({})",
                    planned.identifier_type_id, planned.value, planned.partner_id
                ))
            })?;
        debug!(identifier_id = ?created.id, partner_id = %planned.partner_id, "Created identifier");

        encode(&planned.with_record(created))
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let state: IdentifierState = decode(state)?;
        let id = require_id(&state.id, TYPE_NAME)?;
        let record = api
            .get_identifier(&state.environment_id, &state.partner_id, id)
            .await?;
        encode(&state.with_record(record))
    }

    async fn update(
        &self,
        _api: &dyn B2bApi,
        _prior: Value,
        _planned: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unimplemented(
            "identifiers cannot be updated in place".to_string(),
        ))
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: IdentifierState = decode(state)?;
        let id = require_id(&state.id, TYPE_NAME)?;
        api.delete_identifier(&state.environment_id, &state.partner_id, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;
    use serde_json::json;

    const ENV: &str = "env-1";

    #[tokio::test]
    async fn test_create_resolves_id_by_natural_key() {
        let api = InMemoryB2bApi::new();
        let partner_id = api.seed_partner(ENV, "Acme");

        let state = IdentifierResource
            .create(
                &api,
                json!({
                    "partner_id": partner_id,
                    "environment_id": ENV,
                    "identifier_type_id": "duns",
                    "value": "123456789"
                }),
            )
            .await
            .unwrap();

        assert!(state["id"].is_string());
        assert_eq!(state["status"], json!(STATUS_ACTIVE));

        let read = IdentifierResource.read(&api, state.clone()).await.unwrap();
        assert_eq!(read, state);

        IdentifierResource.delete(&api, state).await.unwrap();
        assert!(api.list_identifiers(ENV, &partner_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_is_unimplemented() {
        let api = InMemoryB2bApi::new();
        let err = IdentifierResource
            .update(&api, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));
    }
}
