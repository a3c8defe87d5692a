//! `muleb2b_document`: an EDI document definition owned by a partner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{decode, encode, non_empty, require_id, Resource};
use crate::api::models::Document;
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

const TYPE_NAME: &str = "muleb2b_document";
const CUSTOM_SCHEMA_TYPE: &str = "customSchemaType";

/// The `muleb2b_document` resource.
pub struct DocumentResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DocumentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    partner_id: String,
    environment_id: String,
    edi_document_type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_schema_id: Option<String>,
}

impl DocumentState {
    fn to_record(&self) -> Document {
        let mut document = Document {
            name: Some(self.name.clone()),
            edi_document_type_id: Some(self.edi_document_type_id.clone()),
            ..Default::default()
        };
        match non_empty(self.schema_file.as_deref()) {
            Some(content) => {
                document.schema_content = Some(content);
                document.schema_type = Some(CUSTOM_SCHEMA_TYPE.to_string());
                document.standard = Some(false);
            },
            None => document.standard = Some(true),
        }
        document
    }
}

async fn create_document(
    api: &dyn B2bApi,
    state: &DocumentState,
) -> Result<DocumentState, ProviderError> {
    let id = api
        .create_document(&state.environment_id, &state.partner_id, &state.to_record())
        .await?;
    debug!(document_id = %id, partner_id = %state.partner_id, "Created document");
    read_state(api, state, &id).await
}

async fn read_state(
    api: &dyn B2bApi,
    known: &DocumentState,
    document_id: &str,
) -> Result<DocumentState, ProviderError> {
    let document = api
        .get_document(&known.environment_id, &known.partner_id, document_id)
        .await?;
    let custom = document.schema_content.is_some();
    Ok(DocumentState {
        id: Some(document.id.unwrap_or_else(|| document_id.to_string())),
        name: document.name.unwrap_or_else(|| known.name.clone()),
        partner_id: known.partner_id.clone(),
        environment_id: known.environment_id.clone(),
        edi_document_type_id: document.edi_document_type_id.unwrap_or_default(),
        schema_file: document.schema_content,
        custom_schema_id: if custom { document.custom_schema_id } else { None },
    })
}

#[async_trait]
impl Resource for DocumentResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the document type")
                    .with_force_new(),
            )
            .with_attribute(
                "partner_id",
                Attribute::required_string()
                    .with_description("The ID of the partner to create the document under")
                    .with_force_new(),
            )
            .with_attribute(
                "environment_id",
                Attribute::required_string()
                    .with_description("The ID of the environment to create the document under")
                    .with_force_new(),
            )
            .with_attribute(
                "edi_document_type_id",
                Attribute::required_string()
                    .with_description("The ID of the EDI document type")
                    .with_force_new(),
            )
            .with_attribute(
                "schema_file",
                Attribute::optional_string()
                    .with_description("Base64 encoded custom schema. Leave unset for the standard schema.")
                    .with_force_new(),
            )
            .with_attribute(
                "custom_schema_id",
                Attribute::computed_string().with_description("The ID of the custom schema"),
            )
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: DocumentState = decode(planned)?;
        encode(&create_document(api, &planned).await?)
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let state: DocumentState = decode(state)?;
        let document_id = require_id(&state.id, TYPE_NAME)?;
        encode(&read_state(api, &state, document_id).await?)
    }

    /// Documents cannot be modified in place: a replacement is created and
    /// the old document removed.
    async fn update(
        &self,
        api: &dyn B2bApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: DocumentState = decode(prior)?;
        let planned: DocumentState = decode(planned)?;
        let old_id = require_id(&prior.id, TYPE_NAME)?;

        let created = create_document(api, &planned).await?;
        if let Err(e) = api
            .delete_document(&prior.environment_id, &prior.partner_id, old_id)
            .await
        {
            if !e.is_not_found() {
                return Err(e);
            }
            warn!(document_id = old_id, "Replaced document was already gone");
        }
        encode(&created)
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: DocumentState = decode(state)?;
        let document_id = require_id(&state.id, TYPE_NAME)?;
        api.delete_document(&state.environment_id, &state.partner_id, document_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;
    use serde_json::json;

    const ENV: &str = "env-1";

    fn config() -> Value {
        json!({
            "name": "Acme 850",
            "partner_id": "p-1",
            "environment_id": ENV,
            "edi_document_type_id": "doctype-X12-4010-850"
        })
    }

    #[test]
    fn test_standard_and_custom_records() {
        let mut state: DocumentState = decode(config()).unwrap();
        let standard = state.to_record();
        assert_eq!(standard.standard, Some(true));
        assert!(standard.schema_type.is_none());

        state.schema_file = Some("c2NoZW1h".to_string());
        let custom = state.to_record();
        assert_eq!(custom.standard, Some(false));
        assert_eq!(custom.schema_type.as_deref(), Some(CUSTOM_SCHEMA_TYPE));
        assert_eq!(custom.schema_content.as_deref(), Some("c2NoZW1h"));
    }

    #[test]
    fn test_every_input_forces_replacement() {
        let schema = DocumentResource.schema();
        for name in ["name", "partner_id", "environment_id", "edi_document_type_id", "schema_file"] {
            assert!(schema.forces_new(name), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_custom_schema_lifecycle() {
        let api = InMemoryB2bApi::new();
        let mut config = config();
        config["schema_file"] = json!("c2NoZW1h");

        let state = DocumentResource.create(&api, config).await.unwrap();
        assert!(state["custom_schema_id"].is_string());
        assert_eq!(state["schema_file"], json!("c2NoZW1h"));

        let read = DocumentResource.read(&api, state.clone()).await.unwrap();
        assert_eq!(read, state);

        DocumentResource.delete(&api, state.clone()).await.unwrap();
        let err = DocumentResource.read(&api, state).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_replaces_document() {
        let api = InMemoryB2bApi::new();
        let prior = DocumentResource.create(&api, config()).await.unwrap();

        let mut planned = prior.clone();
        planned["name"] = json!("Acme 850 v2");
        let state = DocumentResource.update(&api, prior.clone(), planned).await.unwrap();

        assert_ne!(state["id"], prior["id"]);
        assert_eq!(state["name"], json!("Acme 850 v2"));
        assert!(DocumentResource.read(&api, prior).await.unwrap_err().is_not_found());
    }
}
