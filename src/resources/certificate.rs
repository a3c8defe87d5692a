//! `muleb2b_certificate`: a PEM certificate attached to a partner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, encode, require_id, Resource};
use crate::api::models::Certificate;
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

const TYPE_NAME: &str = "muleb2b_certificate";
const CERTIFICATE_TYPE_PEM: &str = "PEM";

/// The `muleb2b_certificate` resource.
pub struct CertificateResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CertificateState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    environment_id: String,
    partner_id: String,
    name: String,
    certificate_body: String,
}

fn strip_cr(body: &str) -> String {
    body.replace('\r', "")
}

#[async_trait]
impl Resource for CertificateResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "partner_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the certificate")
                    .with_force_new(),
            )
            .with_attribute(
                "certificate_body",
                Attribute::required_string()
                    .with_description("PEM encoded certificate")
                    .with_force_new(),
            )
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let mut planned: CertificateState = decode(planned)?;
        let certificate = Certificate {
            name: Some(planned.name.clone()),
            certificate_type: Some(CERTIFICATE_TYPE_PEM.to_string()),
            content: Some(strip_cr(&planned.certificate_body)),
            ..Default::default()
        };
        let id = api
            .create_certificate(&planned.environment_id, &planned.partner_id, &certificate)
            .await?;
        planned.id = Some(id);
        encode(&planned)
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let mut state: CertificateState = decode(state)?;
        let id = require_id(&state.id, TYPE_NAME)?;
        let certificate = api
            .get_certificate(&state.environment_id, &state.partner_id, id)
            .await?;
        if let Some(name) = certificate.name {
            state.name = name;
        }
        encode(&state)
    }

    async fn update(
        &self,
        _api: &dyn B2bApi,
        _prior: Value,
        _planned: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unimplemented(
            "certificates cannot be updated in place".to_string(),
        ))
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: CertificateState = decode(state)?;
        let id = require_id(&state.id, TYPE_NAME)?;
        api.delete_certificate(&state.environment_id, &state.partner_id, id)
            .await
    }
}
