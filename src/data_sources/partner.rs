use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::models::Partner;
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::resources::decode;
use crate::schema::{Attribute, Diagnostic, Schema};

use super::DataSource;

/// `muleb2b_partner`: resolves a partner by exact name, or the host partner.
pub struct PartnerDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartnerQuery {
    environment_id: String,
    name: Option<String>,
    host: Option<bool>,
}

impl PartnerQuery {
    fn wants_host(&self) -> bool {
        self.host == Some(true)
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

fn no_name() -> ProviderError {
    ProviderError::Validation("no partner name specified".to_string())
}

#[async_trait]
impl DataSource for PartnerDataSource {
    fn type_name(&self) -> &'static str {
        "muleb2b_partner"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string()
                    .with_description("The ID of the environment to look up the partner in"),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("Exact name of the partner"),
            )
            .with_attribute(
                "host",
                Attribute::optional_bool()
                    .with_description("Look up the host partner instead; name is ignored"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match decode::<PartnerQuery>(config.clone()) {
            Ok(q) if !q.wants_host() && q.name().is_none() => {
                vec![Diagnostic::error(no_name().message()).with_attribute("name")]
            },
            _ => Vec::new(),
        }
    }

    async fn read(&self, api: &dyn B2bApi, config: Value) -> Result<Value, ProviderError> {
        let q: PartnerQuery = decode(config)?;
        let partners = api.list_partners(&q.environment_id).await?;

        let found: Partner = if q.wants_host() {
            partners
                .into_iter()
                .find(|p| p.host_flag == Some(true))
                .ok_or_else(|| {
                    ProviderError::NotFound(format!(
                        "no host partner found in environment ({})",
                        q.environment_id
                    ))
                })?
        } else {
            let name = q.name().ok_or_else(no_name)?;
            partners
                .into_iter()
                .find(|p| p.name.as_deref() == Some(name))
                .ok_or_else(|| {
                    ProviderError::NotFound(format!("no partner found with name ({})", name))
                })?
        };

        let id = found.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::NotFound(format!(
                "no partner found with name ({})",
                q.name().unwrap_or_default()
            ))
        })?;

        Ok(json!({
            "id": id,
            "environment_id": q.environment_id,
            "name": found.name,
            "host": q.wants_host(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;

    #[tokio::test]
    async fn test_lookup_by_name_and_host() {
        let api = InMemoryB2bApi::new();
        let host_id = api.seed_host_partner("env-1", "Mule Corp");
        let acme_id = api.seed_partner("env-1", "Acme");

        let state = PartnerDataSource
            .read(&api, json!({"environment_id": "env-1", "name": "Acme"}))
            .await
            .unwrap();
        assert_eq!(state["id"], json!(acme_id));

        let state = PartnerDataSource
            .read(&api, json!({"environment_id": "env-1", "host": true, "name": "Acme"}))
            .await
            .unwrap();
        assert_eq!(state["id"], json!(host_id));
        assert_eq!(state["name"], json!("Mule Corp"));
    }

    #[tokio::test]
    async fn test_missing_name() {
        let api = InMemoryB2bApi::new();
        let config = json!({"environment_id": "env-1"});

        let diagnostics = PartnerDataSource.validate(&config);
        assert_eq!(diagnostics[0].summary, "no partner name specified");

        let err = PartnerDataSource.read(&api, config).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let err = PartnerDataSource
            .read(&api, json!({"environment_id": "env-1", "name": "Nobody"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "no partner found with name (Nobody)");
    }
}
