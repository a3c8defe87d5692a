use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::resources::decode;
use crate::schema::{Attribute, Schema};

use super::DataSource;

/// `muleb2b_environment`: resolves an environment id by exact name.
pub struct EnvironmentDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvironmentQuery {
    name: String,
}

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn type_name(&self) -> &'static str {
        "muleb2b_environment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Exact name of the environment"),
            )
    }

    async fn read(&self, api: &dyn B2bApi, config: Value) -> Result<Value, ProviderError> {
        let query: EnvironmentQuery = decode(config)?;
        let environment = api
            .list_environments()
            .await?
            .into_iter()
            .find(|e| e.name == query.name && !e.id.is_empty())
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "no environment found with name ({})",
                    query.name
                ))
            })?;
        Ok(json!({"id": environment.id, "name": environment.name}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;

    #[tokio::test]
    async fn test_lookup_by_exact_name() {
        let api = InMemoryB2bApi::new()
            .with_environment("env-sbx", "Sandbox")
            .with_environment("env-prd", "Production");

        let state = EnvironmentDataSource
            .read(&api, json!({"name": "Production"}))
            .await
            .unwrap();
        assert_eq!(state["id"], json!("env-prd"));

        let err = EnvironmentDataSource
            .read(&api, json!({"name": "production"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "no environment found with name (production)");
    }
}
