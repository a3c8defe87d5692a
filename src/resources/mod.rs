//! Managed resource types.
//!
//! Each resource decodes host state into a typed structure, talks to the
//! [`B2bApi`] and encodes the result back. Nested blocks are arrays in state;
//! single-value blocks hold at most one element.

mod certificate;
mod document;
mod document_flow;
mod endpoint;
mod identifier;
mod partner;

pub use certificate::CertificateResource;
pub use document::DocumentResource;
pub use document_flow::DocumentFlowResource;
pub use endpoint::EndpointResource;
pub use identifier::IdentifierResource;
pub use partner::PartnerResource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};

/// A resource type managed by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name as used in configuration, e.g. `muleb2b_partner`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Cross-field checks the schema cannot express.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the remote entity and return the resulting state.
    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the remote entity.
    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError>;

    /// Apply the planned state to an existing remote entity.
    async fn update(
        &self,
        api: &dyn B2bApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote entity.
    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError>;
}

/// Every resource type the provider serves.
pub fn all() -> Vec<&'static dyn Resource> {
    vec![
        &PartnerResource,
        &IdentifierResource,
        &EndpointResource,
        &DocumentResource,
        &DocumentFlowResource,
        &CertificateResource,
    ]
}

/// Look up a resource type by name.
pub fn find(type_name: &str) -> Option<&'static dyn Resource> {
    all().into_iter().find(|r| r.type_name() == type_name)
}

/// Decode host state into a typed structure. Null values count as absent.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(strip_nulls(value))?)
}

/// Encode a typed structure into host state.
pub(crate) fn encode<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Remove null members from every object in `value`.
pub(crate) fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// The server id recorded in state, or an error naming the resource type.
pub(crate) fn require_id<'a>(
    id: &'a Option<String>,
    type_name: &str,
) -> Result<&'a str, ProviderError> {
    id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
        ProviderError::Validation(format!("{} state has no id", type_name))
    })
}

/// `Some` for non-empty strings.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<&str> = all().iter().map(|r| r.type_name()).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
        assert!(find("muleb2b_partner").is_some());
        assert!(find("muleb2b_nope").is_none());
    }

    #[test]
    fn test_every_resource_has_computed_id_and_forced_environment() {
        for resource in all() {
            let schema = resource.schema();
            let id = &schema.block.attributes["id"];
            assert!(id.flags.computed, "{}", resource.type_name());
            assert!(
                schema.forces_new("environment_id"),
                "{} environment_id",
                resource.type_name()
            );
        }
    }

    #[test]
    fn test_strip_nulls_is_recursive() {
        let value = json!({"a": null, "b": [{"c": null, "d": 1}], "e": "x"});
        assert_eq!(strip_nulls(value), json!({"b": [{"d": 1}], "e": "x"}));
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(&Some("p-1".into()), "muleb2b_partner").unwrap(), "p-1");
        let err = require_id(&Some(String::new()), "muleb2b_partner").unwrap_err();
        assert!(err.message().contains("muleb2b_partner"));
        assert!(require_id(&None, "muleb2b_partner").is_err());
    }
}
