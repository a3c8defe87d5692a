use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::resources::decode;
use crate::schema::{Attribute, Schema};

use super::DataSource;

/// `muleb2b_ediDocumentType`: resolves an EDI document type through its
/// format and format version.
pub struct EdiDocumentTypeDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocumentTypeQuery {
    environment_id: String,
    format_type: String,
    format_version: String,
    document_name: String,
}

#[async_trait]
impl DataSource for EdiDocumentTypeDataSource {
    fn type_name(&self) -> &'static str {
        "muleb2b_ediDocumentType"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string()
                    .with_description("The ID of the environment to look up EDI document types in"),
            )
            .with_attribute(
                "format_type",
                Attribute::required_string().with_description("EDI format, e.g. X12"),
            )
            .with_attribute(
                "format_version",
                Attribute::required_string().with_description("Format version label, e.g. 4010"),
            )
            .with_attribute(
                "document_name",
                Attribute::required_string().with_description("Exact document type name, e.g. 850"),
            )
            .with_attribute("edi_format_id", Attribute::computed_string())
            .with_attribute("edi_format_version_id", Attribute::computed_string())
    }

    async fn read(&self, api: &dyn B2bApi, config: Value) -> Result<Value, ProviderError> {
        let q: DocumentTypeQuery = decode(config)?;
        let env = q.environment_id.as_str();

        let format = api
            .list_edi_formats(env)
            .await?
            .into_iter()
            .find(|f| f.format == q.format_type)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "format type ({}) is not valid in this environment ({})",
                    q.format_type, env
                ))
            })?;

        let version = api
            .list_edi_format_versions(env, &format.id)
            .await?
            .into_iter()
            .find(|v| v.label == q.format_version)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "format version ({}) is not valid for this type ({}) and/or environment ({})",
                    q.format_version, q.format_type, env
                ))
            })?;

        let document_type = api
            .list_edi_document_types(env, &format.id, &version.id)
            .await?
            .into_iter()
            .find(|d| d.name == q.document_name)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "EDI Document Type ({}) is not valid for this type ({}), version ({}), and/or environment ({})",
                    q.document_name, q.format_type, q.format_version, env
                ))
            })?;
        debug!(document_type_id = %document_type.id, "Resolved EDI document type");

        Ok(json!({
            "id": document_type.id,
            "environment_id": q.environment_id,
            "format_type": q.format_type,
            "format_version": q.format_version,
            "document_name": q.document_name,
            "edi_format_id": format.id,
            "edi_format_version_id": version.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;

    fn api() -> InMemoryB2bApi {
        InMemoryB2bApi::new()
            .with_edi_document_type("env-1", "X12", "4010", "850")
            .with_edi_document_type("env-1", "X12", "5010", "850")
    }

    fn query(version: &str, document: &str) -> Value {
        json!({
            "environment_id": "env-1",
            "format_type": "X12",
            "format_version": version,
            "document_name": document
        })
    }

    #[tokio::test]
    async fn test_resolves_the_chain() {
        let state = EdiDocumentTypeDataSource
            .read(&api(), query("5010", "850"))
            .await
            .unwrap();
        assert_eq!(state["id"], json!("doctype-X12-5010-850"));
        assert_eq!(state["edi_format_id"], json!("format-X12"));
        assert_eq!(state["edi_format_version_id"], json!("version-X12-5010"));
    }

    #[tokio::test]
    async fn test_each_miss_names_its_scope() {
        let err = EdiDocumentTypeDataSource
            .read(&api(), query("3040", "850"))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "format version (3040) is not valid for this type (X12) and/or environment (env-1)"
        );

        let err = EdiDocumentTypeDataSource
            .read(&api(), query("4010", "810"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().starts_with("EDI Document Type (810)"));

        let mut edifact = query("4010", "850");
        edifact["format_type"] = json!("EDIFACT");
        let err = EdiDocumentTypeDataSource
            .read(&api(), edifact)
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "format type (EDIFACT) is not valid in this environment (env-1)"
        );
    }
}
