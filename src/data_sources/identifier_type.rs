use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::models::{IdentifierType, IdentifierTypeQualifier};
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::resources::decode;
use crate::schema::{Attribute, Diagnostic, Schema};

use super::{single, DataSource};

/// `muleb2b_identifier_type`: resolves an identifier type qualifier id.
///
/// The type is selected by name or label. When it has more than one
/// qualifier, a qualifier code or label must pick one.
pub struct IdentifierTypeDataSource;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentifierTypeQuery {
    environment_id: String,
    name: Option<String>,
    label: Option<String>,
    qualifier_code: Option<String>,
    qualifier_label: Option<String>,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn no_selector() -> ProviderError {
    ProviderError::Validation("no identifier name or label specified".to_string())
}

impl IdentifierTypeQuery {
    fn select_type(&self, types: Vec<IdentifierType>) -> Result<IdentifierType, ProviderError> {
        let (field, wanted): (&str, &str) = match (given(&self.name), given(&self.label)) {
            (Some(name), _) => ("name", name),
            (None, Some(label)) => ("label", label),
            (None, None) => return Err(no_selector()),
        };
        let matches = types
            .into_iter()
            .filter(|t| if field == "name" { t.name == wanted } else { t.label == wanted })
            .collect();
        single(
            matches,
            || format!("no identifiers found with {} ({})", field, wanted),
            || format!("multiple results found with {} ({})", field, wanted),
        )
    }

    fn select_qualifier(
        &self,
        type_name: &str,
        mut qualifiers: Vec<IdentifierTypeQualifier>,
    ) -> Result<IdentifierTypeQualifier, ProviderError> {
        if qualifiers.len() == 1 {
            return Ok(qualifiers.remove(0));
        }
        let (field, wanted): (&str, &str) =
            match (given(&self.qualifier_code), given(&self.qualifier_label)) {
                (Some(code), _) => ("code", code),
                (None, Some(label)) => ("label", label),
                (None, None) if qualifiers.is_empty() => {
                    return Err(ProviderError::NotFound(format!(
                        "no qualifiers found for identifier type ({})",
                        type_name
                    )))
                },
                (None, None) => {
                    return Err(ProviderError::Validation(
                        "multiple identifier qualifiers found and no qualifier code or label specified"
                            .to_string(),
                    ))
                },
            };
        let matches = qualifiers
            .into_iter()
            .filter(|q| if field == "code" { q.code == wanted } else { q.label == wanted })
            .collect();
        single(
            matches,
            || format!("no qualifiers found with {} ({})", field, wanted),
            || format!("multiple results found with {} ({})", field, wanted),
        )
    }
}

#[async_trait]
impl DataSource for IdentifierTypeDataSource {
    fn type_name(&self) -> &'static str {
        "muleb2b_identifier_type"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "environment_id",
                Attribute::required_string()
                    .with_description("ID of the environment to look up the identifier type in"),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("Exact identifier type name"),
            )
            .with_attribute(
                "label",
                Attribute::optional_computed_string().with_description("Exact identifier type label"),
            )
            .with_attribute(
                "qualifier_code",
                Attribute::optional_computed_string().with_description("Exact qualifier code"),
            )
            .with_attribute(
                "qualifier_label",
                Attribute::optional_computed_string().with_description("Exact qualifier label"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match decode::<IdentifierTypeQuery>(config.clone()) {
            Ok(q) if given(&q.name).is_none() && given(&q.label).is_none() => {
                vec![Diagnostic::error(no_selector().message()).with_attribute("name")]
            },
            _ => Vec::new(),
        }
    }

    async fn read(&self, api: &dyn B2bApi, config: Value) -> Result<Value, ProviderError> {
        let q: IdentifierTypeQuery = decode(config)?;
        let types = api.list_identifier_types(&q.environment_id).await?;
        let identifier_type = q.select_type(types)?;
        let qualifier = q.select_qualifier(&identifier_type.name, identifier_type.qualifiers)?;

        Ok(json!({
            "id": qualifier.id,
            "environment_id": q.environment_id,
            "name": identifier_type.name,
            "label": identifier_type.label,
            "qualifier_code": qualifier.code,
            "qualifier_label": qualifier.label,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;

    fn qualifier(id: &str, code: &str, label: &str) -> IdentifierTypeQualifier {
        IdentifierTypeQualifier {
            id: id.to_string(),
            code: code.to_string(),
            label: label.to_string(),
        }
    }

    fn api() -> InMemoryB2bApi {
        InMemoryB2bApi::new()
            .with_identifier_type(
                "env-1",
                IdentifierType {
                    id: "t-x12".into(),
                    name: "X12".into(),
                    label: "X12 ISA".into(),
                    qualifiers: vec![
                        qualifier("q-01", "01", "DUNS"),
                        qualifier("q-zz", "ZZ", "Mutually Defined"),
                    ],
                },
            )
            .with_identifier_type(
                "env-1",
                IdentifierType {
                    id: "t-as2".into(),
                    name: "AS2".into(),
                    label: "AS2 Identity".into(),
                    qualifiers: vec![qualifier("q-as2", "AS2", "AS2 Identity")],
                },
            )
    }

    #[tokio::test]
    async fn test_single_qualifier_is_selected_automatically() {
        let state = IdentifierTypeDataSource
            .read(&api(), json!({"environment_id": "env-1", "label": "AS2 Identity"}))
            .await
            .unwrap();
        assert_eq!(state["id"], json!("q-as2"));
        assert_eq!(state["name"], json!("AS2"));
    }

    #[tokio::test]
    async fn test_qualifier_selected_by_code_or_label() {
        let by_code = IdentifierTypeDataSource
            .read(
                &api(),
                json!({"environment_id": "env-1", "name": "X12", "qualifier_code": "ZZ"}),
            )
            .await
            .unwrap();
        assert_eq!(by_code["id"], json!("q-zz"));

        let by_label = IdentifierTypeDataSource
            .read(
                &api(),
                json!({"environment_id": "env-1", "name": "X12", "qualifier_label": "DUNS"}),
            )
            .await
            .unwrap();
        assert_eq!(by_label["id"], json!("q-01"));
        assert_eq!(by_label["qualifier_code"], json!("01"));
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let err = IdentifierTypeDataSource
            .read(&api(), json!({"environment_id": "env-1", "name": "X12"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "multiple identifier qualifiers found and no qualifier code or label specified"
        );

        let err = IdentifierTypeDataSource
            .read(&api(), json!({"environment_id": "env-1", "name": "EDIFACT"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "no identifiers found with name (EDIFACT)");

        let ambiguous = api().with_identifier_type(
            "env-1",
            IdentifierType {
                id: "t-x12-b".into(),
                name: "X12".into(),
                label: "X12 GS".into(),
                qualifiers: vec![],
            },
        );
        let err = IdentifierTypeDataSource
            .read(&ambiguous, json!({"environment_id": "env-1", "name": "X12"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Ambiguous(_)));
        assert_eq!(err.message(), "multiple results found with name (X12)");

        let config = json!({"environment_id": "env-1"});
        assert_eq!(IdentifierTypeDataSource.validate(&config).len(), 1);
    }

    #[tokio::test]
    async fn test_type_without_qualifiers_is_not_found() {
        let api = api().with_identifier_type(
            "env-1",
            IdentifierType {
                id: "t-edifact".into(),
                name: "EDIFACT".into(),
                label: "EDIFACT UNB".into(),
                qualifiers: vec![],
            },
        );
        let err = IdentifierTypeDataSource
            .read(&api, json!({"environment_id": "env-1", "name": "EDIFACT"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.message(),
            "no qualifiers found for identifier type (EDIFACT)"
        );
    }
}
