//! Wire models of the partner manager API.
//!
//! Every field the API may omit is an `Option`, and unset fields are left out
//! of request bodies. This is what makes read-merge-write updates safe: a
//! record decoded from the server and re-sent keeps the fields this crate
//! does not model, and a partial record only carries what was set.

use serde::{Deserialize, Serialize};

/// Prefix the API expects in front of base64 mapping content.
pub const MAPPING_CONTENT_PREFIX: &str = "data:;base64,";

/// Mapping type used for DataWeave mapping files.
pub const MAPPING_TYPE_DWL_FILE: &str = "DWL_FILE";

/// Status assigned to new identifiers and contacts.
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// An Anypoint environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_flag: Option<bool>,
}

/// A partner identifier. Natural key: (qualifier id, value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_type_qualifier_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Contact category as named by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A partner contact. Natural key: (name, email, type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<ContactType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl Address {
    /// An address with every user field cleared. The API cannot delete an
    /// address once created, so removal is written as this.
    pub fn cleared(id: Option<String>) -> Self {
        let empty = || Some(String::new());
        Self {
            id,
            addr1: empty(),
            addr2: empty(),
            city: empty(),
            state: empty(),
            country: empty(),
            postal_code: empty(),
        }
    }

    /// Whether no user field carries a value.
    pub fn is_empty(&self) -> bool {
        [
            &self.addr1,
            &self.addr2,
            &self.city,
            &self.state,
            &self.country,
            &self.postal_code,
        ]
        .iter()
        .all(|f| f.as_deref().unwrap_or("").is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct X12ParserSettings {
    #[serde(rename = "ackEndpointId", skip_serializing_if = "Option::is_none")]
    pub ack_endpoint_id: Option<String>,
    #[serde(rename = "generateTA1", skip_serializing_if = "Option::is_none")]
    pub generate_ta1: Option<bool>,
    #[serde(rename = "require997", skip_serializing_if = "Option::is_none")]
    pub require_997: Option<bool>,
    #[serde(rename = "generate999", skip_serializing_if = "Option::is_none")]
    pub generate_999: Option<bool>,
    #[serde(
        rename = "failDocumentWhenValueLengthOutsideAllowedRange",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_when_value_length_outside_allowed_range: Option<bool>,
    #[serde(
        rename = "failDocumentWhenUnusedSegmentsAreIncluded",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_when_unused_segments_included: Option<bool>,
    #[serde(
        rename = "failDocumentWhenTooManyRepeatsOfSegment",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_when_too_many_repeats_of_segment: Option<bool>,
    #[serde(
        rename = "failDocumentWhenSegmentsAreOutOfOrder",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_when_segments_out_of_order: Option<bool>,
    #[serde(
        rename = "failDocumentWhenInvalidCharacterInValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_when_invalid_character_in_value: Option<bool>,
    #[serde(
        rename = "failDocumentIfValueIsRepeatedTooManyTimes",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_if_value_repeated_too_many_times: Option<bool>,
    #[serde(
        rename = "failDocumentIfUnknownSegmentsAreUsed",
        skip_serializing_if = "Option::is_none"
    )]
    pub fail_if_unknown_segments_used: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSetAndEncoding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_ending_between_segments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlNumberSettings {
    #[serde(
        rename = "initialInterchangeControlNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_interchange_control_number: Option<String>,
    #[serde(rename = "initialGSControlNumber", skip_serializing_if = "Option::is_none")]
    pub initial_gs_control_number: Option<String>,
    #[serde(
        rename = "initialTransactionSetControlNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_transaction_set_control_number: Option<String>,
    #[serde(
        rename = "requireUniqueISAcontrolNumbersISA13",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_unique_isa13: Option<bool>,
    #[serde(
        rename = "requireUniqueGSControlNumbersGS06",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_unique_gs06: Option<bool>,
    #[serde(
        rename = "requireUniqueTransactionSetControlNumbersST02",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_unique_st02: Option<bool>,
}

/// Per-partner X12 inbound configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X12Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_type_id: Option<String>,
    #[serde(default)]
    pub parser_settings: X12ParserSettings,
    #[serde(default)]
    pub character_set_and_encoding: CharacterSetAndEncoding,
    #[serde(default)]
    pub control_number_settings: ControlNumberSettings,
    /// Server-managed envelope headers, passed through untouched on reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope_headers: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub need_certificate: Option<bool>,
}

/// Transport settings of an endpoint. HTTP and SFTP share one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_idle_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_check_wait_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_frequency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_context: Option<TlsContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<EndpointConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edi_document_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_schema_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_source_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_content: Option<String>,
}

impl Mapping {
    /// A reference to an existing mapping, carrying no content.
    pub fn reference(&self) -> Self {
        Self {
            id: self.id.clone(),
            mapping_type: self.mapping_type.clone(),
            mapping_source_ref: self.mapping_source_ref.clone(),
            mapping_content: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFlowConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_flow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(
        rename = "preProcessingEndpointId",
        skip_serializing_if = "Option::is_none"
    )]
    pub preprocessing_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiving_ack_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_doc_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_doc_type_id: Option<String>,
    #[serde(default)]
    pub document_mapping: Vec<Mapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFlow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_from_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_to_id: Option<String>,
    #[serde(default)]
    pub configurations: Vec<DocumentFlowConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierTypeQualifier {
    pub id: String,
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierType {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub qualifiers: Vec<IdentifierTypeQualifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdiFormat {
    pub id: String,
    /// Format name, e.g. `X12`.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdiFormatVersion {
    pub id: String,
    /// Version label, e.g. `4010`.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdiDocumentType {
    pub id: String,
    pub name: String,
}

/// Body of the `accounts/login` call.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
}

/// Body returned by create calls.
#[derive(Debug, Deserialize)]
pub(crate) struct Created {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let partner = Partner {
            name: Some("Acme".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&partner).unwrap(), json!({"name": "Acme"}));
    }

    #[test]
    fn test_x12_acronym_field_names() {
        let x12 = X12Config {
            parser_settings: X12ParserSettings {
                generate_ta1: Some(true),
                require_997: Some(false),
                ..Default::default()
            },
            control_number_settings: ControlNumberSettings {
                require_unique_isa13: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&x12).unwrap();
        assert_eq!(value["parserSettings"]["generateTA1"], json!(true));
        assert_eq!(value["parserSettings"]["require997"], json!(false));
        assert_eq!(
            value["controlNumberSettings"]["requireUniqueISAcontrolNumbersISA13"],
            json!(true)
        );
    }

    #[test]
    fn test_envelope_headers_pass_through() {
        let raw = json!({
            "id": "x12-1",
            "envelopeHeaders": {"isa05": "ZZ", "isa06": "ACME"},
            "parserSettings": {}
        });
        let x12: X12Config = serde_json::from_value(raw).unwrap();
        assert_eq!(x12.envelope_headers.unwrap()["isa05"], json!("ZZ"));
        assert_eq!(x12.character_set_and_encoding, CharacterSetAndEncoding::default());
    }

    #[test]
    fn test_cleared_address_is_empty_but_keeps_id() {
        let cleared = Address::cleared(Some("addr-1".to_string()));
        assert!(cleared.is_empty());
        assert_eq!(cleared.id.as_deref(), Some("addr-1"));
        let body = serde_json::to_value(&cleared).unwrap();
        assert_eq!(body["addr1"], json!(""));
        assert_eq!(body["postalCode"], json!(""));
    }

    #[test]
    fn test_mapping_reference_drops_content() {
        let mapping = Mapping {
            id: Some("m-1".to_string()),
            mapping_type: Some(MAPPING_TYPE_DWL_FILE.to_string()),
            mapping_source_ref: Some("map.dwl".to_string()),
            mapping_content: Some(format!("{}b3V0cHV0", MAPPING_CONTENT_PREFIX)),
        };
        let reference = mapping.reference();
        assert_eq!(reference.id.as_deref(), Some("m-1"));
        assert!(reference.mapping_content.is_none());
        assert!(serde_json::to_value(&reference)
            .unwrap()
            .get("mappingContent")
            .is_none());
    }

    #[test]
    fn test_flow_configuration_field_names() {
        let config = DocumentFlowConfiguration {
            preprocessing_endpoint_id: Some("e-1".to_string()),
            version: Some(2),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["preProcessingEndpointId"], json!("e-1"));
        assert_eq!(value["version"], json!(2));
        assert_eq!(value["documentMapping"], json!([]));
    }
}
