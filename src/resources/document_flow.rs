//! `muleb2b_document_flow`: routing of documents between two partners.
//!
//! The server creates a flow together with one empty configuration. That
//! configuration is filled in afterwards, and mappings are uploaded
//! separately and referenced from it by id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{decode, encode, non_empty, require_id, Resource};
use crate::api::models::{
    DocumentFlow, DocumentFlowConfiguration, Mapping, MAPPING_CONTENT_PREFIX,
    MAPPING_TYPE_DWL_FILE,
};
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};

const TYPE_NAME: &str = "muleb2b_document_flow";

/// The `muleb2b_document_flow` resource.
pub struct DocumentFlowResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct FlowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    direction: String,
    environment_id: String,
    partner_from_id: String,
    partner_to_id: String,
    config: Vec<ConfigBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ConfigBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preprocessing_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiving_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiving_ack_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_doc_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_doc_type_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    document_mapping: Vec<MappingBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct MappingBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    mapping_type: Option<String>,
    file_name: String,
    file_content: String,
}

impl MappingBlock {
    fn to_record(&self) -> Mapping {
        Mapping {
            id: None,
            mapping_type: Some(MAPPING_TYPE_DWL_FILE.to_string()),
            mapping_source_ref: Some(self.file_name.clone()),
            mapping_content: Some(format!("{}{}", MAPPING_CONTENT_PREFIX, self.file_content)),
        }
    }

    fn from_record(mapping: Mapping) -> Self {
        let content = mapping.mapping_content.unwrap_or_default();
        Self {
            id: mapping.id,
            mapping_type: mapping.mapping_type,
            file_name: mapping.mapping_source_ref.unwrap_or_default(),
            file_content: content
                .strip_prefix(MAPPING_CONTENT_PREFIX)
                .unwrap_or(&content)
                .to_string(),
        }
    }

    fn same_file(&self, other: &MappingBlock) -> bool {
        self.file_name == other.file_name && self.file_content == other.file_content
    }
}

impl ConfigBlock {
    /// Overlay the endpoint and document type ids set in this block.
    fn merge_into(&self, config: &mut DocumentFlowConfiguration) {
        let fields = [
            (&mut config.preprocessing_endpoint_id, &self.preprocessing_endpoint_id),
            (&mut config.receiving_endpoint_id, &self.receiving_endpoint_id),
            (&mut config.receiving_ack_endpoint_id, &self.receiving_ack_endpoint_id),
            (&mut config.target_endpoint_id, &self.target_endpoint_id),
            (&mut config.source_doc_type_id, &self.source_doc_type_id),
            (&mut config.target_doc_type_id, &self.target_doc_type_id),
        ];
        for (target, value) in fields {
            if let Some(v) = non_empty(value.as_deref()) {
                *target = Some(v);
            }
        }
    }

    fn from_record(config: &DocumentFlowConfiguration, mapping: Option<Mapping>) -> Self {
        Self {
            id: config.id.clone(),
            status: config.status.clone(),
            version: config.version,
            preprocessing_endpoint_id: config.preprocessing_endpoint_id.clone(),
            receiving_endpoint_id: config.receiving_endpoint_id.clone(),
            receiving_ack_endpoint_id: config.receiving_ack_endpoint_id.clone(),
            target_endpoint_id: config.target_endpoint_id.clone(),
            source_doc_type_id: config.source_doc_type_id.clone(),
            target_doc_type_id: config.target_doc_type_id.clone(),
            document_mapping: mapping.map(MappingBlock::from_record).into_iter().collect(),
        }
    }
}

fn empty_configuration() -> ProviderError {
    ProviderError::Reconcile("documentflow configuration is empty".to_string())
}

/// Upload a mapping and return a content-free reference to it.
async fn upload_mapping(
    api: &dyn B2bApi,
    env: &str,
    flow_id: &str,
    block: &MappingBlock,
) -> Result<Mapping, ProviderError> {
    let mut mapping = block.to_record();
    let mapping_id = api.create_mapping(env, flow_id, &mapping).await?;
    debug!(flow_id, mapping_id = %mapping_id, file = %block.file_name, "Uploaded mapping");
    mapping.id = Some(mapping_id);
    Ok(mapping.reference())
}

async fn read_state(
    api: &dyn B2bApi,
    env: &str,
    flow_id: &str,
) -> Result<FlowState, ProviderError> {
    let flow = api.get_document_flow(env, flow_id).await?;
    let configuration = flow.configurations.first().ok_or_else(empty_configuration)?;

    let mapping = match configuration
        .document_mapping
        .first()
        .and_then(|m| m.id.as_deref())
    {
        Some(mapping_id) => Some(api.get_mapping(env, flow_id, mapping_id).await?),
        None => None,
    };

    Ok(FlowState {
        id: Some(flow.id.clone().unwrap_or_else(|| flow_id.to_string())),
        name: flow.name.clone().unwrap_or_default(),
        direction: flow
            .direction
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase(),
        environment_id: env.to_string(),
        partner_from_id: flow.partner_from_id.clone().unwrap_or_default(),
        partner_to_id: flow.partner_to_id.clone().unwrap_or_default(),
        config: vec![ConfigBlock::from_record(configuration, mapping)],
    })
}

fn schema() -> Schema {
    let mapping = Block::new()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("ID of the uploaded mapping"),
        )
        .with_attribute("type", Attribute::computed_string())
        .with_attribute(
            "file_name",
            Attribute::required_string().with_description("Name of the mapping file"),
        )
        .with_attribute(
            "file_content",
            Attribute::required_string().with_description("Base64 encoded mapping file"),
        );

    let config = Block::new()
        .with_description("Configuration of the document flow")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("status", Attribute::computed_string())
        .with_attribute("version", Attribute::computed_int64())
        .with_attribute("preprocessing_endpoint_id", Attribute::optional_string())
        .with_attribute(
            "receiving_endpoint_id",
            Attribute::optional_string().with_description("Endpoint documents arrive on"),
        )
        .with_attribute(
            "receiving_ack_endpoint_id",
            Attribute::optional_string().with_description("Endpoint acknowledgements are sent to"),
        )
        .with_attribute(
            "target_endpoint_id",
            Attribute::optional_string().with_description("Endpoint documents are delivered to"),
        )
        .with_attribute("source_doc_type_id", Attribute::optional_string())
        .with_attribute("target_doc_type_id", Attribute::optional_string())
        .with_block("document_mapping", NestedBlock::optional_single(mapping));

    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the document flow"),
        )
        .with_attribute(
            "direction",
            Attribute::required_string()
                .with_description("Direction of the flow. Only inbound is supported.")
                .one_of(&["inbound"]),
        )
        .with_attribute(
            "environment_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute(
            "partner_from_id",
            Attribute::required_string().with_description("Partner sending the documents"),
        )
        .with_attribute(
            "partner_to_id",
            Attribute::required_string().with_description("Partner receiving the documents"),
        )
        .with_block("config", NestedBlock::required_single(config))
}

#[async_trait]
impl Resource for DocumentFlowResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: FlowState = decode(planned)?;
        let env = planned.environment_id.as_str();

        let flow = DocumentFlow {
            name: Some(planned.name.clone()),
            direction: Some(planned.direction.to_ascii_uppercase()),
            partner_from_id: Some(planned.partner_from_id.clone()),
            partner_to_id: Some(planned.partner_to_id.clone()),
            ..Default::default()
        };
        let flow_id = api.create_document_flow(env, &flow).await?;
        info!(flow_id = %flow_id, env, "Created document flow");

        let mut created = api.get_document_flow(env, &flow_id).await?;
        let configuration = created
            .configurations
            .first_mut()
            .ok_or_else(empty_configuration)?;

        configuration.document_mapping = Vec::new();
        if let Some(block) = planned.config.first() {
            block.merge_into(configuration);
            if let Some(mapping) = block.document_mapping.first() {
                let reference = upload_mapping(api, env, &flow_id, mapping).await?;
                configuration.document_mapping = vec![reference];
            }
        }
        api.update_document_flow(env, &created).await?;

        encode(&read_state(api, env, &flow_id).await?)
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let state: FlowState = decode(state)?;
        let flow_id = require_id(&state.id, TYPE_NAME)?;
        encode(&read_state(api, &state.environment_id, flow_id).await?)
    }

    /// The configuration is replaced as a whole; the server's id, version
    /// and status are kept.
    async fn update(
        &self,
        api: &dyn B2bApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: FlowState = decode(prior)?;
        let planned: FlowState = decode(planned)?;
        let flow_id = require_id(&prior.id, TYPE_NAME)?;
        let env = planned.environment_id.as_str();

        let current = api.get_document_flow(env, flow_id).await?;
        let current_config = current
            .configurations
            .first()
            .ok_or_else(empty_configuration)?;
        let block = planned.config.first().cloned().unwrap_or_default();

        let document_mapping = match block.document_mapping.first() {
            None => Vec::new(),
            Some(wanted) => {
                let unchanged = prior
                    .config
                    .first()
                    .and_then(|c| c.document_mapping.first())
                    .is_some_and(|p| p.same_file(wanted));
                match current_config.document_mapping.first() {
                    Some(existing) if unchanged && existing.id.is_some() => {
                        vec![existing.reference()]
                    },
                    _ => vec![upload_mapping(api, env, flow_id, wanted).await?],
                }
            },
        };

        let configuration = DocumentFlowConfiguration {
            id: current_config.id.clone(),
            document_flow_id: Some(flow_id.to_string()),
            environment_id: Some(env.to_string()),
            status: current_config.status.clone(),
            version: current_config.version,
            preprocessing_endpoint_id: non_empty(block.preprocessing_endpoint_id.as_deref()),
            receiving_endpoint_id: non_empty(block.receiving_endpoint_id.as_deref()),
            receiving_ack_endpoint_id: non_empty(block.receiving_ack_endpoint_id.as_deref()),
            target_endpoint_id: non_empty(block.target_endpoint_id.as_deref()),
            source_doc_type_id: non_empty(block.source_doc_type_id.as_deref()),
            target_doc_type_id: non_empty(block.target_doc_type_id.as_deref()),
            document_mapping,
        };

        let flow = DocumentFlow {
            id: Some(flow_id.to_string()),
            name: Some(planned.name.clone()),
            direction: Some(planned.direction.to_ascii_uppercase()),
            partner_from_id: Some(planned.partner_from_id.clone()),
            partner_to_id: Some(planned.partner_to_id.clone()),
            configurations: vec![configuration],
        };
        api.update_document_flow(env, &flow).await?;

        encode(&read_state(api, env, flow_id).await?)
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: FlowState = decode(state)?;
        let flow_id = require_id(&state.id, TYPE_NAME)?;
        api.delete_document_flow(&state.environment_id, flow_id).await
    }
}
