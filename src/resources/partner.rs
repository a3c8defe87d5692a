//! `muleb2b_partner`: a trading partner with its identifiers, contacts,
//! address and X12 inbound configuration.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{decode, encode, non_empty, require_id, Resource};
use crate::api::models::{
    Address, CharacterSetAndEncoding, Contact, ContactType, ControlNumberSettings, Identifier,
    Partner, X12Config, X12ParserSettings,
};
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::reconcile::{
    ensure_unique, reconcile, ChildRecord, ContactCollection, IdentifierCollection,
};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};

const TYPE_NAME: &str = "muleb2b_partner";

/// Format type id of the X12 inbound configuration.
const X12_INBOUND_FORMAT_TYPE_ID: &str = "25c1bc8a-801f-4337-a2a6-7721ef971460";

const CONTACT_TYPES: [&str; 3] = ["business", "technical", "other"];

/// The `muleb2b_partner` resource.
pub struct PartnerResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct PartnerState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    website_url: Option<String>,
    identifier: Vec<IdentifierBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    x12_inbound_config: Vec<X12Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    contact: Vec<ContactBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    address: Vec<AddressBlock>,
}

impl PartnerState {
    fn identifier_records(&self) -> Vec<Identifier> {
        self.identifier.iter().map(IdentifierBlock::to_record).collect()
    }

    fn contact_records(&self) -> Vec<Contact> {
        self.contact.iter().map(ContactBlock::to_record).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct IdentifierBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    identifier_type_id: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl IdentifierBlock {
    fn to_record(&self) -> Identifier {
        Identifier {
            identifier_type_qualifier_id: Some(self.identifier_type_id.clone()),
            value: Some(self.value.clone()),
            ..Default::default()
        }
    }

    fn from_record(record: Identifier) -> Self {
        Self {
            id: record.id,
            identifier_type_id: record.identifier_type_qualifier_id.unwrap_or_default(),
            value: record.value.unwrap_or_default(),
            status: record.status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ContactBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(rename = "type")]
    contact_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl ContactBlock {
    fn to_record(&self) -> Contact {
        Contact {
            name: Some(self.name.clone()),
            email: Some(self.email.clone()),
            phone: non_empty(self.phone.as_deref()),
            contact_type: Some(ContactType {
                id: None,
                name: Some(contact_type_name(&self.contact_type).to_string()),
            }),
            ..Default::default()
        }
    }

    fn from_record(record: Contact) -> Self {
        let kind = record
            .contact_type
            .and_then(|t| t.name)
            .map(|n| n.to_ascii_lowercase())
            .filter(|n| CONTACT_TYPES.contains(&n.as_str()))
            .unwrap_or_else(|| "other".to_string());
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            email: record.email.unwrap_or_default(),
            phone: non_empty(record.phone.as_deref()),
            contact_type: kind,
            status: record.status,
        }
    }
}

/// Server name of a configured contact type.
fn contact_type_name(kind: &str) -> &'static str {
    match kind.to_ascii_lowercase().as_str() {
        "business" => "Business",
        "technical" => "Technical",
        _ => "Other",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AddressBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    address_line_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_line_2: Option<String>,
    city: String,
    state: String,
    country: String,
    postal_code: String,
}

impl AddressBlock {
    /// Write every field onto `address`; an absent second line is cleared.
    fn merge_into(&self, address: &mut Address) {
        address.addr1 = Some(self.address_line_1.clone());
        address.addr2 = Some(self.address_line_2.clone().unwrap_or_default());
        address.city = Some(self.city.clone());
        address.state = Some(self.state.clone());
        address.country = Some(self.country.clone());
        address.postal_code = Some(self.postal_code.clone());
    }

    fn from_record(record: Address) -> Self {
        Self {
            id: record.id,
            address_line_1: record.addr1.unwrap_or_default(),
            address_line_2: non_empty(record.addr2.as_deref()),
            city: record.city.unwrap_or_default(),
            state: record.state.unwrap_or_default(),
            country: record.country.unwrap_or_default(),
            postal_code: record.postal_code.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct X12Block {
    #[serde(skip_serializing_if = "Option::is_none")]
    character_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    character_set: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    acknowledgements: Vec<AcknowledgementsBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    validations: Vec<ValidationsBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    control_numbers: Vec<ControlNumbersBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AcknowledgementsBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_ta1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_acknowledgement_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ValidationsBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_when_value_length_outside_allowed_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_when_unused_segments_included: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_when_too_many_repeats_of_segment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_when_segments_out_of_order: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_when_invalid_character_in_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_if_value_repeated_too_many_times: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_if_unknown_segments_used: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ControlNumbersBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    require_unique_interchange_number: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    require_unique_group_number: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    require_unique_transaction_set_number: Option<bool>,
}

fn merge<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

impl X12Block {
    /// Overlay the fields present in this block onto `x12`.
    fn merge_into(&self, x12: &mut X12Config) {
        let charset = &mut x12.character_set_and_encoding;
        merge(&mut charset.character_encoding, &self.character_encoding);
        merge(&mut charset.character_set, &self.character_set);

        if let Some(ack) = self.acknowledgements.first() {
            ack.merge_into(&mut x12.parser_settings);
        }
        if let Some(validations) = self.validations.first() {
            validations.merge_into(&mut x12.parser_settings);
        }
        if let Some(numbers) = self.control_numbers.first() {
            numbers.merge_into(&mut x12.control_number_settings);
        }
    }

    fn from_config(x12: &X12Config) -> Self {
        Self {
            character_encoding: x12.character_set_and_encoding.character_encoding.clone(),
            character_set: x12.character_set_and_encoding.character_set.clone(),
            acknowledgements: vec![AcknowledgementsBlock::from_settings(&x12.parser_settings)],
            validations: vec![ValidationsBlock::from_settings(&x12.parser_settings)],
            control_numbers: vec![ControlNumbersBlock::from_settings(
                &x12.control_number_settings,
            )],
        }
    }
}

impl AcknowledgementsBlock {
    fn merge_into(&self, settings: &mut X12ParserSettings) {
        if let Some(endpoint) = non_empty(self.endpoint_id.as_deref()) {
            settings.ack_endpoint_id = Some(endpoint);
        }
        merge(&mut settings.generate_ta1, &self.generate_ta1);
        if let Some(kind) = self.failure_acknowledgement_type {
            let (require_997, generate_999) = match kind {
                997 => (true, false),
                999 => (false, true),
                _ => (false, false),
            };
            settings.require_997 = Some(require_997);
            settings.generate_999 = Some(generate_999);
        }
    }

    fn from_settings(settings: &X12ParserSettings) -> Self {
        let kind = if settings.generate_999 == Some(true) {
            999
        } else if settings.require_997 == Some(true) {
            997
        } else {
            0
        };
        Self {
            endpoint_id: non_empty(settings.ack_endpoint_id.as_deref()),
            generate_ta1: settings.generate_ta1,
            failure_acknowledgement_type: Some(kind),
        }
    }
}

impl ValidationsBlock {
    fn merge_into(&self, s: &mut X12ParserSettings) {
        merge(
            &mut s.fail_when_value_length_outside_allowed_range,
            &self.fail_when_value_length_outside_allowed_range,
        );
        merge(
            &mut s.fail_when_unused_segments_included,
            &self.fail_when_unused_segments_included,
        );
        merge(
            &mut s.fail_when_too_many_repeats_of_segment,
            &self.fail_when_too_many_repeats_of_segment,
        );
        merge(
            &mut s.fail_when_segments_out_of_order,
            &self.fail_when_segments_out_of_order,
        );
        merge(
            &mut s.fail_when_invalid_character_in_value,
            &self.fail_when_invalid_character_in_value,
        );
        merge(
            &mut s.fail_if_value_repeated_too_many_times,
            &self.fail_if_value_repeated_too_many_times,
        );
        merge(&mut s.fail_if_unknown_segments_used, &self.fail_if_unknown_segments_used);
    }

    fn from_settings(s: &X12ParserSettings) -> Self {
        Self {
            fail_when_value_length_outside_allowed_range: s
                .fail_when_value_length_outside_allowed_range,
            fail_when_unused_segments_included: s.fail_when_unused_segments_included,
            fail_when_too_many_repeats_of_segment: s.fail_when_too_many_repeats_of_segment,
            fail_when_segments_out_of_order: s.fail_when_segments_out_of_order,
            fail_when_invalid_character_in_value: s.fail_when_invalid_character_in_value,
            fail_if_value_repeated_too_many_times: s.fail_if_value_repeated_too_many_times,
            fail_if_unknown_segments_used: s.fail_if_unknown_segments_used,
        }
    }
}

impl ControlNumbersBlock {
    fn merge_into(&self, s: &mut ControlNumberSettings) {
        merge(&mut s.require_unique_isa13, &self.require_unique_interchange_number);
        merge(&mut s.require_unique_gs06, &self.require_unique_group_number);
        merge(&mut s.require_unique_st02, &self.require_unique_transaction_set_number);
    }

    fn from_settings(s: &ControlNumberSettings) -> Self {
        Self {
            require_unique_interchange_number: s.require_unique_isa13,
            require_unique_group_number: s.require_unique_gs06,
            require_unique_transaction_set_number: s.require_unique_st02,
        }
    }
}

/// The inbound X12 configuration a new partner starts from.
pub(crate) fn default_x12_template() -> X12Config {
    X12Config {
        id: None,
        partner_id: None,
        config_type: Some("READ".to_string()),
        format_type: Some("X12InboundConfig".to_string()),
        format_type_id: Some(X12_INBOUND_FORMAT_TYPE_ID.to_string()),
        parser_settings: X12ParserSettings {
            ack_endpoint_id: None,
            generate_ta1: Some(false),
            require_997: Some(false),
            generate_999: Some(false),
            fail_when_value_length_outside_allowed_range: Some(true),
            fail_when_unused_segments_included: Some(false),
            fail_when_too_many_repeats_of_segment: Some(true),
            fail_when_segments_out_of_order: Some(true),
            fail_when_invalid_character_in_value: Some(true),
            fail_if_value_repeated_too_many_times: Some(true),
            fail_if_unknown_segments_used: Some(false),
        },
        character_set_and_encoding: CharacterSetAndEncoding {
            character_set: Some("EXTENDED".to_string()),
            character_encoding: None,
            line_ending_between_segments: None,
        },
        control_number_settings: ControlNumberSettings {
            initial_interchange_control_number: Some("00".to_string()),
            initial_gs_control_number: Some("00".to_string()),
            initial_transaction_set_control_number: Some("00".to_string()),
            require_unique_isa13: Some(true),
            require_unique_gs06: Some(false),
            require_unique_st02: Some(false),
        },
        envelope_headers: Some(json!({})),
    }
}

fn keys_differ<T: ChildRecord>(a: &[T], b: &[T]) -> bool {
    let left: HashSet<T::Key> = a.iter().map(ChildRecord::natural_key).collect();
    let right: HashSet<T::Key> = b.iter().map(ChildRecord::natural_key).collect();
    left != right
}

/// Send contacts that kept their natural key but changed another field.
///
/// The reconciler only creates and deletes, so a phone edit would otherwise
/// never reach the server.
async fn update_edited_contacts(
    api: &dyn B2bApi,
    env: &str,
    partner_id: &str,
    prior: &[ContactBlock],
    planned: &[ContactBlock],
) -> Result<(), ProviderError> {
    let prior: Vec<Contact> = prior.iter().map(ContactBlock::to_record).collect();
    let edited: Vec<Contact> = planned
        .iter()
        .map(ContactBlock::to_record)
        .filter(|contact| {
            prior
                .iter()
                .any(|p| p.natural_key() == contact.natural_key() && p != contact)
        })
        .collect();
    if edited.is_empty() {
        return Ok(());
    }

    let server = api.list_contacts(env, partner_id).await?;
    for mut contact in edited {
        let current = server
            .iter()
            .find(|c| c.natural_key() == contact.natural_key())
            .ok_or_else(|| {
                ProviderError::Reconcile(format!(
                    "contact {:?} not found on partner ({})",
                    contact.natural_key(),
                    partner_id
                ))
            })?;
        contact.annotate(current);
        contact.default_status();
        debug!(partner_id, contact_id = ?contact.id, "Updating contact");
        api.update_contact(env, partner_id, &contact).await?;
    }
    Ok(())
}

async fn read_state(
    api: &dyn B2bApi,
    env: &str,
    partner_id: &str,
) -> Result<PartnerState, ProviderError> {
    let (partner, identifiers, x12, contacts, address) = tokio::try_join!(
        api.get_partner(env, partner_id),
        api.list_identifiers(env, partner_id),
        api.get_x12_inbound(env, partner_id),
        api.list_contacts(env, partner_id),
        api.get_address(env, partner_id),
    )?;

    Ok(PartnerState {
        id: Some(partner.id.unwrap_or_else(|| partner_id.to_string())),
        name: partner.name.unwrap_or_default(),
        environment_id: partner.environment_id.unwrap_or_else(|| env.to_string()),
        description: partner.description,
        website_url: partner.website_url,
        identifier: identifiers
            .into_iter()
            .map(IdentifierBlock::from_record)
            .collect(),
        x12_inbound_config: x12.iter().map(X12Block::from_config).collect(),
        contact: contacts.into_iter().map(ContactBlock::from_record).collect(),
        address: address
            .filter(|a| !a.is_empty())
            .map(AddressBlock::from_record)
            .into_iter()
            .collect(),
    })
}

fn schema() -> Schema {
    let identifier = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "identifier_type_id",
            Attribute::required_string().with_description("ID of the identifier type qualifier"),
        )
        .with_attribute(
            "value",
            Attribute::required_string().with_description("The identifier value"),
        )
        .with_attribute("status", Attribute::computed_string());

    // X12 fields left out of configuration keep the partner's server value.
    let acknowledgements = Block::new()
        .with_attribute("endpoint_id", Attribute::optional_computed_string())
        .with_attribute("generate_ta1", Attribute::optional_computed_bool())
        .with_attribute(
            "failure_acknowledgement_type",
            Attribute::optional_computed_int64()
                .with_description("Acknowledgement sent on failure: 0 (none), 997 or 999")
                .one_of_ints(&[0, 997, 999]),
        );

    let validations = [
        "fail_when_value_length_outside_allowed_range",
        "fail_when_unused_segments_included",
        "fail_when_too_many_repeats_of_segment",
        "fail_when_segments_out_of_order",
        "fail_when_invalid_character_in_value",
        "fail_if_value_repeated_too_many_times",
        "fail_if_unknown_segments_used",
    ]
    .iter()
    .fold(Block::new(), |block, name| {
        block.with_attribute(*name, Attribute::optional_computed_bool())
    });

    let control_numbers = Block::new()
        .with_attribute(
            "require_unique_interchange_number",
            Attribute::optional_computed_bool()
                .with_description("Require unique interchange control number (ISA13)"),
        )
        .with_attribute(
            "require_unique_group_number",
            Attribute::optional_computed_bool()
                .with_description("Require unique group control number (GS06)"),
        )
        .with_attribute(
            "require_unique_transaction_set_number",
            Attribute::optional_computed_bool()
                .with_description("Require unique transaction set control number (ST02)"),
        );

    let x12 = Block::new()
        .with_description("X12 inbound configuration")
        .with_attribute("character_encoding", Attribute::optional_computed_string())
        .with_attribute("character_set", Attribute::optional_computed_string())
        .with_block(
            "acknowledgements",
            NestedBlock::optional_single(acknowledgements).computed(),
        )
        .with_block("validations", NestedBlock::optional_single(validations).computed())
        .with_block(
            "control_numbers",
            NestedBlock::optional_single(control_numbers).computed(),
        );

    let contact = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("status", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Contact's full name"),
        )
        .with_attribute(
            "email",
            Attribute::required_string().with_description("Contact's email address"),
        )
        .with_attribute("phone", Attribute::optional_string())
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("Contact type")
                .one_of(&CONTACT_TYPES),
        );

    let address = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("address_line_1", Attribute::required_string())
        .with_attribute("address_line_2", Attribute::optional_string())
        .with_attribute("city", Attribute::required_string())
        .with_attribute("state", Attribute::required_string())
        .with_attribute("country", Attribute::required_string())
        .with_attribute("postal_code", Attribute::required_string());

    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_description("Name to give the partner")
                .with_force_new(),
        )
        .with_attribute(
            "environment_id",
            Attribute::required_string()
                .with_description("ID of the environment the partner will be created in")
                .with_force_new(),
        )
        .with_attribute(
            "description",
            Attribute::optional_computed_string().with_description("Description of the partner"),
        )
        .with_attribute(
            "website_url",
            Attribute::optional_computed_string().with_description("The partner's website"),
        )
        .with_block(
            "identifier",
            NestedBlock::set(identifier).with_min_items(1),
        )
        .with_block(
            "x12_inbound_config",
            NestedBlock::optional_single(x12).computed(),
        )
        .with_block("contact", NestedBlock::set(contact))
        .with_block("address", NestedBlock::optional_single(address))
}

#[async_trait]
impl Resource for PartnerResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let Ok(state) = decode::<PartnerState>(config.clone()) else {
            return Vec::new();
        };
        let mut diagnostics = Vec::new();
        if let Err(e) = ensure_unique(&state.identifier_records()) {
            diagnostics.push(Diagnostic::error(e.message()).with_attribute("identifier"));
        }
        if let Err(e) = ensure_unique(&state.contact_records()) {
            diagnostics.push(Diagnostic::error(e.message()).with_attribute("contact"));
        }
        diagnostics
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: PartnerState = decode(planned)?;
        let env = planned.environment_id.as_str();

        let partner = Partner {
            name: Some(planned.name.clone()),
            environment_id: Some(env.to_string()),
            description: planned.description.clone(),
            website_url: planned.website_url.clone(),
            ..Default::default()
        };
        let partner_id = api.create_partner(env, &partner).await?;
        info!(partner_id = %partner_id, env, "Created partner");

        reconcile(
            &IdentifierCollection::new(api, env, &partner_id),
            Vec::new(),
            planned.identifier_records(),
        )
        .await?;

        let mut x12 = default_x12_template();
        if let Some(block) = planned.x12_inbound_config.first() {
            block.merge_into(&mut x12);
        }
        x12.partner_id = Some(partner_id.clone());
        api.create_x12_inbound(env, &partner_id, &x12).await?;

        if !planned.contact.is_empty() {
            reconcile(
                &ContactCollection::new(api, env, &partner_id),
                Vec::new(),
                planned.contact_records(),
            )
            .await?;
        }

        if let Some(block) = planned.address.first() {
            let mut address = Address::default();
            block.merge_into(&mut address);
            api.put_address(env, &partner_id, &address).await?;
        }

        encode(&read_state(api, env, &partner_id).await?)
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let state: PartnerState = decode(state)?;
        let partner_id = require_id(&state.id, TYPE_NAME)?;
        encode(&read_state(api, &state.environment_id, partner_id).await?)
    }

    async fn update(
        &self,
        api: &dyn B2bApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: PartnerState = decode(prior)?;
        let planned: PartnerState = decode(planned)?;
        let partner_id = require_id(&prior.id, TYPE_NAME)?;
        let env = planned.environment_id.as_str();

        if prior.description != planned.description || prior.website_url != planned.website_url {
            debug!(partner_id, "Updating partner details");
            let partner = Partner {
                id: Some(partner_id.to_string()),
                name: Some(planned.name.clone()),
                environment_id: Some(env.to_string()),
                description: planned.description.clone(),
                website_url: planned.website_url.clone(),
                ..Default::default()
            };
            api.update_partner(env, &partner).await?;
        }

        let (old, new) = (prior.identifier_records(), planned.identifier_records());
        if keys_differ(&old, &new) {
            reconcile(&IdentifierCollection::new(api, env, partner_id), old, new).await?;
        }

        if let Some(block) = planned.x12_inbound_config.first() {
            if prior.x12_inbound_config.first() != Some(block) {
                debug!(partner_id, "Updating X12 inbound configuration");
                match api.get_x12_inbound(env, partner_id).await? {
                    Some(mut current) => {
                        block.merge_into(&mut current);
                        current.envelope_headers = Some(json!({}));
                        api.update_x12_inbound(env, partner_id, &current).await?;
                    },
                    None => {
                        let mut x12 = default_x12_template();
                        block.merge_into(&mut x12);
                        x12.partner_id = Some(partner_id.to_string());
                        api.create_x12_inbound(env, partner_id, &x12).await?;
                    },
                }
            }
        }

        let (old, new) = (prior.contact_records(), planned.contact_records());
        if keys_differ(&old, &new) {
            reconcile(&ContactCollection::new(api, env, partner_id), old, new).await?;
        }
        update_edited_contacts(api, env, partner_id, &prior.contact, &planned.contact).await?;

        match (prior.address.first(), planned.address.first()) {
            (prior_block, Some(block)) if prior_block != Some(block) => {
                let mut address = api.get_address(env, partner_id).await?.unwrap_or_default();
                block.merge_into(&mut address);
                api.put_address(env, partner_id, &address).await?;
            },
            (Some(_), None) => {
                debug!(partner_id, "Clearing partner address");
                let current = api.get_address(env, partner_id).await?;
                let cleared = Address::cleared(current.and_then(|a| a.id));
                api.put_address(env, partner_id, &cleared).await?;
            },
            _ => {},
        }

        encode(&read_state(api, env, partner_id).await?)
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: PartnerState = decode(state)?;
        let partner_id = require_id(&state.id, TYPE_NAME)?;
        api.delete_partner(&state.environment_id, partner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;
    use crate::validation::validate;

    const ENV: &str = "env-1";

    fn config() -> Value {
        json!({
            "name": "Acme",
            "environment_id": ENV,
            "description": "Acme Corp",
            "identifier": [
                {"identifier_type_id": "duns", "value": "123456789"},
                {"identifier_type_id": "as2", "value": "ACME"}
            ],
            "contact": [
                {"name": "Jane", "email": "jane@acme.test", "type": "business"}
            ],
            "address": [{
                "address_line_1": "1 Main St",
                "city": "Springfield",
                "state": "IL",
                "country": "US",
                "postal_code": "62701"
            }]
        })
    }

    #[test]
    fn test_schema_accepts_example_config() {
        assert!(validate(&schema(), &config()).is_empty());
    }

    #[test]
    fn test_schema_rejects_unknown_contact_type() {
        let mut config = config();
        config["contact"][0]["type"] = json!("billing");
        let diagnostics = validate(&schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("contact.0.type"));
    }

    #[test]
    fn test_validate_rejects_duplicate_identifiers() {
        let mut config = config();
        config["identifier"][1] = config["identifier"][0].clone();
        let diagnostics = PartnerResource.validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("identifier"));
    }

    #[test]
    fn test_failure_acknowledgement_type_sets_both_flags() {
        let mut settings = X12ParserSettings {
            require_997: Some(true),
            generate_999: Some(false),
            ..Default::default()
        };

        let ack = |kind| AcknowledgementsBlock {
            failure_acknowledgement_type: Some(kind),
            ..Default::default()
        };

        ack(999).merge_into(&mut settings);
        assert_eq!((settings.require_997, settings.generate_999), (Some(false), Some(true)));
        assert_eq!(
            AcknowledgementsBlock::from_settings(&settings).failure_acknowledgement_type,
            Some(999)
        );

        ack(0).merge_into(&mut settings);
        assert_eq!((settings.require_997, settings.generate_999), (Some(false), Some(false)));
        assert_eq!(
            AcknowledgementsBlock::from_settings(&settings).failure_acknowledgement_type,
            Some(0)
        );
    }

    #[test]
    fn test_x12_merge_only_touches_present_fields() {
        let mut x12 = default_x12_template();
        let block = X12Block {
            character_encoding: Some("UTF8".to_string()),
            validations: vec![ValidationsBlock {
                fail_when_unused_segments_included: Some(true),
                ..Default::default()
            }],
            ..Default::default()
        };
        block.merge_into(&mut x12);

        assert_eq!(
            x12.character_set_and_encoding.character_encoding.as_deref(),
            Some("UTF8")
        );
        assert_eq!(
            x12.character_set_and_encoding.character_set.as_deref(),
            Some("EXTENDED")
        );
        let parser = &x12.parser_settings;
        assert_eq!(parser.fail_when_unused_segments_included, Some(true));
        assert_eq!(parser.fail_if_unknown_segments_used, Some(false));
        assert_eq!(parser.fail_when_segments_out_of_order, Some(true));
    }

    #[test]
    fn test_contact_type_mapping() {
        assert_eq!(contact_type_name("technical"), "Technical");
        assert_eq!(contact_type_name("other"), "Other");

        let contact = ContactBlock::from_record(Contact {
            contact_type: Some(ContactType {
                id: Some("ct-9".into()),
                name: Some("Billing".into()),
            }),
            ..Default::default()
        });
        assert_eq!(contact.contact_type, "other");
    }

    #[tokio::test]
    async fn test_create_writes_children_and_reads_back() {
        let api = InMemoryB2bApi::new();
        let state = PartnerResource.create(&api, config()).await.unwrap();

        assert!(state["id"].is_string());
        assert_eq!(state["identifier"].as_array().unwrap().len(), 2);
        assert_eq!(state["identifier"][0]["status"], json!("ACTIVE"));
        assert_eq!(state["contact"][0]["type"], json!("business"));
        assert_eq!(state["address"][0]["city"], json!("Springfield"));

        let x12 = &state["x12_inbound_config"][0];
        assert_eq!(x12["character_set"], json!("EXTENDED"));
        assert_eq!(x12["acknowledgements"][0]["failure_acknowledgement_type"], json!(0));
        assert_eq!(
            x12["control_numbers"][0]["require_unique_interchange_number"],
            json!(true)
        );

        let partner_id = state["id"].as_str().unwrap();
        let stored = api.get_x12_inbound(ENV, partner_id).await.unwrap().unwrap();
        assert_eq!(stored.envelope_headers, Some(json!({})));
    }

    #[tokio::test]
    async fn test_update_reconciles_identifiers_only() {
        let api = InMemoryB2bApi::new();
        let prior = PartnerResource.create(&api, config()).await.unwrap();
        api.clear_calls();

        let mut planned = prior.clone();
        planned["identifier"] = json!([
            {"identifier_type_id": "duns", "value": "123456789"},
            {"identifier_type_id": "as2", "value": "ACME-2"}
        ]);

        let state = PartnerResource.update(&api, prior, planned).await.unwrap();
        let values: HashSet<&str> = state["identifier"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["value"].as_str().unwrap())
            .collect();
        assert_eq!(values, HashSet::from(["123456789", "ACME-2"]));

        assert_eq!(api.calls_to("delete_identifier").len(), 1);
        assert_eq!(api.calls_to("create_identifier").len(), 1);
        assert!(api.calls_to("update_partner").is_empty());
        assert!(api.calls_to("update_x12_inbound").is_empty());
        assert!(api.calls_to("put_address").is_empty());
        assert!(api.calls_to("create_contact").is_empty());
    }

    #[tokio::test]
    async fn test_update_x12_is_read_merge_write() {
        let api = InMemoryB2bApi::new();
        let prior = PartnerResource.create(&api, config()).await.unwrap();

        let mut planned = prior.clone();
        planned["x12_inbound_config"] = json!([{
            "acknowledgements": [{"generate_ta1": true, "failure_acknowledgement_type": 997}]
        }]);

        let state = PartnerResource.update(&api, prior, planned).await.unwrap();
        let ack = &state["x12_inbound_config"][0]["acknowledgements"][0];
        assert_eq!(ack["generate_ta1"], json!(true));
        assert_eq!(ack["failure_acknowledgement_type"], json!(997));
        assert_eq!(
            state["x12_inbound_config"][0]["validations"][0]["fail_when_segments_out_of_order"],
            json!(true)
        );
        assert_eq!(api.calls_to("update_x12_inbound").len(), 1);
    }

    #[tokio::test]
    async fn test_removing_address_writes_cleared_record() {
        let api = InMemoryB2bApi::new();
        let prior = PartnerResource.create(&api, config()).await.unwrap();
        let partner_id = prior["id"].as_str().unwrap().to_string();
        let address_id = api
            .get_address(ENV, &partner_id)
            .await
            .unwrap()
            .and_then(|a| a.id);

        let mut planned = prior.clone();
        planned.as_object_mut().unwrap().remove("address");

        let state = PartnerResource.update(&api, prior, planned).await.unwrap();
        assert!(state.get("address").is_none());

        let stored = api.get_address(ENV, &partner_id).await.unwrap().unwrap();
        assert!(stored.is_empty());
        assert_eq!(stored.id, address_id);
        assert!(api.calls_to("delete_address").is_empty());
    }

    #[tokio::test]
    async fn test_contact_phone_edit_updates_in_place() {
        let api = InMemoryB2bApi::new();
        let mut initial = config();
        initial["contact"][0]["phone"] = json!("111");
        let prior = PartnerResource.create(&api, initial).await.unwrap();
        let contact_id = prior["contact"][0]["id"].clone();
        api.clear_calls();

        let mut planned = prior.clone();
        planned["contact"] = json!([
            {"name": "Jane", "email": "jane@acme.test", "phone": "222", "type": "business"}
        ]);

        let state = PartnerResource.update(&api, prior, planned).await.unwrap();
        assert_eq!(state["contact"][0]["phone"], json!("222"));
        assert_eq!(state["contact"][0]["id"], contact_id);
        assert_eq!(api.calls_to("update_contact").len(), 1);
        assert!(api.calls_to("delete_contact").is_empty());
        assert!(api.calls_to("create_contact").is_empty());
    }

    #[tokio::test]
    async fn test_dropping_second_address_line_clears_it() {
        let api = InMemoryB2bApi::new();
        let mut initial = config();
        initial["address"][0]["address_line_2"] = json!("Suite 5");
        let prior = PartnerResource.create(&api, initial).await.unwrap();
        assert_eq!(prior["address"][0]["address_line_2"], json!("Suite 5"));
        let partner_id = prior["id"].as_str().unwrap().to_string();

        let mut planned = prior.clone();
        planned["address"][0]
            .as_object_mut()
            .unwrap()
            .remove("address_line_2");

        let state = PartnerResource.update(&api, prior, planned).await.unwrap();
        assert!(state["address"][0].get("address_line_2").is_none());
        assert_eq!(state["address"][0]["city"], json!("Springfield"));

        let stored = api.get_address(ENV, &partner_id).await.unwrap().unwrap();
        assert_eq!(stored.addr2.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_delete_removes_partner() {
        let api = InMemoryB2bApi::new();
        let state = PartnerResource.create(&api, config()).await.unwrap();
        let partner_id = state["id"].as_str().unwrap().to_string();

        PartnerResource.delete(&api, state).await.unwrap();
        let err = api.get_partner(ENV, &partner_id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
