//! The remote partner manager API.
//!
//! [`B2bApi`] is the seam between resource logic and the network. Every call
//! names the environment it acts on, so a single client can serve concurrent
//! operations against different environments.

mod client;
#[allow(missing_docs)]
pub mod models;

pub use client::HttpB2bClient;

use async_trait::async_trait;

use crate::error::ProviderError;
use models::{
    Address, Certificate, Contact, Document, DocumentFlow, EdiDocumentType, EdiFormat,
    EdiFormatVersion, Endpoint, Environment, Identifier, IdentifierType, Mapping, Partner,
    X12Config,
};

/// Result type for remote calls.
pub type ApiResult<T> = Result<T, ProviderError>;

/// Operations of the partner manager API used by this provider.
///
/// Create calls return the id assigned by the server.
#[allow(missing_docs)]
#[async_trait]
pub trait B2bApi: Send + Sync {
    /// All environments of the configured organization.
    async fn list_environments(&self) -> ApiResult<Vec<Environment>>;

    // Partners

    async fn list_partners(&self, env: &str) -> ApiResult<Vec<Partner>>;
    async fn create_partner(&self, env: &str, partner: &Partner) -> ApiResult<String>;
    async fn get_partner(&self, env: &str, partner_id: &str) -> ApiResult<Partner>;
    async fn update_partner(&self, env: &str, partner: &Partner) -> ApiResult<()>;
    /// Deletes the partner together with its identifiers, contacts and configuration.
    async fn delete_partner(&self, env: &str, partner_id: &str) -> ApiResult<()>;

    // Identifiers

    async fn list_identifiers(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Identifier>>;
    async fn get_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<Identifier>;
    /// The API does not return the new identifier's id; look it up by natural key.
    async fn create_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier: &Identifier,
    ) -> ApiResult<()>;
    async fn delete_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<()>;

    // Contacts

    async fn list_contacts(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Contact>>;
    async fn create_contact(&self, env: &str, partner_id: &str, contact: &Contact)
        -> ApiResult<()>;
    async fn delete_contact(&self, env: &str, partner_id: &str, contact_id: &str)
        -> ApiResult<()>;
    /// Replace a contact in place; `contact.id` names the record.
    async fn update_contact(&self, env: &str, partner_id: &str, contact: &Contact)
        -> ApiResult<()>;

    // Address

    /// `None` when the partner never had an address.
    async fn get_address(&self, env: &str, partner_id: &str) -> ApiResult<Option<Address>>;
    /// Creates the address when `address.id` is unset, otherwise replaces it.
    async fn put_address(&self, env: &str, partner_id: &str, address: &Address) -> ApiResult<()>;

    // X12 inbound configuration

    /// `None` when the partner has no inbound X12 configuration yet.
    async fn get_x12_inbound(&self, env: &str, partner_id: &str) -> ApiResult<Option<X12Config>>;
    async fn create_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()>;
    async fn update_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()>;

    // Endpoints

    async fn create_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<String>;
    async fn get_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<Endpoint>;
    async fn update_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<()>;
    async fn delete_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<()>;

    // Documents

    async fn create_document(
        &self,
        env: &str,
        partner_id: &str,
        document: &Document,
    ) -> ApiResult<String>;
    async fn get_document(
        &self,
        env: &str,
        partner_id: &str,
        document_id: &str,
    ) -> ApiResult<Document>;
    async fn delete_document(&self, env: &str, partner_id: &str, document_id: &str)
        -> ApiResult<()>;

    // Document flows

    /// The server creates one empty configuration along with the flow.
    async fn create_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<String>;
    async fn get_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<DocumentFlow>;
    async fn update_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<()>;
    async fn delete_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<()>;
    async fn create_mapping(&self, env: &str, flow_id: &str, mapping: &Mapping)
        -> ApiResult<String>;
    async fn get_mapping(&self, env: &str, flow_id: &str, mapping_id: &str) -> ApiResult<Mapping>;

    // Certificates

    async fn create_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate: &Certificate,
    ) -> ApiResult<String>;
    async fn get_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<Certificate>;
    async fn delete_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<()>;

    // Lookups

    async fn list_identifier_types(&self, env: &str) -> ApiResult<Vec<IdentifierType>>;
    async fn list_edi_formats(&self, env: &str) -> ApiResult<Vec<EdiFormat>>;
    async fn list_edi_format_versions(
        &self,
        env: &str,
        format_id: &str,
    ) -> ApiResult<Vec<EdiFormatVersion>>;
    async fn list_edi_document_types(
        &self,
        env: &str,
        format_id: &str,
        version_id: &str,
    ) -> ApiResult<Vec<EdiDocumentType>>;
}
