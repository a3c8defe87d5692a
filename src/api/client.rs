//! reqwest-backed implementation of [`B2bApi`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::models::{
    Address, Certificate, Contact, Created, Document, DocumentFlow, EdiDocumentType, EdiFormat,
    EdiFormatVersion, Endpoint, Environment, Identifier, IdentifierType, LoginRequest,
    LoginResponse, Mapping, Partner, X12Config,
};
use super::{ApiResult, B2bApi};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

#[derive(Deserialize)]
struct EnvironmentList {
    data: Vec<Environment>,
}

/// HTTP client for the partner manager API.
///
/// Call [`HttpB2bClient::login`] once before issuing requests; the bearer
/// token is reused for the lifetime of the client.
pub struct HttpB2bClient {
    http: reqwest::Client,
    base_url: String,
    organization_id: String,
    token: RwLock<Option<String>>,
}

impl std::fmt::Debug for HttpB2bClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpB2bClient")
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .finish_non_exhaustive()
    }
}

impl HttpB2bClient {
    /// Create a client for the platform and organization in `config`.
    pub fn new(config: &ProviderConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("muleb2b-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            organization_id: config.organization_id.clone(),
            token: RwLock::new(None),
        })
    }

    /// Exchange user credentials for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<()> {
        let url = format!("{}accounts/login", self.base_url);
        debug!(%url, username, "POST login");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let login: LoginResponse = Self::parse(response).await?;

        *self.token.write().await = Some(login.access_token);
        info!(organization_id = %self.organization_id, "Logged in to Anypoint platform");
        Ok(())
    }

    fn org_url(&self, path: &str) -> String {
        format!(
            "{}accounts/api/organizations/{}/{}",
            self.base_url, self.organization_id, path
        )
    }

    fn env_url(&self, env: &str, path: &str) -> String {
        format!(
            "{}partnermanager/partners/api/v1/organizations/{}/environments/{}/{}",
            self.base_url, self.organization_id, env, path
        )
    }

    async fn request(&self, method: Method, url: &str) -> ApiResult<RequestBuilder> {
        let token = self.token.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("the API client has not logged in".to_string())
        })?;
        debug!(%method, %url, "API request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn check(response: reqwest::Response) -> ApiResult<String> {
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, "API response");

        if !status.is_success() {
            error!(%status, body = %body, "API error");
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let body = Self::check(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %body, "Failed to parse API response");
            ProviderError::Serialization(e)
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self.request(Method::GET, url).await?.send().await?;
        Self::parse(response).await
    }

    async fn create<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> ApiResult<String> {
        let response = self
            .request(Method::POST, url)
            .await?
            .json(body)
            .send()
            .await?;
        let created: Created = Self::parse(response).await?;
        Ok(created.id)
    }

    async fn send_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> ApiResult<()> {
        let response = self.request(method, url).await?.json(body).send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete(&self, url: &str) -> ApiResult<()> {
        let response = self.request(Method::DELETE, url).await?.send().await?;
        Self::check(response).await.map(|_| ())
    }

    /// GET that maps a 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> ApiResult<Option<T>> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn require_id<'a>(id: &'a Option<String>, what: &str) -> ApiResult<&'a str> {
    id.as_deref()
        .ok_or_else(|| ProviderError::Validation(format!("{} has no id", what)))
}

#[async_trait]
impl B2bApi for HttpB2bClient {
    async fn list_environments(&self) -> ApiResult<Vec<Environment>> {
        let list: EnvironmentList = self.get(&self.org_url("environments")).await?;
        Ok(list.data)
    }

    async fn list_partners(&self, env: &str) -> ApiResult<Vec<Partner>> {
        self.get(&self.env_url(env, "partners")).await
    }

    async fn create_partner(&self, env: &str, partner: &Partner) -> ApiResult<String> {
        self.create(&self.env_url(env, "partners"), partner).await
    }

    async fn get_partner(&self, env: &str, partner_id: &str) -> ApiResult<Partner> {
        self.get(&self.env_url(env, &format!("partners/{}", partner_id)))
            .await
    }

    async fn update_partner(&self, env: &str, partner: &Partner) -> ApiResult<()> {
        let id = require_id(&partner.id, "partner")?;
        let url = self.env_url(env, &format!("partners/{}", id));
        self.send_body(Method::PUT, &url, partner).await
    }

    async fn delete_partner(&self, env: &str, partner_id: &str) -> ApiResult<()> {
        self.delete(&self.env_url(env, &format!("partners/{}", partner_id)))
            .await
    }

    async fn list_identifiers(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Identifier>> {
        self.get(&self.env_url(env, &format!("partners/{}/identifiers", partner_id)))
            .await
    }

    async fn get_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<Identifier> {
        let path = format!("partners/{}/identifiers/{}", partner_id, identifier_id);
        self.get(&self.env_url(env, &path)).await
    }

    async fn create_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier: &Identifier,
    ) -> ApiResult<()> {
        let url = self.env_url(env, &format!("partners/{}/identifiers", partner_id));
        self.send_body(Method::POST, &url, identifier).await
    }

    async fn delete_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<()> {
        let path = format!("partners/{}/identifiers/{}", partner_id, identifier_id);
        self.delete(&self.env_url(env, &path)).await
    }

    async fn list_contacts(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Contact>> {
        self.get(&self.env_url(env, &format!("partners/{}/contacts", partner_id)))
            .await
    }

    async fn create_contact(
        &self,
        env: &str,
        partner_id: &str,
        contact: &Contact,
    ) -> ApiResult<()> {
        let url = self.env_url(env, &format!("partners/{}/contacts", partner_id));
        self.send_body(Method::POST, &url, contact).await
    }

    async fn delete_contact(&self, env: &str, partner_id: &str, contact_id: &str) -> ApiResult<()> {
        let path = format!("partners/{}/contacts/{}", partner_id, contact_id);
        self.delete(&self.env_url(env, &path)).await
    }

    async fn update_contact(
        &self,
        env: &str,
        partner_id: &str,
        contact: &Contact,
    ) -> ApiResult<()> {
        let id = require_id(&contact.id, "contact")?;
        let path = format!("partners/{}/contacts/{}", partner_id, id);
        self.send_body(Method::PUT, &self.env_url(env, &path), contact)
            .await
    }

    async fn get_address(&self, env: &str, partner_id: &str) -> ApiResult<Option<Address>> {
        let addresses: Vec<Address> = self
            .get(&self.env_url(env, &format!("partners/{}/addresses", partner_id)))
            .await?;
        Ok(addresses.into_iter().next())
    }

    async fn put_address(&self, env: &str, partner_id: &str, address: &Address) -> ApiResult<()> {
        match &address.id {
            Some(id) => {
                let path = format!("partners/{}/addresses/{}", partner_id, id);
                self.send_body(Method::PUT, &self.env_url(env, &path), address)
                    .await
            },
            None => {
                let path = format!("partners/{}/addresses", partner_id);
                self.send_body(Method::POST, &self.env_url(env, &path), address)
                    .await
            },
        }
    }

    async fn get_x12_inbound(&self, env: &str, partner_id: &str) -> ApiResult<Option<X12Config>> {
        self.get_optional(&self.env_url(env, &format!("partners/{}/x12/inbound", partner_id)))
            .await
    }

    async fn create_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()> {
        let url = self.env_url(env, &format!("partners/{}/x12/inbound", partner_id));
        self.send_body(Method::POST, &url, config).await
    }

    async fn update_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()> {
        let url = self.env_url(env, &format!("partners/{}/x12/inbound", partner_id));
        self.send_body(Method::PUT, &url, config).await
    }

    async fn create_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<String> {
        self.create(&self.env_url(env, "endpoints"), endpoint).await
    }

    async fn get_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<Endpoint> {
        self.get(&self.env_url(env, &format!("endpoints/{}", endpoint_id)))
            .await
    }

    async fn update_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<()> {
        let id = require_id(&endpoint.id, "endpoint")?;
        let url = self.env_url(env, &format!("endpoints/{}", id));
        self.send_body(Method::PUT, &url, endpoint).await
    }

    async fn delete_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<()> {
        self.delete(&self.env_url(env, &format!("endpoints/{}", endpoint_id)))
            .await
    }

    async fn create_document(
        &self,
        env: &str,
        partner_id: &str,
        document: &Document,
    ) -> ApiResult<String> {
        let url = self.env_url(env, &format!("partners/{}/documents", partner_id));
        self.create(&url, document).await
    }

    async fn get_document(
        &self,
        env: &str,
        partner_id: &str,
        document_id: &str,
    ) -> ApiResult<Document> {
        let path = format!("partners/{}/documents/{}", partner_id, document_id);
        self.get(&self.env_url(env, &path)).await
    }

    async fn delete_document(
        &self,
        env: &str,
        partner_id: &str,
        document_id: &str,
    ) -> ApiResult<()> {
        let path = format!("partners/{}/documents/{}", partner_id, document_id);
        self.delete(&self.env_url(env, &path)).await
    }

    async fn create_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<String> {
        self.create(&self.env_url(env, "documentflows"), flow).await
    }

    async fn get_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<DocumentFlow> {
        self.get(&self.env_url(env, &format!("documentflows/{}", flow_id)))
            .await
    }

    async fn update_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<()> {
        let id = require_id(&flow.id, "document flow")?;
        let url = self.env_url(env, &format!("documentflows/{}", id));
        self.send_body(Method::PUT, &url, flow).await
    }

    async fn delete_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<()> {
        self.delete(&self.env_url(env, &format!("documentflows/{}", flow_id)))
            .await
    }

    async fn create_mapping(
        &self,
        env: &str,
        flow_id: &str,
        mapping: &Mapping,
    ) -> ApiResult<String> {
        let url = self.env_url(env, &format!("documentflows/{}/mappings", flow_id));
        self.create(&url, mapping).await
    }

    async fn get_mapping(&self, env: &str, flow_id: &str, mapping_id: &str) -> ApiResult<Mapping> {
        let path = format!("documentflows/{}/mappings/{}", flow_id, mapping_id);
        self.get(&self.env_url(env, &path)).await
    }

    async fn create_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate: &Certificate,
    ) -> ApiResult<String> {
        let url = self.env_url(env, &format!("partners/{}/certificates", partner_id));
        self.create(&url, certificate).await
    }

    async fn get_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<Certificate> {
        let path = format!("partners/{}/certificates/{}", partner_id, certificate_id);
        self.get(&self.env_url(env, &path)).await
    }

    async fn delete_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<()> {
        let path = format!("partners/{}/certificates/{}", partner_id, certificate_id);
        self.delete(&self.env_url(env, &path)).await
    }

    async fn list_identifier_types(&self, env: &str) -> ApiResult<Vec<IdentifierType>> {
        self.get(&self.env_url(env, "identifierTypes")).await
    }

    async fn list_edi_formats(&self, env: &str) -> ApiResult<Vec<EdiFormat>> {
        self.get(&self.env_url(env, "ediFormats")).await
    }

    async fn list_edi_format_versions(
        &self,
        env: &str,
        format_id: &str,
    ) -> ApiResult<Vec<EdiFormatVersion>> {
        self.get(&self.env_url(env, &format!("ediFormats/{}/versions", format_id)))
            .await
    }

    async fn list_edi_document_types(
        &self,
        env: &str,
        format_id: &str,
        version_id: &str,
    ) -> ApiResult<Vec<EdiDocumentType>> {
        let path = format!(
            "ediFormats/{}/versions/{}/documentTypes",
            format_id, version_id
        );
        self.get(&self.env_url(env, &path)).await
    }
}
