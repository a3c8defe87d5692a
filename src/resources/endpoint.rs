//! `muleb2b_endpoint`: an HTTP or SFTP endpoint used by document flows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{decode, encode, non_empty, require_id, Resource};
use crate::api::models::{AuthMode, Endpoint, EndpointConfig, TlsContext};
use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};

const TYPE_NAME: &str = "muleb2b_endpoint";

const DEFAULT_RESPONSE_TIMEOUT: i64 = 15000;
const DEFAULT_CONNECTION_IDLE_TIMEOUT: i64 = 30000;
const DEFAULT_SIZE_CHECK_WAIT_TIME: i64 = 1000;
const DEFAULT_POLLING_FREQUENCY: i64 = 1000;

/// The `muleb2b_endpoint` resource.
pub struct EndpointResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct EndpointState {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    role: String,
    #[serde(rename = "type")]
    endpoint_type: String,
    partner_id: String,
    environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partner_certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    http_config: Vec<HttpConfigBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sftp_config: Vec<SftpConfigBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct HttpConfigBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_name: Option<String>,
    server_address: String,
    server_port: i64,
    path: String,
    protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection_idle_timeout: Option<i64>,
    auth_mode: Vec<AuthModeBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tls_context: Vec<TlsContextBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct SftpConfigBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_name: Option<String>,
    server_address: String,
    server_port: i64,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_check_wait_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    polling_frequency: Option<i64>,
    auth_mode: Vec<AuthModeBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AuthModeBlock {
    #[serde(rename = "type")]
    auth_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct TlsContextBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    need_certificate: Option<bool>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl AuthModeBlock {
    /// Check that the credentials required by the auth type are set.
    fn check(&self) -> Result<(), String> {
        let ok = match self.auth_type.as_str() {
            "none" => true,
            "basic" => present(&self.username) && present(&self.password),
            "api_key" => present(&self.api_key) && present(&self.http_header_name),
            "client_credentials" => {
                present(&self.client_id)
                    && present(&self.client_secret)
                    && present(&self.client_id_header)
                    && present(&self.client_secret_header)
            },
            "oauth_token" => {
                present(&self.token_url) && present(&self.client_id) && present(&self.client_secret)
            },
            _ => return Err("invalid auth_mode.type specified".to_string()),
        };
        if ok {
            return Ok(());
        }
        Err(match self.auth_type.as_str() {
            "basic" => "username and password are required when auth_mode.type is basic",
            "api_key" => "api_key and http_header_name are required when auth_mode.type is api_key",
            "client_credentials" => {
                "client_id, client_secret, client_id_header, and client_secret_header are required when auth_mode.type is client_credentials"
            },
            _ => "token_url, client_id, and client_secret are required when auth_mode.type is oauth_token",
        }
        .to_string())
    }

    /// The wire record carrying only the fields of the configured auth type.
    fn to_record(&self) -> AuthMode {
        let mut record = AuthMode {
            auth_type: Some(self.auth_type.to_ascii_uppercase()),
            ..Default::default()
        };
        match self.auth_type.as_str() {
            "basic" => {
                record.username = self.username.clone();
                record.password = self.password.clone();
            },
            "api_key" => {
                record.api_key = self.api_key.clone();
                record.http_header_name = self.http_header_name.clone();
            },
            "client_credentials" => {
                record.client_id = self.client_id.clone();
                record.client_secret = self.client_secret.clone();
                record.client_id_header = self.client_id_header.clone();
                record.client_secret_header = self.client_secret_header.clone();
            },
            "oauth_token" => {
                record.token_url = self.token_url.clone();
                record.client_id = self.client_id.clone();
                record.client_secret = self.client_secret.clone();
            },
            _ => {},
        }
        record
    }

    fn from_record(record: &AuthMode) -> Self {
        Self {
            auth_type: record
                .auth_type
                .as_deref()
                .unwrap_or("none")
                .to_ascii_lowercase(),
            username: non_empty(record.username.as_deref()),
            password: non_empty(record.password.as_deref()),
            http_header_name: non_empty(record.http_header_name.as_deref()),
            api_key: non_empty(record.api_key.as_deref()),
            client_id: non_empty(record.client_id.as_deref()),
            client_secret: non_empty(record.client_secret.as_deref()),
            client_id_header: non_empty(record.client_id_header.as_deref()),
            client_secret_header: non_empty(record.client_secret_header.as_deref()),
            token_url: non_empty(record.token_url.as_deref()),
        }
    }

    /// Fill secrets the server does not echo back from `prior`.
    fn restore_secrets(&mut self, prior: &AuthModeBlock) {
        if self.auth_type != prior.auth_type {
            return;
        }
        for (current, previous) in [
            (&mut self.password, &prior.password),
            (&mut self.api_key, &prior.api_key),
            (&mut self.client_secret, &prior.client_secret),
        ] {
            if current.is_none() {
                current.clone_from(previous);
            }
        }
    }
}

impl TlsContextBlock {
    fn to_record(&self) -> TlsContext {
        TlsContext {
            insecure: Some(self.insecure.unwrap_or(false)),
            need_certificate: Some(self.need_certificate.unwrap_or(false)),
        }
    }
}

fn check_auth(auth_mode: &[AuthModeBlock], block: &str) -> Result<AuthMode, String> {
    let auth = auth_mode
        .first()
        .ok_or_else(|| format!("auth_mode is required in {}", block))?;
    auth.check()?;
    Ok(auth.to_record())
}

impl HttpConfigBlock {
    fn check(&self) -> Result<(), String> {
        check_auth(&self.auth_mode, "http_config")?;
        if self.protocol.eq_ignore_ascii_case("https") && self.tls_context.is_empty() {
            return Err("tls_context is required when protocol is https".to_string());
        }
        Ok(())
    }

    /// Overlay this block onto `config`; unset optional fields keep their value.
    fn merge_into(&self, config: &mut EndpointConfig) -> Result<(), ProviderError> {
        self.check().map_err(ProviderError::Validation)?;
        config.config_name = self
            .config_name
            .clone()
            .or_else(|| config.config_name.take())
            .or_else(|| Some("http".to_string()));
        config.server_address = Some(self.server_address.clone());
        config.server_port = Some(self.server_port);
        config.path = Some(self.path.clone());
        config.protocol = Some(self.protocol.to_ascii_uppercase());
        config.response_timeout = self
            .response_timeout
            .or(config.response_timeout)
            .or(Some(DEFAULT_RESPONSE_TIMEOUT));
        config.connection_idle_timeout = self
            .connection_idle_timeout
            .or(config.connection_idle_timeout)
            .or(Some(DEFAULT_CONNECTION_IDLE_TIMEOUT));
        config.auth_mode = self.auth_mode.first().map(AuthModeBlock::to_record);
        if let Some(tls) = self.tls_context.first() {
            config.tls_context = Some(tls.to_record());
        }
        Ok(())
    }

    fn from_record(config: &EndpointConfig) -> Self {
        let protocol = config
            .protocol
            .as_deref()
            .unwrap_or("http")
            .to_ascii_lowercase();
        let tls_context = match (&config.tls_context, protocol.as_str()) {
            (Some(tls), "https") => vec![TlsContextBlock {
                insecure: tls.insecure,
                need_certificate: tls.need_certificate,
            }],
            _ => Vec::new(),
        };
        Self {
            config_name: config.config_name.clone(),
            server_address: config.server_address.clone().unwrap_or_default(),
            server_port: config.server_port.unwrap_or_default(),
            path: config.path.clone().unwrap_or_default(),
            protocol,
            response_timeout: config.response_timeout,
            connection_idle_timeout: config.connection_idle_timeout,
            auth_mode: config.auth_mode.iter().map(AuthModeBlock::from_record).collect(),
            tls_context,
        }
    }
}

impl SftpConfigBlock {
    fn check(&self) -> Result<(), String> {
        check_auth(&self.auth_mode, "sftp_config").map(|_| ())
    }

    fn merge_into(&self, config: &mut EndpointConfig) -> Result<(), ProviderError> {
        self.check().map_err(ProviderError::Validation)?;
        config.config_name = self
            .config_name
            .clone()
            .or_else(|| config.config_name.take())
            .or_else(|| Some("sftp".to_string()));
        config.server_address = Some(self.server_address.clone());
        config.server_port = Some(self.server_port);
        config.path = Some(self.path.clone());
        if let Some(archive) = non_empty(self.archive_path.as_deref()) {
            config.moved_path = Some(archive);
        }
        config.size_check_wait_time = self
            .size_check_wait_time
            .or(config.size_check_wait_time)
            .or(Some(DEFAULT_SIZE_CHECK_WAIT_TIME));
        config.polling_frequency = self
            .polling_frequency
            .or(config.polling_frequency)
            .or(Some(DEFAULT_POLLING_FREQUENCY));
        config.auth_mode = self.auth_mode.first().map(AuthModeBlock::to_record);
        Ok(())
    }

    fn from_record(config: &EndpointConfig) -> Self {
        Self {
            config_name: config.config_name.clone(),
            server_address: config.server_address.clone().unwrap_or_default(),
            server_port: config.server_port.unwrap_or_default(),
            path: config.path.clone().unwrap_or_default(),
            archive_path: non_empty(config.moved_path.as_deref()),
            size_check_wait_time: config.size_check_wait_time,
            polling_frequency: config.polling_frequency,
            auth_mode: config.auth_mode.iter().map(AuthModeBlock::from_record).collect(),
        }
    }
}

impl EndpointState {
    /// The transport block matching `type`, or the error naming what is missing.
    fn check(&self) -> Result<(), (String, String)> {
        match self.endpoint_type.as_str() {
            "http" => {
                let block = self.http_config.first().ok_or_else(|| {
                    (
                        "http_config".to_string(),
                        "http_config is required when type is http".to_string(),
                    )
                })?;
                block.check().map_err(|e| ("http_config".to_string(), e))
            },
            "sftp" => {
                let block = self.sftp_config.first().ok_or_else(|| {
                    (
                        "sftp_config".to_string(),
                        "sftp_config is required when type is sftp".to_string(),
                    )
                })?;
                block.check().map_err(|e| ("sftp_config".to_string(), e))
            },
            other => Err((
                "type".to_string(),
                format!("unsupported endpoint type: {}", other),
            )),
        }
    }

    /// Overlay the configured transport block onto `config`.
    fn merge_config(&self, config: &mut EndpointConfig) -> Result<(), ProviderError> {
        self.check().map_err(|(_, msg)| ProviderError::Validation(msg))?;
        match (self.http_config.first(), self.sftp_config.first()) {
            (Some(http), _) if self.endpoint_type == "http" => http.merge_into(config),
            (_, Some(sftp)) => sftp.merge_into(config),
            _ => Ok(()),
        }
    }

    fn to_record(&self) -> Endpoint {
        Endpoint {
            id: self.id.clone(),
            name: Some(self.name.clone()),
            endpoint_role: Some(self.role.to_ascii_uppercase()),
            endpoint_type: Some(self.endpoint_type.clone()),
            environment_id: Some(self.environment_id.clone()),
            partner_id: Some(self.partner_id.clone()),
            description: Some(self.description.clone().unwrap_or_default()),
            partner_certificate_id: non_empty(self.partner_certificate_id.as_deref()),
            config: None,
        }
    }

    fn from_record(endpoint: Endpoint, env: &str) -> Self {
        let endpoint_type = endpoint
            .endpoint_type
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config = endpoint.config.unwrap_or_default();
        let (http_config, sftp_config) = match endpoint_type.as_str() {
            "http" => (vec![HttpConfigBlock::from_record(&config)], Vec::new()),
            "sftp" => (Vec::new(), vec![SftpConfigBlock::from_record(&config)]),
            _ => (Vec::new(), Vec::new()),
        };
        Self {
            id: endpoint.id,
            name: endpoint.name.unwrap_or_default(),
            role: endpoint
                .endpoint_role
                .unwrap_or_default()
                .to_ascii_lowercase(),
            endpoint_type,
            partner_id: endpoint.partner_id.unwrap_or_default(),
            environment_id: endpoint.environment_id.unwrap_or_else(|| env.to_string()),
            description: endpoint.description,
            partner_certificate_id: non_empty(endpoint.partner_certificate_id.as_deref()),
            http_config,
            sftp_config,
        }
    }

    fn auth_mut(&mut self) -> Option<&mut AuthModeBlock> {
        if let Some(block) = self.http_config.first_mut() {
            return block.auth_mode.first_mut();
        }
        self.sftp_config
            .first_mut()
            .and_then(|b| b.auth_mode.first_mut())
    }

    fn auth(&self) -> Option<&AuthModeBlock> {
        self.http_config
            .first()
            .and_then(|b| b.auth_mode.first())
            .or_else(|| self.sftp_config.first().and_then(|b| b.auth_mode.first()))
    }
}

async fn read_state(
    api: &dyn B2bApi,
    env: &str,
    endpoint_id: &str,
    known: &EndpointState,
) -> Result<EndpointState, ProviderError> {
    let endpoint = api.get_endpoint(env, endpoint_id).await?;
    let mut state = EndpointState::from_record(endpoint, env);
    if state.id.is_none() {
        state.id = Some(endpoint_id.to_string());
    }
    if let (Some(auth), Some(prior)) = (state.auth_mut(), known.auth()) {
        auth.restore_secrets(prior);
    }
    Ok(state)
}

fn auth_mode_block() -> NestedBlock {
    NestedBlock::required_single(
        Block::new()
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description("Authentication type")
                    .one_of(&["none", "basic", "api_key", "client_credentials", "oauth_token"]),
            )
            .with_attribute("username", Attribute::optional_string())
            .with_attribute("password", Attribute::optional_string().sensitive())
            .with_attribute("http_header_name", Attribute::optional_string())
            .with_attribute("api_key", Attribute::optional_string().sensitive())
            .with_attribute("client_id", Attribute::optional_string())
            .with_attribute("client_secret", Attribute::optional_string().sensitive())
            .with_attribute("client_id_header", Attribute::optional_string())
            .with_attribute("client_secret_header", Attribute::optional_string())
            .with_attribute("token_url", Attribute::optional_string()),
    )
}

fn schema() -> Schema {
    let tls_context = Block::new()
        .with_attribute(
            "insecure",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_attribute(
            "need_certificate",
            Attribute::optional_bool().with_default(json!(false)),
        );

    let http = Block::new()
        .with_attribute(
            "config_name",
            Attribute::optional_string().with_default(json!("http")),
        )
        .with_attribute("server_address", Attribute::required_string())
        .with_attribute("server_port", Attribute::required_int64())
        .with_attribute("path", Attribute::required_string())
        .with_attribute(
            "protocol",
            Attribute::required_string().one_of(&["http", "https"]),
        )
        .with_attribute(
            "response_timeout",
            Attribute::optional_int64().with_default(json!(DEFAULT_RESPONSE_TIMEOUT)),
        )
        .with_attribute(
            "connection_idle_timeout",
            Attribute::optional_int64().with_default(json!(DEFAULT_CONNECTION_IDLE_TIMEOUT)),
        )
        .with_block("auth_mode", auth_mode_block())
        .with_block("tls_context", NestedBlock::optional_single(tls_context));

    let sftp = Block::new()
        .with_attribute(
            "config_name",
            Attribute::optional_string().with_default(json!("sftp")),
        )
        .with_attribute("server_address", Attribute::required_string())
        .with_attribute("server_port", Attribute::required_int64())
        .with_attribute("path", Attribute::required_string())
        .with_attribute(
            "archive_path",
            Attribute::optional_string().with_description("Directory processed files are moved to"),
        )
        .with_attribute(
            "size_check_wait_time",
            Attribute::optional_int64().with_default(json!(DEFAULT_SIZE_CHECK_WAIT_TIME)),
        )
        .with_attribute(
            "polling_frequency",
            Attribute::optional_int64().with_default(json!(DEFAULT_POLLING_FREQUENCY)),
        )
        .with_block("auth_mode", auth_mode_block());

    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the endpoint"),
        )
        .with_attribute(
            "role",
            Attribute::required_string()
                .with_description("Endpoint role")
                .one_of(&["send", "receive", "receive_ack", "storage_api"]),
        )
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("Transport type")
                .one_of(&["http", "sftp"]),
        )
        .with_attribute(
            "partner_id",
            Attribute::required_string().with_description("ID of the partner owning the endpoint"),
        )
        .with_attribute(
            "environment_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute("description", Attribute::optional_computed_string())
        .with_attribute("partner_certificate_id", Attribute::optional_string())
        .with_block("http_config", NestedBlock::optional_single(http))
        .with_block("sftp_config", NestedBlock::optional_single(sftp))
}

#[async_trait]
impl Resource for EndpointResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let Ok(state) = decode::<EndpointState>(config.clone()) else {
            return Vec::new();
        };
        match state.check() {
            Ok(()) => Vec::new(),
            Err((attribute, message)) => {
                vec![Diagnostic::error(message).with_attribute(attribute)]
            },
        }
    }

    async fn create(&self, api: &dyn B2bApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: EndpointState = decode(planned)?;
        let env = planned.environment_id.as_str();

        let mut config = EndpointConfig::default();
        planned.merge_config(&mut config)?;
        let mut endpoint = planned.to_record();
        endpoint.id = None;
        endpoint.config = Some(config);

        let endpoint_id = api.create_endpoint(env, &endpoint).await?;
        debug!(endpoint_id = %endpoint_id, "Created endpoint");
        encode(&read_state(api, env, &endpoint_id, &planned).await?)
    }

    async fn read(&self, api: &dyn B2bApi, state: Value) -> Result<Value, ProviderError> {
        let state: EndpointState = decode(state)?;
        let endpoint_id = require_id(&state.id, TYPE_NAME)?;
        encode(&read_state(api, &state.environment_id, endpoint_id, &state).await?)
    }

    async fn update(
        &self,
        api: &dyn B2bApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: EndpointState = decode(prior)?;
        let planned: EndpointState = decode(planned)?;
        let endpoint_id = require_id(&prior.id, TYPE_NAME)?;
        let env = planned.environment_id.as_str();

        let current = api.get_endpoint(env, endpoint_id).await?;
        let mut config = if current.endpoint_type.as_deref() == Some(planned.endpoint_type.as_str())
        {
            current.config.unwrap_or_default()
        } else {
            EndpointConfig::default()
        };
        planned.merge_config(&mut config)?;

        let mut endpoint = planned.to_record();
        endpoint.id = Some(endpoint_id.to_string());
        endpoint.config = Some(config);
        api.update_endpoint(env, &endpoint).await?;

        encode(&read_state(api, env, endpoint_id, &planned).await?)
    }

    async fn delete(&self, api: &dyn B2bApi, state: Value) -> Result<(), ProviderError> {
        let state: EndpointState = decode(state)?;
        let endpoint_id = require_id(&state.id, TYPE_NAME)?;
        api.delete_endpoint(&state.environment_id, endpoint_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryB2bApi;

    const ENV: &str = "env-1";

    fn http_config() -> Value {
        json!({
            "name": "acme-as2",
            "role": "receive",
            "type": "http",
            "partner_id": "p-1",
            "environment_id": ENV,
            "http_config": [{
                "server_address": "b2b.acme.test",
                "server_port": 443,
                "path": "/inbound",
                "protocol": "https",
                "auth_mode": [{"type": "basic", "username": "acme", "password": "s3cret"}],
                "tls_context": [{"insecure": false, "need_certificate": true}]
            }]
        })
    }

    #[test]
    fn test_validate_requires_matching_block() {
        let config = json!({
            "name": "x", "role": "send", "type": "sftp",
            "partner_id": "p-1", "environment_id": ENV,
            "http_config": http_config()["http_config"].clone()
        });
        let diagnostics = EndpointResource.validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            "sftp_config is required when type is sftp"
        );
    }

    #[test]
    fn test_validate_https_requires_tls() {
        let mut config = http_config();
        config["http_config"][0]
            .as_object_mut()
            .unwrap()
            .remove("tls_context");
        let diagnostics = EndpointResource.validate(&config);
        assert_eq!(
            diagnostics[0].summary,
            "tls_context is required when protocol is https"
        );
    }

    #[test]
    fn test_auth_mode_credentials() {
        let auth = |value: Value| -> AuthModeBlock { decode(value).unwrap() };

        assert!(auth(json!({"type": "none"})).check().is_ok());
        assert_eq!(
            auth(json!({"type": "api_key", "api_key": "k"})).check().unwrap_err(),
            "api_key and http_header_name are required when auth_mode.type is api_key"
        );
        assert_eq!(
            auth(json!({"type": "oauth_token", "client_id": "c", "client_secret": "s"}))
                .check()
                .unwrap_err(),
            "token_url, client_id, and client_secret are required when auth_mode.type is oauth_token"
        );
        assert!(auth(json!({
            "type": "client_credentials",
            "client_id": "c", "client_secret": "s",
            "client_id_header": "X-Id", "client_secret_header": "X-Secret"
        }))
        .check()
        .is_ok());
    }

    #[test]
    fn test_auth_record_carries_only_type_fields() {
        let block: AuthModeBlock = decode(json!({
            "type": "basic", "username": "u", "password": "p", "api_key": "stray"
        }))
        .unwrap();
        let record = block.to_record();
        assert_eq!(record.auth_type.as_deref(), Some("BASIC"));
        assert_eq!(record.password.as_deref(), Some("p"));
        assert!(record.api_key.is_none());
    }

    #[test]
    fn test_sftp_archive_path_maps_to_moved_path() {
        let block: SftpConfigBlock = decode(json!({
            "server_address": "sftp.acme.test",
            "server_port": 22,
            "path": "/in",
            "archive_path": "/archive",
            "auth_mode": [{"type": "none"}]
        }))
        .unwrap();
        let mut config = EndpointConfig::default();
        block.merge_into(&mut config).unwrap();

        assert_eq!(config.moved_path.as_deref(), Some("/archive"));
        assert_eq!(config.config_name.as_deref(), Some("sftp"));
        assert_eq!(config.polling_frequency, Some(DEFAULT_POLLING_FREQUENCY));
        assert_eq!(SftpConfigBlock::from_record(&config).archive_path.as_deref(), Some("/archive"));
    }

    #[tokio::test]
    async fn test_create_sends_upper_case_and_keeps_password() {
        let api = InMemoryB2bApi::new();
        let state = EndpointResource.create(&api, http_config()).await.unwrap();

        let endpoint_id = state["id"].as_str().unwrap();
        let stored = api.get_endpoint(ENV, endpoint_id).await.unwrap();
        assert_eq!(stored.endpoint_role.as_deref(), Some("RECEIVE"));
        let config = stored.config.unwrap();
        assert_eq!(config.protocol.as_deref(), Some("HTTPS"));
        assert_eq!(config.response_timeout, Some(DEFAULT_RESPONSE_TIMEOUT));

        // the fake withholds secrets on reads, like the real API
        assert_eq!(state["role"], json!("receive"));
        assert_eq!(state["http_config"][0]["protocol"], json!("https"));
        assert_eq!(
            state["http_config"][0]["auth_mode"][0]["password"],
            json!("s3cret")
        );
    }

    #[tokio::test]
    async fn test_update_merges_onto_current_config() {
        let api = InMemoryB2bApi::new();
        let prior = EndpointResource.create(&api, http_config()).await.unwrap();

        let mut planned = prior.clone();
        planned["http_config"][0]["path"] = json!("/v2/inbound");
        planned["http_config"][0]
            .as_object_mut()
            .unwrap()
            .remove("response_timeout");

        let state = EndpointResource.update(&api, prior, planned).await.unwrap();
        assert_eq!(state["http_config"][0]["path"], json!("/v2/inbound"));
        assert_eq!(
            state["http_config"][0]["response_timeout"],
            json!(DEFAULT_RESPONSE_TIMEOUT)
        );
        assert_eq!(api.calls_to("update_endpoint").len(), 1);
    }
}
