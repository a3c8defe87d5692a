//! Plugin server: the `ProviderService` trait and the gRPC wrapper around it.
//!
//! The host spawns the provider binary, reads a single handshake line from
//! stdout and then speaks gRPC to the advertised address.
//!
//! # Signal Handling
//!
//! The server handles SIGTERM and SIGINT for graceful shutdown:
//! 1. Stops accepting new connections
//! 2. Waits for in-flight requests to complete (bounded by [`ServeOptions::shutdown_timeout`])
//! 3. Calls the provider's `stop()` method

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{PlanResult, HANDSHAKE_PREFIX, PROTOCOL_VERSION};

/// Operations a provider exposes to the host.
///
/// Dynamic values (configuration, state) are plain `serde_json::Value`s; the
/// gRPC wrapper takes care of the wire encoding.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. `proposed_state` is null for a destroy plan.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<serde_json::Value>,
        proposed_state: serde_json::Value,
        config: serde_json::Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: serde_json::Value,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<(), ProviderError>;

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Wrapper that implements the generated gRPC trait.
///
/// Operation failures are reported to the host as error diagnostics, never as
/// gRPC status errors.
pub(crate) struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    pub(crate) fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

fn decode(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null)
}

fn encode(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| pb::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<pb::Diagnostic> {
    vec![pb::Diagnostic {
        severity: pb::diagnostic::Severity::Error as i32,
        summary: err.to_string(),
        detail: String::new(),
        attribute: String::new(),
    }]
}

/// Log the outcome of a validation call and convert it for the wire.
fn validation_outcome(
    operation: &str,
    target: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if diagnostics.iter().any(Diagnostic::is_error) {
                warn!(
                    target_type = %target,
                    diagnostics = diagnostics.len(),
                    "{} completed with errors",
                    operation
                );
            } else {
                info!(target_type = %target, "{} completed successfully", operation);
            }
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(target_type = %target, error = %e, "{} failed", operation);
            error_to_diagnostics(e)
        },
    }
}

fn schema_to_proto(schema: &crate::schema::Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &crate::schema::Block) -> pb::Block {
    pb::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| pb::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| pb::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::List => pb::nested_block::NestingMode::List as i32,
                    BlockNestingMode::Set => pb::nested_block::NestingMode::Set as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<pb::GetSchemaRequest>,
    ) -> Result<tonic::Response<pb::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        info!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateProviderConfigResponse>, tonic::Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.validate_provider_config(config).await;
        Ok(tonic::Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: validation_outcome("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<pb::ConfigureRequest>,
    ) -> Result<tonic::Response<pb::ConfigureResponse>, tonic::Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.configure(config).await;
        Ok(tonic::Response::new(pb::ConfigureResponse {
            diagnostics: validation_outcome("Configure", "provider", result),
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<pb::StopRequest>,
    ) -> Result<tonic::Response<pb::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(tonic::Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, decode(&req.config))
            .await;
        Ok(tonic::Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: validation_outcome("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<pb::PlanRequest>,
    ) -> Result<tonic::Response<pb::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, is_create = req.prior_state.is_empty(), "Plan called");

        let prior_state = if req.prior_state.is_empty() {
            None
        } else {
            serde_json::from_slice(&req.prior_state).ok()
        };

        match self
            .provider
            .plan(
                &req.resource_type,
                prior_state,
                decode(&req.proposed_state),
                decode(&req.config),
            )
            .await
        {
            Ok(result) => {
                info!(
                    resource_type = %req.resource_type,
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: encode(&result.planned_state),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }))
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Plan failed");
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<pb::CreateRequest>,
    ) -> Result<tonic::Response<pb::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Create called");

        let response = match self
            .provider
            .create(&req.resource_type, decode(&req.planned_state))
            .await
        {
            Ok(state) => {
                info!(resource_type = %req.resource_type, "Create completed successfully");
                pb::CreateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Create failed");
                pb::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<pb::ReadRequest>,
    ) -> Result<tonic::Response<pb::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, "Read called");

        let response = match self
            .provider
            .read(&req.resource_type, decode(&req.current_state))
            .await
        {
            Ok(state) => pb::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Read failed");
                pb::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<pb::UpdateRequest>,
    ) -> Result<tonic::Response<pb::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Update called");

        let response = match self
            .provider
            .update(
                &req.resource_type,
                decode(&req.prior_state),
                decode(&req.planned_state),
            )
            .await
        {
            Ok(state) => {
                info!(resource_type = %req.resource_type, "Update completed successfully");
                pb::UpdateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Update failed");
                pb::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<pb::DeleteRequest>,
    ) -> Result<tonic::Response<pb::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Delete called");

        let diagnostics = match self
            .provider
            .delete(&req.resource_type, decode(&req.current_state))
            .await
        {
            Ok(()) => {
                info!(resource_type = %req.resource_type, "Delete completed successfully");
                vec![]
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Delete failed");
                error_to_diagnostics(e)
            },
        };
        Ok(tonic::Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, decode(&req.config))
            .await;
        Ok(tonic::Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: validation_outcome(
                "ValidateDataSourceConfig",
                &req.data_source_type,
                result,
            ),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<pb::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<pb::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(data_source_type = %req.data_source_type, "ReadDataSource called");

        let response = match self
            .provider
            .read_data_source(&req.data_source_type, decode(&req.config))
            .await
        {
            Ok(state) => {
                info!(data_source_type = %req.data_source_type, "ReadDataSource completed successfully");
                pb::ReadDataSourceResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(data_source_type = %req.data_source_type, error = %e, "ReadDataSource failed");
                pb::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        };
        Ok(tonic::Response::new(response))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long to wait for in-flight requests after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to install signal handlers");
                    return std::future::pending::<()>().await;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                warn!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await
            },
        }
    }
}

/// Serve a provider implementation as a gRPC server on an ephemeral local port.
///
/// Prints `PROVIDER_PLUGIN|<version>|<address>` to stdout once listening.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    serve_on_listener(provider, listener, actual_addr, options).await
}

fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", handshake_line(addr));

    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let provider_for_shutdown = Arc::clone(&provider);

    let server = pb::provider_server::ProviderServer::new(ProviderGrpcService::new(provider));

    let server_future = Server::builder()
        .add_service(server)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            wait_for_shutdown_signal(),
        );

    match tokio::time::timeout(options.shutdown_timeout, server_future).await {
        Ok(Ok(())) => info!("Server shutdown complete"),
        Ok(Err(e)) => {
            error!(error = %e, "Server error during shutdown");
            return Err(e.into());
        },
        Err(_) => {
            warn!(
                timeout = ?options.shutdown_timeout,
                "Shutdown timeout exceeded, forcing shutdown"
            );
        },
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider_for_shutdown.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}
