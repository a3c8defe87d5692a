//! Mule B2B Provider
//!
//! An infrastructure-as-code provider plugin for the Anypoint Partner
//! Manager. The host process spawns the provider binary and talks to it over
//! gRPC; the provider translates resource lifecycle calls into partner
//! manager REST calls.
//!
//! # Overview
//!
//! - **Resources**: partners (with identifiers, contacts, address and X12
//!   inbound settings), endpoints, documents, document flows, standalone
//!   identifiers and certificates
//! - **Data sources**: environments, EDI document types, partners and
//!   identifier types
//! - **Reconciler**: keeps child collections (identifiers, contacts) in sync
//!   by natural key, since the API only offers create and delete for them
//! - **Plan**: computes planned state, changes and replacement from schemas
//!
//! # Handshake Protocol
//!
//! Once listening, the provider writes a single line to stdout:
//!
//! ```text
//! PROVIDER_PLUGIN|1|127.0.0.1:50051
//! ```
//!
//! Format: `PROVIDER_PLUGIN|<protocol_version>|<address>`. Logs go to stderr.
//!
//! # Configuration
//!
//! ```text
//! provider "muleb2b" {
//!   organization_id = "..."
//!   username        = "..."
//!   password        = "..."
//! }
//! ```
//!
//! Unset settings fall back to `MULEB2B_ORG`, `MULEB2B_USERNAME`,
//! `MULEB2B_PASSWORD` and `MULEB2B_BASE_URL`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use api::{B2bApi, HttpB2bClient};
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::MuleB2bProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{AttributeChange, PlanResult, HANDSHAKE_PREFIX, PROTOCOL_VERSION};
pub use validation::{is_valid, validate, validate_result};
