//! Read-only lookups of server-side entities.

mod edi_document_type;
mod environment;
mod identifier_type;
mod partner;

pub use edi_document_type::EdiDocumentTypeDataSource;
pub use environment::EnvironmentDataSource;
pub use identifier_type::IdentifierTypeDataSource;
pub use partner::PartnerDataSource;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::B2bApi;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};

/// A data source type served by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name as used in configuration, e.g. `muleb2b_environment`.
    fn type_name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Cross-field checks the schema cannot express.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Resolve the lookup and return the resulting state.
    async fn read(&self, api: &dyn B2bApi, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source type the provider serves.
pub fn all() -> Vec<&'static dyn DataSource> {
    vec![
        &EnvironmentDataSource,
        &EdiDocumentTypeDataSource,
        &PartnerDataSource,
        &IdentifierTypeDataSource,
    ]
}

/// Look up a data source type by name.
pub fn find(type_name: &str) -> Option<&'static dyn DataSource> {
    all().into_iter().find(|d| d.type_name() == type_name)
}

/// Exactly one match, or a not-found or ambiguity error built by the caller.
pub(crate) fn single<T>(
    mut matches: Vec<T>,
    none: impl FnOnce() -> String,
    many: impl FnOnce() -> String,
) -> Result<T, ProviderError> {
    match matches.len() {
        0 => Err(ProviderError::NotFound(none())),
        1 => Ok(matches.remove(0)),
        _ => Err(ProviderError::Ambiguous(many())),
    }
}
