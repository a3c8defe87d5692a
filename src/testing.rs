//! Testing utilities for the provider.
//!
//! Two pieces work together:
//!
//! - [`ProviderTester`] drives a `ProviderService` implementation without a
//!   gRPC server, with helpers for whole plan/apply lifecycles.
//! - [`InMemoryB2bApi`] stands in for the partner manager API. It keeps
//!   entities per environment, records every call, and can be told to fail
//!   the next call of a given operation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use muleb2b_provider::testing::{InMemoryB2bApi, ProviderTester};
//! use muleb2b_provider::MuleB2bProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_certificate() {
//!     let api = Arc::new(InMemoryB2bApi::new());
//!     let partner_id = api.seed_partner("env-1", "Acme");
//!     let tester = ProviderTester::new(MuleB2bProvider::with_api(api.clone()));
//!
//!     let state = tester.lifecycle_create("muleb2b_certificate", json!({
//!         "environment_id": "env-1",
//!         "partner_id": partner_id,
//!         "name": "acme-signing",
//!         "certificate_body": "-----BEGIN CERTIFICATE-----\n..."
//!     })).await.unwrap();
//!
//!     assert!(state["id"].is_string());
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::models::{
    Address, Certificate, Contact, Document, DocumentFlow, DocumentFlowConfiguration,
    EdiDocumentType, EdiFormat, EdiFormatVersion, Endpoint, Environment, Identifier,
    IdentifierType, Mapping, Partner, X12Config, STATUS_ACTIVE,
};
use crate::api::{ApiResult, B2bApi};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::PlanResult;

/// A test harness for provider implementations.
///
/// Wraps a `ProviderService` and exposes its operations without a gRPC
/// server in between.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.provider.schema().resources.into_keys().collect();
        names.sort();
        names
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.provider.schema().data_sources.into_keys().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create → read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Run a full update lifecycle: plan → update → read.
    ///
    /// A plan that requires replacement is applied as delete then create.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state.clone())
            .await?;

        if plan_result.requires_replace {
            self.delete(resource_type, prior_state).await?;
            return self.lifecycle_create(resource_type, proposed_state).await;
        }

        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;
        Ok(updated_state)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates the resource will be created.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan result indicates changes are needed.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert that a plan requires resource replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan does not have a change for a specific attribute path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        !has_change,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

// =========================================================================
// In-memory partner manager
// =========================================================================

#[derive(Default)]
struct EdiVersionEntry {
    version: Option<EdiFormatVersion>,
    document_types: Vec<EdiDocumentType>,
}

#[derive(Default)]
struct EnvStore {
    partners: Vec<Partner>,
    identifiers: HashMap<String, Vec<Identifier>>,
    contacts: HashMap<String, Vec<Contact>>,
    addresses: HashMap<String, Address>,
    x12: HashMap<String, X12Config>,
    endpoints: HashMap<String, Endpoint>,
    documents: HashMap<String, Document>,
    flows: HashMap<String, DocumentFlow>,
    mappings: HashMap<String, (String, Mapping)>,
    certificates: HashMap<String, Certificate>,
    identifier_types: Vec<IdentifierType>,
    formats: Vec<EdiFormat>,
    versions: HashMap<String, Vec<EdiVersionEntry>>,
}

#[derive(Default)]
struct FakeState {
    environments: Vec<Environment>,
    envs: HashMap<String, EnvStore>,
    calls: Vec<String>,
    failures: Vec<String>,
    next_id: u64,
    mapping_content_sent: bool,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn env(&mut self, env: &str) -> &mut EnvStore {
        self.envs.entry(env.to_string()).or_default()
    }
}

fn not_found(what: &str, id: &str) -> ProviderError {
    ProviderError::NotFound(format!("{} ({}) not found", what, id))
}

/// An in-memory partner manager.
///
/// Behaves like the remote API where resource code depends on it:
///
/// - create calls assign ids; identifier and contact creates return none
/// - endpoint reads withhold passwords, API keys and client secrets
/// - a new document flow comes with one ACTIVE configuration at version 1
/// - deleting a partner removes its identifiers, contacts, address and X12 configuration
/// - addresses cannot be deleted, only overwritten
#[derive(Default)]
pub struct InMemoryB2bApi {
    state: Mutex<FakeState>,
}

impl InMemoryB2bApi {
    /// An empty partner manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and take the state, or fail if a failure was queued.
    fn call(&self, op: &str, target: &str) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(format!("{} {}", op, target).trim_end().to_string());
        if let Some(pos) = state.failures.iter().position(|f| f == op) {
            state.failures.remove(pos);
            return Err(ProviderError::Api {
                status: 500,
                message: format!("injected failure in {}", op),
            });
        }
        Ok(state)
    }

    /// Add an environment to the organization.
    pub fn with_environment(self, id: &str, name: &str) -> Self {
        self.lock().environments.push(Environment {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Add an identifier type to an environment.
    pub fn with_identifier_type(self, env: &str, identifier_type: IdentifierType) -> Self {
        self.lock().env(env).identifier_types.push(identifier_type);
        self
    }

    /// Add an EDI document type, creating its format and version as needed.
    ///
    /// Ids are derived from the names: `format-X12`, `version-X12-4010`,
    /// `doctype-X12-4010-850`.
    pub fn with_edi_document_type(self, env: &str, format: &str, version: &str, document: &str) -> Self {
        {
            let mut state = self.lock();
            let store = state.env(env);
            let format_id = format!("format-{}", format);
            if !store.formats.iter().any(|f| f.id == format_id) {
                store.formats.push(EdiFormat {
                    id: format_id.clone(),
                    format: format.to_string(),
                });
            }
            let version_id = format!("version-{}-{}", format, version);
            let versions = store.versions.entry(format_id).or_default();
            let position = versions
                .iter()
                .position(|v| v.version.as_ref().is_some_and(|v| v.id == version_id));
            let entry = match position {
                Some(i) => &mut versions[i],
                None => {
                    versions.push(EdiVersionEntry {
                        version: Some(EdiFormatVersion {
                            id: version_id,
                            label: version.to_string(),
                        }),
                        document_types: Vec::new(),
                    });
                    let last = versions.len() - 1;
                    &mut versions[last]
                },
            };
            entry.document_types.push(EdiDocumentType {
                id: format!("doctype-{}-{}-{}", format, version, document),
                name: document.to_string(),
            });
        }
        self
    }

    fn seed(&self, env: &str, name: &str, host: bool) -> String {
        let mut state = self.lock();
        let id = state.id("partner");
        state.env(env).partners.push(Partner {
            id: Some(id.clone()),
            name: Some(name.to_string()),
            environment_id: Some(env.to_string()),
            host_flag: Some(host),
            ..Default::default()
        });
        id
    }

    /// Insert a partner without recording a call. Returns its id.
    pub fn seed_partner(&self, env: &str, name: &str) -> String {
        self.seed(env, name, false)
    }

    /// Insert the environment's host partner. Returns its id.
    pub fn seed_host_partner(&self, env: &str, name: &str) -> String {
        self.seed(env, name, true)
    }

    /// Every call so far, as `"<operation> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls of one operation.
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.mapping_content_sent = false;
    }

    /// Make the next call of `op` fail with a 500.
    pub fn fail_next(&self, op: &str) {
        self.lock().failures.push(op.to_string());
    }

    /// Whether any document flow update carried inline mapping content.
    pub fn mapping_content_sent(&self) -> bool {
        self.lock().mapping_content_sent
    }
}

fn partner_exists(store: &EnvStore, partner_id: &str) -> ApiResult<()> {
    if store
        .partners
        .iter()
        .any(|p| p.id.as_deref() == Some(partner_id))
    {
        Ok(())
    } else {
        Err(not_found("partner", partner_id))
    }
}

fn remove_by_id<T>(records: &mut Vec<T>, id: &str, id_of: impl Fn(&T) -> Option<&str>) -> bool {
    let before = records.len();
    records.retain(|r| id_of(r) != Some(id));
    records.len() != before
}

#[async_trait]
impl B2bApi for InMemoryB2bApi {
    async fn list_environments(&self) -> ApiResult<Vec<Environment>> {
        Ok(self.call("list_environments", "")?.environments.clone())
    }

    async fn list_partners(&self, env: &str) -> ApiResult<Vec<Partner>> {
        Ok(self.call("list_partners", env)?.env(env).partners.clone())
    }

    async fn create_partner(&self, env: &str, partner: &Partner) -> ApiResult<String> {
        let mut state = self.call("create_partner", partner.name.as_deref().unwrap_or(""))?;
        let id = state.id("partner");
        let mut record = partner.clone();
        record.id = Some(id.clone());
        record.environment_id = Some(env.to_string());
        record.host_flag = Some(false);
        state.env(env).partners.push(record);
        Ok(id)
    }

    async fn get_partner(&self, env: &str, partner_id: &str) -> ApiResult<Partner> {
        self.call("get_partner", partner_id)?
            .env(env)
            .partners
            .iter()
            .find(|p| p.id.as_deref() == Some(partner_id))
            .cloned()
            .ok_or_else(|| not_found("partner", partner_id))
    }

    async fn update_partner(&self, env: &str, partner: &Partner) -> ApiResult<()> {
        let id = partner.id.clone().unwrap_or_default();
        let mut state = self.call("update_partner", &id)?;
        let stored = state
            .env(env)
            .partners
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| not_found("partner", &id))?;
        let host_flag = stored.host_flag;
        *stored = partner.clone();
        stored.host_flag = host_flag;
        Ok(())
    }

    async fn delete_partner(&self, env: &str, partner_id: &str) -> ApiResult<()> {
        let mut state = self.call("delete_partner", partner_id)?;
        let store = state.env(env);
        if !remove_by_id(&mut store.partners, partner_id, |p| p.id.as_deref()) {
            return Err(not_found("partner", partner_id));
        }
        store.identifiers.remove(partner_id);
        store.contacts.remove(partner_id);
        store.addresses.remove(partner_id);
        store.x12.remove(partner_id);
        Ok(())
    }

    async fn list_identifiers(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Identifier>> {
        let mut state = self.call("list_identifiers", partner_id)?;
        Ok(state
            .env(env)
            .identifiers
            .get(partner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<Identifier> {
        let mut state = self.call("get_identifier", identifier_id)?;
        state
            .env(env)
            .identifiers
            .get(partner_id)
            .and_then(|ids| ids.iter().find(|i| i.id.as_deref() == Some(identifier_id)))
            .cloned()
            .ok_or_else(|| not_found("identifier", identifier_id))
    }

    async fn create_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier: &Identifier,
    ) -> ApiResult<()> {
        let target = format!("{} {}", partner_id, identifier.value.as_deref().unwrap_or(""));
        let mut state = self.call("create_identifier", &target)?;
        let id = state.id("identifier");
        let store = state.env(env);
        partner_exists(store, partner_id)?;
        let mut record = identifier.clone();
        record.id = Some(id);
        store
            .identifiers
            .entry(partner_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn delete_identifier(
        &self,
        env: &str,
        partner_id: &str,
        identifier_id: &str,
    ) -> ApiResult<()> {
        let mut state = self.call("delete_identifier", identifier_id)?;
        let removed = state
            .env(env)
            .identifiers
            .get_mut(partner_id)
            .is_some_and(|ids| remove_by_id(ids, identifier_id, |i| i.id.as_deref()));
        if removed {
            Ok(())
        } else {
            Err(not_found("identifier", identifier_id))
        }
    }

    async fn list_contacts(&self, env: &str, partner_id: &str) -> ApiResult<Vec<Contact>> {
        let mut state = self.call("list_contacts", partner_id)?;
        Ok(state
            .env(env)
            .contacts
            .get(partner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_contact(&self, env: &str, partner_id: &str, contact: &Contact) -> ApiResult<()> {
        let target = format!("{} {}", partner_id, contact.email.as_deref().unwrap_or(""));
        let mut state = self.call("create_contact", &target)?;
        let id = state.id("contact");
        let store = state.env(env);
        partner_exists(store, partner_id)?;
        let mut record = contact.clone();
        record.id = Some(id);
        store
            .contacts
            .entry(partner_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn delete_contact(&self, env: &str, partner_id: &str, contact_id: &str) -> ApiResult<()> {
        let mut state = self.call("delete_contact", contact_id)?;
        let removed = state
            .env(env)
            .contacts
            .get_mut(partner_id)
            .is_some_and(|contacts| remove_by_id(contacts, contact_id, |c| c.id.as_deref()));
        if removed {
            Ok(())
        } else {
            Err(not_found("contact", contact_id))
        }
    }

    async fn update_contact(&self, env: &str, partner_id: &str, contact: &Contact) -> ApiResult<()> {
        let contact_id = contact.id.clone().unwrap_or_default();
        let mut state = self.call("update_contact", &contact_id)?;
        let existing = state
            .env(env)
            .contacts
            .get_mut(partner_id)
            .and_then(|contacts| {
                contacts
                    .iter_mut()
                    .find(|c| c.id.as_deref() == Some(contact_id.as_str()))
            })
            .ok_or_else(|| not_found("contact", &contact_id))?;
        *existing = contact.clone();
        Ok(())
    }

    async fn get_address(&self, env: &str, partner_id: &str) -> ApiResult<Option<Address>> {
        let mut state = self.call("get_address", partner_id)?;
        Ok(state.env(env).addresses.get(partner_id).cloned())
    }

    async fn put_address(&self, env: &str, partner_id: &str, address: &Address) -> ApiResult<()> {
        let mut state = self.call("put_address", partner_id)?;
        let mut record = address.clone();
        if record.id.is_none() {
            record.id = Some(state.id("address"));
        }
        let store = state.env(env);
        partner_exists(store, partner_id)?;
        store.addresses.insert(partner_id.to_string(), record);
        Ok(())
    }

    async fn get_x12_inbound(&self, env: &str, partner_id: &str) -> ApiResult<Option<X12Config>> {
        let mut state = self.call("get_x12_inbound", partner_id)?;
        Ok(state.env(env).x12.get(partner_id).cloned())
    }

    async fn create_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()> {
        let mut state = self.call("create_x12_inbound", partner_id)?;
        let id = state.id("x12");
        let store = state.env(env);
        partner_exists(store, partner_id)?;
        let mut record = config.clone();
        record.id = Some(id);
        record.partner_id = Some(partner_id.to_string());
        if record.envelope_headers.is_none() {
            record.envelope_headers = Some(Value::Object(Default::default()));
        }
        store.x12.insert(partner_id.to_string(), record);
        Ok(())
    }

    async fn update_x12_inbound(
        &self,
        env: &str,
        partner_id: &str,
        config: &X12Config,
    ) -> ApiResult<()> {
        let mut state = self.call("update_x12_inbound", partner_id)?;
        let stored = state
            .env(env)
            .x12
            .get_mut(partner_id)
            .ok_or_else(|| not_found("X12 inbound configuration", partner_id))?;
        let id = stored.id.clone();
        *stored = config.clone();
        stored.id = id;
        Ok(())
    }

    async fn create_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<String> {
        let mut state = self.call("create_endpoint", endpoint.name.as_deref().unwrap_or(""))?;
        let id = state.id("endpoint");
        let mut record = endpoint.clone();
        record.id = Some(id.clone());
        state.env(env).endpoints.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<Endpoint> {
        let mut state = self.call("get_endpoint", endpoint_id)?;
        let mut endpoint = state
            .env(env)
            .endpoints
            .get(endpoint_id)
            .cloned()
            .ok_or_else(|| not_found("endpoint", endpoint_id))?;
        if let Some(auth) = endpoint.config.as_mut().and_then(|c| c.auth_mode.as_mut()) {
            auth.password = None;
            auth.api_key = None;
            auth.client_secret = None;
        }
        Ok(endpoint)
    }

    async fn update_endpoint(&self, env: &str, endpoint: &Endpoint) -> ApiResult<()> {
        let id = endpoint.id.clone().unwrap_or_default();
        let mut state = self.call("update_endpoint", &id)?;
        let stored = state
            .env(env)
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| not_found("endpoint", &id))?;
        *stored = endpoint.clone();
        Ok(())
    }

    async fn delete_endpoint(&self, env: &str, endpoint_id: &str) -> ApiResult<()> {
        let mut state = self.call("delete_endpoint", endpoint_id)?;
        state
            .env(env)
            .endpoints
            .remove(endpoint_id)
            .map(|_| ())
            .ok_or_else(|| not_found("endpoint", endpoint_id))
    }

    async fn create_document(
        &self,
        env: &str,
        partner_id: &str,
        document: &Document,
    ) -> ApiResult<String> {
        let mut state = self.call("create_document", partner_id)?;
        let id = state.id("document");
        let mut record = document.clone();
        record.id = Some(id.clone());
        if record.schema_content.is_some() {
            record.custom_schema_id = Some(state.id("schema"));
        }
        state.env(env).documents.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_document(
        &self,
        env: &str,
        _partner_id: &str,
        document_id: &str,
    ) -> ApiResult<Document> {
        let mut state = self.call("get_document", document_id)?;
        state
            .env(env)
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| not_found("document", document_id))
    }

    async fn delete_document(&self, env: &str, _partner_id: &str, document_id: &str) -> ApiResult<()> {
        let mut state = self.call("delete_document", document_id)?;
        state
            .env(env)
            .documents
            .remove(document_id)
            .map(|_| ())
            .ok_or_else(|| not_found("document", document_id))
    }

    async fn create_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<String> {
        let mut state = self.call("create_document_flow", flow.name.as_deref().unwrap_or(""))?;
        let id = state.id("flow");
        let configuration_id = state.id("flowconfig");
        let mut record = flow.clone();
        record.id = Some(id.clone());
        record.configurations = vec![DocumentFlowConfiguration {
            id: Some(configuration_id),
            document_flow_id: Some(id.clone()),
            environment_id: Some(env.to_string()),
            status: Some(STATUS_ACTIVE.to_string()),
            version: Some(1),
            ..Default::default()
        }];
        state.env(env).flows.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<DocumentFlow> {
        let mut state = self.call("get_document_flow", flow_id)?;
        state
            .env(env)
            .flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| not_found("document flow", flow_id))
    }

    async fn update_document_flow(&self, env: &str, flow: &DocumentFlow) -> ApiResult<()> {
        let id = flow.id.clone().unwrap_or_default();
        let mut state = self.call("update_document_flow", &id)?;
        let sent_content = flow
            .configurations
            .iter()
            .flat_map(|c| &c.document_mapping)
            .any(|m| m.mapping_content.is_some());
        if sent_content {
            state.mapping_content_sent = true;
        }

        let store = state.env(env);
        if !store.flows.contains_key(&id) {
            return Err(not_found("document flow", &id));
        }
        let mut record = flow.clone();
        for configuration in &mut record.configurations {
            for mapping in &mut configuration.document_mapping {
                let mapping_id = mapping.id.clone().unwrap_or_default();
                match store.mappings.get(&mapping_id) {
                    Some((owner, _)) if *owner == id => *mapping = mapping.reference(),
                    _ => {
                        return Err(ProviderError::Api {
                            status: 400,
                            message: format!("unknown mapping ({}) for flow ({})", mapping_id, id),
                        })
                    },
                }
            }
        }
        store.flows.insert(id, record);
        Ok(())
    }

    async fn delete_document_flow(&self, env: &str, flow_id: &str) -> ApiResult<()> {
        let mut state = self.call("delete_document_flow", flow_id)?;
        let store = state.env(env);
        store.mappings.retain(|_, (owner, _)| owner.as_str() != flow_id);
        store
            .flows
            .remove(flow_id)
            .map(|_| ())
            .ok_or_else(|| not_found("document flow", flow_id))
    }

    async fn create_mapping(&self, env: &str, flow_id: &str, mapping: &Mapping) -> ApiResult<String> {
        let mut state = self.call("create_mapping", flow_id)?;
        let id = state.id("mapping");
        let store = state.env(env);
        if !store.flows.contains_key(flow_id) {
            return Err(not_found("document flow", flow_id));
        }
        let mut record = mapping.clone();
        record.id = Some(id.clone());
        store
            .mappings
            .insert(id.clone(), (flow_id.to_string(), record));
        Ok(id)
    }

    async fn get_mapping(&self, env: &str, flow_id: &str, mapping_id: &str) -> ApiResult<Mapping> {
        let mut state = self.call("get_mapping", mapping_id)?;
        match state.env(env).mappings.get(mapping_id) {
            Some((owner, mapping)) if owner == flow_id => Ok(mapping.clone()),
            _ => Err(not_found("mapping", mapping_id)),
        }
    }

    async fn create_certificate(
        &self,
        env: &str,
        partner_id: &str,
        certificate: &Certificate,
    ) -> ApiResult<String> {
        let mut state = self.call("create_certificate", partner_id)?;
        let id = state.id("certificate");
        let store = state.env(env);
        partner_exists(store, partner_id)?;
        let mut record = certificate.clone();
        record.id = Some(id.clone());
        store.certificates.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_certificate(
        &self,
        env: &str,
        _partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<Certificate> {
        let mut state = self.call("get_certificate", certificate_id)?;
        state
            .env(env)
            .certificates
            .get(certificate_id)
            .cloned()
            .ok_or_else(|| not_found("certificate", certificate_id))
    }

    async fn delete_certificate(
        &self,
        env: &str,
        _partner_id: &str,
        certificate_id: &str,
    ) -> ApiResult<()> {
        let mut state = self.call("delete_certificate", certificate_id)?;
        state
            .env(env)
            .certificates
            .remove(certificate_id)
            .map(|_| ())
            .ok_or_else(|| not_found("certificate", certificate_id))
    }

    async fn list_identifier_types(&self, env: &str) -> ApiResult<Vec<IdentifierType>> {
        Ok(self
            .call("list_identifier_types", env)?
            .env(env)
            .identifier_types
            .clone())
    }

    async fn list_edi_formats(&self, env: &str) -> ApiResult<Vec<EdiFormat>> {
        Ok(self.call("list_edi_formats", env)?.env(env).formats.clone())
    }

    async fn list_edi_format_versions(
        &self,
        env: &str,
        format_id: &str,
    ) -> ApiResult<Vec<EdiFormatVersion>> {
        let mut state = self.call("list_edi_format_versions", format_id)?;
        Ok(state
            .env(env)
            .versions
            .get(format_id)
            .map(|entries| entries.iter().filter_map(|e| e.version.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_edi_document_types(
        &self,
        env: &str,
        format_id: &str,
        version_id: &str,
    ) -> ApiResult<Vec<EdiDocumentType>> {
        let mut state = self.call("list_edi_document_types", version_id)?;
        Ok(state
            .env(env)
            .versions
            .get(format_id)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|e| e.version.as_ref().is_some_and(|v| v.id == version_id))
            })
            .map(|e| e.document_types.clone())
            .unwrap_or_default())
    }
}
