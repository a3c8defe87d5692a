//! Natural-key reconciliation of partner child collections.
//!
//! Identifiers and contacts carry no server id in configuration, so the
//! previous and desired configuration sets are correlated with the server's
//! list through a natural key instead:
//!
//! 1. previous records pick up the server id and status of the server record
//!    with the same key,
//! 2. previous records whose key is no longer desired are deleted by id,
//! 3. desired records whose key was not previously configured are created,
//! 4. the collection is listed again and returned.
//!
//! Records present in both sets are never touched. Any remote failure aborts
//! the run; whatever was already applied stays applied.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::models::{Contact, Identifier, STATUS_ACTIVE};
use crate::api::{ApiResult, B2bApi};
use crate::error::ProviderError;

/// A child record identified by a natural key rather than its server id.
pub trait ChildRecord: Clone + Debug + Send + Sync {
    /// The natural key type.
    type Key: Eq + Hash + Clone + Debug + Send + Sync;

    /// Singular noun used in error messages.
    const KIND: &'static str;

    /// The natural key of this record.
    fn natural_key(&self) -> Self::Key;

    /// The server-assigned id, if known.
    fn server_id(&self) -> Option<&str>;

    /// Copy the server-assigned id and status from `server`.
    fn annotate(&mut self, server: &Self);

    /// Default the status of a record about to be created.
    fn default_status(&mut self);
}

impl ChildRecord for Identifier {
    type Key = (String, String);
    const KIND: &'static str = "identifier";

    fn natural_key(&self) -> Self::Key {
        (
            self.identifier_type_qualifier_id.clone().unwrap_or_default(),
            self.value.clone().unwrap_or_default(),
        )
    }

    fn server_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    fn annotate(&mut self, server: &Self) {
        self.id = server.id.clone();
        self.status = server.status.clone();
    }

    fn default_status(&mut self) {
        if self.status.as_deref().unwrap_or("").is_empty() {
            self.status = Some(STATUS_ACTIVE.to_string());
        }
    }
}

impl ChildRecord for Contact {
    type Key = (String, String, String);
    const KIND: &'static str = "contact";

    fn natural_key(&self) -> Self::Key {
        let contact_type = self
            .contact_type
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or("")
            .to_ascii_lowercase();
        (
            self.name.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            contact_type,
        )
    }

    fn server_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    fn annotate(&mut self, server: &Self) {
        self.id = server.id.clone();
        self.status = server.status.clone();
    }

    fn default_status(&mut self) {
        if self.status.as_deref().unwrap_or("").is_empty() {
            self.status = Some(STATUS_ACTIVE.to_string());
        }
    }
}

/// Remote operations on one parent's child collection.
#[async_trait]
pub trait ChildCollection: Send + Sync {
    /// The record type held by the collection.
    type Record: ChildRecord;

    /// List the current server-side records.
    async fn list(&self) -> ApiResult<Vec<Self::Record>>;

    /// Create a record.
    async fn create(&self, record: &Self::Record) -> ApiResult<()>;

    /// Delete a record by server id.
    async fn delete(&self, id: &str) -> ApiResult<()>;
}

/// The identifiers of one partner.
pub struct IdentifierCollection<'a> {
    api: &'a dyn B2bApi,
    env: &'a str,
    partner_id: &'a str,
}

impl<'a> IdentifierCollection<'a> {
    /// Scope identifier operations to a partner in an environment.
    pub fn new(api: &'a dyn B2bApi, env: &'a str, partner_id: &'a str) -> Self {
        Self {
            api,
            env,
            partner_id,
        }
    }
}

#[async_trait]
impl ChildCollection for IdentifierCollection<'_> {
    type Record = Identifier;

    async fn list(&self) -> ApiResult<Vec<Identifier>> {
        self.api.list_identifiers(self.env, self.partner_id).await
    }

    async fn create(&self, record: &Identifier) -> ApiResult<()> {
        self.api
            .create_identifier(self.env, self.partner_id, record)
            .await
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.api
            .delete_identifier(self.env, self.partner_id, id)
            .await
    }
}

/// The contacts of one partner.
pub struct ContactCollection<'a> {
    api: &'a dyn B2bApi,
    env: &'a str,
    partner_id: &'a str,
}

impl<'a> ContactCollection<'a> {
    /// Scope contact operations to a partner in an environment.
    pub fn new(api: &'a dyn B2bApi, env: &'a str, partner_id: &'a str) -> Self {
        Self {
            api,
            env,
            partner_id,
        }
    }
}

#[async_trait]
impl ChildCollection for ContactCollection<'_> {
    type Record = Contact;

    async fn list(&self) -> ApiResult<Vec<Contact>> {
        self.api.list_contacts(self.env, self.partner_id).await
    }

    async fn create(&self, record: &Contact) -> ApiResult<()> {
        self.api
            .create_contact(self.env, self.partner_id, record)
            .await
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.api.delete_contact(self.env, self.partner_id, id).await
    }
}

/// Remote operations needed to converge a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDelta<T> {
    /// Previously configured records to delete, annotated with server ids.
    pub to_delete: Vec<T>,
    /// Desired records to create.
    pub to_create: Vec<T>,
}

impl<T> ChildDelta<T> {
    /// Whether the delta requires no remote call.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Reject a configuration set holding the same natural key twice.
pub fn ensure_unique<T: ChildRecord>(records: &[T]) -> Result<(), ProviderError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        let key = record.natural_key();
        if !seen.insert(key.clone()) {
            return Err(ProviderError::Validation(format!(
                "duplicate {} {:?}: natural keys must be unique",
                T::KIND,
                key
            )));
        }
    }
    Ok(())
}

/// Compute the deletes and creates that turn `previous` into `desired`.
///
/// `server` is the current server-side list, used to recover the ids of
/// previous records. Fails when a record to delete has no server id.
pub fn compute_delta<T: ChildRecord>(
    mut previous: Vec<T>,
    desired: Vec<T>,
    server: &[T],
) -> Result<ChildDelta<T>, ProviderError> {
    ensure_unique(&previous)?;
    ensure_unique(&desired)?;

    for record in &mut previous {
        let key = record.natural_key();
        if let Some(found) = server.iter().find(|s| s.natural_key() == key) {
            record.annotate(found);
        }
    }

    let desired_keys: HashSet<T::Key> = desired.iter().map(ChildRecord::natural_key).collect();
    let previous_keys: HashSet<T::Key> = previous.iter().map(ChildRecord::natural_key).collect();

    let to_delete: Vec<T> = previous
        .into_iter()
        .filter(|r| !desired_keys.contains(&r.natural_key()))
        .collect();
    let to_create: Vec<T> = desired
        .into_iter()
        .filter(|r| !previous_keys.contains(&r.natural_key()))
        .collect();

    if let Some(orphan) = to_delete.iter().find(|r| r.server_id().is_none()) {
        return Err(ProviderError::Reconcile(format!(
            "{} {:?} has no server id and cannot be deleted",
            T::KIND,
            orphan.natural_key()
        )));
    }

    Ok(ChildDelta {
        to_delete,
        to_create,
    })
}

/// Converge a remote collection from `previous` to `desired` and return the
/// collection as re-read from the server.
pub async fn reconcile<C: ChildCollection>(
    collection: &C,
    previous: Vec<C::Record>,
    desired: Vec<C::Record>,
) -> Result<Vec<C::Record>, ProviderError> {
    let kind = <C::Record as ChildRecord>::KIND;
    let server = collection.list().await?;
    let delta = compute_delta(previous, desired, &server)?;

    if delta.is_empty() {
        debug!(kind, "Collection already converged");
        return Ok(server);
    }

    info!(
        kind,
        deletes = delta.to_delete.len(),
        creates = delta.to_create.len(),
        "Reconciling collection"
    );

    for record in &delta.to_delete {
        if let Some(id) = record.server_id() {
            debug!(kind, id, "Deleting record");
            collection.delete(id).await?;
        }
    }

    for mut record in delta.to_create {
        record.default_status();
        debug!(kind, key = ?record.natural_key(), "Creating record");
        collection.create(&record).await?;
    }

    collection.list().await
}
