//! Name-or-ID resolution
//!
//! Parent references may carry either the platform ID or the display name of
//! the entity. The reference is first tried as an ID; if that lookup fails the
//! whole collection is enumerated and each entry's name compared until the
//! first exact match.

use std::fmt;
use std::future::Future;

use kowabunga_core::provider::{ProviderError, ProviderResult};

use crate::client::{ApiError, KowabungaClient, segment};
use crate::models::Named;

/// Kinds of entity that can be referenced by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Region,
    Zone,
    VNet,
    Subnet,
    Project,
    StoragePool,
    StorageNfs,
    Kawaii,
    Kaktus,
    Template,
}

impl EntityKind {
    /// Human label used in diagnostics ("Unknown <label>")
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Region => "region",
            EntityKind::Zone => "zone",
            EntityKind::VNet => "virtual network",
            EntityKind::Subnet => "subnet",
            EntityKind::Project => "project",
            EntityKind::StoragePool => "storage pool",
            EntityKind::StorageNfs => "NFS storage",
            EntityKind::Kawaii => "kawaii instance",
            EntityKind::Kaktus => "kaktus node",
            EntityKind::Template => "volume template",
        }
    }

    /// Path of the top-level collection, also the prefix of object paths
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Region => "region",
            EntityKind::Zone => "zone",
            EntityKind::VNet => "vnet",
            EntityKind::Subnet => "subnet",
            EntityKind::Project => "project",
            EntityKind::StoragePool => "pool",
            EntityKind::StorageNfs => "nfs",
            EntityKind::Kawaii => "kawaii",
            EntityKind::Kaktus => "kaktus",
            EntityKind::Template => "template",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Read each listed entry in turn and return the ID of the first whose name matches.
/// Entries that cannot be read are skipped.
pub async fn scan_by_name<E, D, DF, N>(
    ids: Vec<String>,
    name: &str,
    direct: &D,
    name_of: &N,
) -> Option<String>
where
    D: Fn(String) -> DF,
    DF: Future<Output = Result<E, ApiError>>,
    N: Fn(&E) -> &str,
{
    for id in ids {
        match direct(id.clone()).await {
            Ok(entity) if name_of(&entity) == name => return Some(id),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable entry {}: {}", id, e),
        }
    }
    None
}

/// Resolve `reference` (an ID or a name) into an ID
///
/// `direct` reads one entity by ID, `list` enumerates the IDs of the collection
/// and `name_of` extracts the display name of an entity.
pub async fn resolve_id<E, D, DF, L, LF, N>(
    kind: &str,
    reference: &str,
    direct: D,
    list: L,
    name_of: N,
) -> ProviderResult<String>
where
    D: Fn(String) -> DF,
    DF: Future<Output = Result<E, ApiError>>,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<Vec<String>, ApiError>>,
    N: Fn(&E) -> &str,
{
    if direct(reference.to_string()).await.is_ok() {
        return Ok(reference.to_string());
    }

    let ids = match list().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!("Unable to list {} entries: {}", kind, e);
            return Err(ProviderError::unknown(kind, reference).with_cause(e));
        }
    };

    match scan_by_name(ids, reference, &direct, &name_of).await {
        Some(id) => {
            tracing::debug!("Resolved {} '{}' to {}", kind, reference, id);
            Ok(id)
        }
        None => Err(ProviderError::unknown(kind, reference)),
    }
}

fn display_name(entity: &Named) -> &str {
    &entity.name
}

/// Resolver bound to the API client
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    client: &'a KowabungaClient,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a KowabungaClient) -> Self {
        Self { client }
    }

    /// Resolve a reference of the given kind against its top-level collection
    pub async fn resolve(&self, kind: EntityKind, reference: &str) -> ProviderResult<String> {
        let collection = kind.collection();
        resolve_id(
            kind.label(),
            reference,
            |id| self.fetch(collection, id),
            || self.client.list_ids(collection),
            display_name,
        )
        .await
    }

    /// Templates are only unique within their storage pool
    pub async fn resolve_template(&self, pool_id: &str, reference: &str) -> ProviderResult<String> {
        let templates = format!("pool/{}/templates", segment(&pool_id));
        resolve_id(
            EntityKind::Template.label(),
            reference,
            |id| self.fetch("template", id),
            || self.client.list_ids(&templates),
            display_name,
        )
        .await
    }

    /// ID of the first entry of `collection` named `name`
    pub async fn find_by_name(
        &self,
        collection: &str,
        name: &str,
    ) -> ProviderResult<Option<String>> {
        let ids = self
            .client
            .list_ids(collection)
            .await
            .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))?;
        let fetch = |id: String| self.fetch(collection, id);
        Ok(scan_by_name(ids, name, &fetch, &display_name).await)
    }

    async fn fetch(&self, collection: &str, id: String) -> Result<Named, ApiError> {
        self.client.get(&format!("{}/{}", collection, segment(&id))).await
    }
}
