//! Identifier resolution: external ids to internal paper ids

use crate::graph::{ExternalId, PaperId, RawCitation};
use crate::storage::{RelationshipStore, StorageResult};
use std::collections::{BTreeSet, HashMap};

/// External ids resolved in one bulk lookup
#[derive(Debug, Clone, Default)]
pub struct ResolvedIds {
    ids: HashMap<ExternalId, PaperId>,
}

impl ResolvedIds {
    /// Internal id a citation points at, trying its candidates in priority order.
    pub fn lookup(&self, citation: &RawCitation) -> Option<PaperId> {
        citation
            .candidates()
            .iter()
            .find_map(|candidate| self.ids.get(candidate).copied())
    }

    pub fn get(&self, id: &ExternalId) -> Option<PaperId> {
        self.ids.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Maps external references onto papers already in the store
///
/// Lookups are pure reads and always go to the store in bulk: the caller
/// hands over every reference it will need, the resolver deduplicates them
/// and issues one query.
pub struct IdentifierResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RelationshipStore + ?Sized> IdentifierResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve a set of external ids. Unknown ids are simply absent.
    pub fn resolve(&self, ids: impl IntoIterator<Item = ExternalId>) -> StorageResult<ResolvedIds> {
        let unique: BTreeSet<ExternalId> = ids.into_iter().collect();
        if unique.is_empty() {
            return Ok(ResolvedIds::default());
        }

        let wanted: Vec<ExternalId> = unique.into_iter().collect();
        let ids = self.store.resolve_external_ids(&wanted)?;
        tracing::debug!(
            requested = wanted.len(),
            resolved = ids.len(),
            "resolved external identifiers"
        );
        Ok(ResolvedIds { ids })
    }

    /// Resolve every candidate id of the given citations.
    pub fn resolve_citations<'c>(
        &self,
        citations: impl IntoIterator<Item = &'c RawCitation>,
    ) -> StorageResult<ResolvedIds> {
        self.resolve(citations.into_iter().flat_map(RawCitation::candidates))
    }
}
