//! Cascading soft delete over the relation graph.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::entity::{AnyEntity, EntityKey};
use crate::error::{RepoError, Result};
use crate::graph::RelationRegistry;

/// Reject soft delete for entities with a one-to-one relation: marking only
/// one side would leave the other pointing at a logically deleted row.
pub(crate) fn ensure_soft_deletable(
    registry: &RelationRegistry,
    entity: &dyn AnyEntity,
) -> Result<()> {
    let name = entity.entity_name();
    match registry
        .relations(name)
        .iter()
        .find(|r| !r.owned && r.is_one_to_one())
    {
        Some(relation) => Err(RepoError::UnsupportedSoftDelete {
            entity: name,
            relation: relation.name,
        }),
        None => Ok(()),
    }
}

/// Collects every entity a soft delete touches. All of them get the same
/// `deleted_at`, and each is marked at most once.
pub(crate) struct Cascade<'a> {
    registry: &'a RelationRegistry,
    cancel: &'a CancellationToken,
    now: DateTime<Utc>,
    visited: HashSet<EntityKey>,
    marked: Vec<Box<dyn AnyEntity>>,
}

impl<'a> Cascade<'a> {
    pub(crate) fn new(
        registry: &'a RelationRegistry,
        cancel: &'a CancellationToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            registry,
            cancel,
            now,
            visited: HashSet::new(),
            marked: Vec::new(),
        }
    }

    /// Mark `root` and its cascading dependents. An already deleted root is
    /// left untouched, as is its subtree.
    pub(crate) async fn mark_root(&mut self, root: &mut dyn AnyEntity) -> Result<()> {
        if root.stamps().is_deleted() {
            return Ok(());
        }
        root.stamps_mut().deleted_at = Some(self.now);
        if !self.visited.insert(root.key()) {
            // reached earlier as a dependent of another root
            return Ok(());
        }
        self.expand(&*root).await?;
        self.marked.push(root.clone_boxed());
        Ok(())
    }

    fn expand<'s>(&'s mut self, node: &'s dyn AnyEntity) -> BoxFuture<'s, Result<()>> {
        Box::pin(async move {
            let registry = self.registry;
            for relation in registry.relations(node.entity_name()) {
                if !relation.cascades_soft_delete() {
                    continue;
                }
                let Some(loader) = &relation.loader else {
                    continue;
                };
                if self.cancel.is_cancelled() {
                    return Err(RepoError::Cancelled);
                }
                let related = match loader.materialized(node) {
                    Some(items) => items,
                    None => loader.load(node).await?,
                };
                trace!(
                    parent = %node.key(),
                    relation = relation.name,
                    count = related.len(),
                    "cascading soft delete"
                );
                for mut child in related {
                    if child.stamps().is_deleted() || !self.visited.insert(child.key()) {
                        continue;
                    }
                    child.stamps_mut().deleted_at = Some(self.now);
                    self.expand(&*child).await?;
                    self.marked.push(child);
                }
            }
            Ok(())
        })
    }

    /// Entities to persist, dependents before their principal.
    pub(crate) fn into_marked(self) -> Vec<Box<dyn AnyEntity>> {
        self.marked
    }
}
