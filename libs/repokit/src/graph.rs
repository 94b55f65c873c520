//! Relation metadata between entity types.
//!
//! The registry is built once at startup and shared. Soft delete walks it to
//! find dependents; reads use it to validate `include` paths.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::entity::{AnyEntity, Entity};
use crate::error::{RepoError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

/// What happens to dependents when the principal is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeletePolicy {
    Cascade,
    ClientCascade,
    SetNull,
    Restrict,
    NoAction,
}

impl DeletePolicy {
    pub fn cascades(self) -> bool {
        matches!(self, DeletePolicy::Cascade | DeletePolicy::ClientCascade)
    }
}

/// Resolves the entities reachable from one parent through one relation.
#[async_trait]
pub trait RelationLoader: Send + Sync {
    /// Related entities already held by the parent value, if it carries them.
    fn materialized(&self, parent: &dyn AnyEntity) -> Option<Vec<Box<dyn AnyEntity>>>;

    /// Current related rows from the store, soft-deleted rows excluded.
    async fn load(&self, parent: &dyn AnyEntity) -> Result<Vec<Box<dyn AnyEntity>>>;
}

type FetchFn<P, C> =
    Arc<dyn Fn(<P as Entity>::Id) -> BoxFuture<'static, Result<Vec<C>>> + Send + Sync>;
type MaterializedFn<P, C> = Arc<dyn Fn(&P) -> Option<Vec<C>> + Send + Sync>;

struct TypedLoader<P: Entity, C: Entity> {
    fetch: Option<FetchFn<P, C>>,
    materialized: Option<MaterializedFn<P, C>>,
}

impl<P: Entity, C: Entity> TypedLoader<P, C> {
    fn parent<'a>(&self, parent: &'a dyn AnyEntity) -> Result<&'a P> {
        parent.downcast_ref::<P>().ok_or_else(|| {
            RepoError::Graph(format!(
                "relation loader expects {} but got {}",
                P::NAME,
                parent.entity_name()
            ))
        })
    }
}

#[async_trait]
impl<P: Entity, C: Entity> RelationLoader for TypedLoader<P, C> {
    fn materialized(&self, parent: &dyn AnyEntity) -> Option<Vec<Box<dyn AnyEntity>>> {
        let accessor = self.materialized.as_ref()?;
        let parent = parent.downcast_ref::<P>()?;
        let items = accessor(parent)?;
        Some(
            items
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn AnyEntity>)
                .collect(),
        )
    }

    async fn load(&self, parent: &dyn AnyEntity) -> Result<Vec<Box<dyn AnyEntity>>> {
        let Some(fetch) = &self.fetch else {
            return Ok(Vec::new());
        };
        let id = self.parent(parent)?.id().clone();
        let rows = fetch(id).await?;
        Ok(rows
            .into_iter()
            .filter(|c| !c.is_deleted())
            .map(|c| Box::new(c) as Box<dyn AnyEntity>)
            .collect())
    }
}

/// One navigation from an entity type to a related type.
#[derive(Clone)]
pub struct Relation {
    pub name: &'static str,
    pub target: &'static str,
    pub cardinality: Cardinality,
    /// Cardinality of the way back, `None` when the relation is unidirectional.
    pub inverse: Option<Cardinality>,
    pub on_delete: DeletePolicy,
    /// Owned values live inside the owner's row and share its lifecycle.
    pub owned: bool,
    /// Set on the side that holds the foreign key; deletes never cascade from it.
    pub dependent_side: bool,
    pub loader: Option<Arc<dyn RelationLoader>>,
}

impl Relation {
    /// Principal side of a one-to-many: `P` has many `C`.
    pub fn many<P: Entity, C: Entity>(name: &'static str) -> RelationBuilder<P, C> {
        RelationBuilder::new(name, Cardinality::Many, Some(Cardinality::One))
    }

    /// Principal side of a one-to-one: `P` has at most one `C`.
    pub fn one<P: Entity, C: Entity>(name: &'static str) -> RelationBuilder<P, C> {
        RelationBuilder::new(name, Cardinality::One, Some(Cardinality::One))
    }

    /// Dependent side of a one-to-many: `C` belongs to one `P`.
    pub fn belongs_to<C: Entity, P: Entity>(name: &'static str) -> RelationBuilder<C, P> {
        RelationBuilder::new(name, Cardinality::One, Some(Cardinality::Many))
            .dependent()
            .on_delete(DeletePolicy::NoAction)
    }

    /// Single reference whose other end does not navigate back to many owners.
    pub fn is_one_to_one(&self) -> bool {
        self.cardinality == Cardinality::One && self.inverse != Some(Cardinality::Many)
    }

    /// Whether soft delete follows this relation from the principal.
    pub fn cascades_soft_delete(&self) -> bool {
        !self.dependent_side && !self.owned && self.on_delete.cascades()
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("cardinality", &self.cardinality)
            .field("inverse", &self.inverse)
            .field("on_delete", &self.on_delete)
            .field("owned", &self.owned)
            .field("dependent_side", &self.dependent_side)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

/// Typed builder; erases `P` and `C` once [`build`](Self::build) is called.
pub struct RelationBuilder<P: Entity, C: Entity> {
    relation: Relation,
    fetch: Option<FetchFn<P, C>>,
    materialized: Option<MaterializedFn<P, C>>,
    _types: PhantomData<fn(P) -> C>,
}

impl<P: Entity, C: Entity> RelationBuilder<P, C> {
    fn new(name: &'static str, cardinality: Cardinality, inverse: Option<Cardinality>) -> Self {
        Self {
            relation: Relation {
                name,
                target: C::NAME,
                cardinality,
                inverse,
                on_delete: DeletePolicy::Cascade,
                owned: false,
                dependent_side: false,
                loader: None,
            },
            fetch: None,
            materialized: None,
            _types: PhantomData,
        }
    }

    pub fn on_delete(mut self, policy: DeletePolicy) -> Self {
        self.relation.on_delete = policy;
        self
    }

    pub fn inverse(mut self, inverse: Option<Cardinality>) -> Self {
        self.relation.inverse = inverse;
        self
    }

    pub fn owned(mut self) -> Self {
        self.relation.owned = true;
        self
    }

    pub fn dependent(mut self) -> Self {
        self.relation.dependent_side = true;
        self
    }

    /// How to fetch the related rows for a parent id.
    pub fn load_with<F, Fut>(mut self, fetch: F) -> Self
    where
        F: Fn(P::Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<C>>> + Send + 'static,
    {
        self.fetch = Some(Arc::new(move |id: P::Id| fetch(id).boxed()));
        self
    }

    /// Like [`load_with`](Self::load_with) for a single optional row.
    pub fn load_one_with<F, Fut>(self, fetch: F) -> Self
    where
        F: Fn(P::Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<C>>> + Send + 'static,
    {
        self.load_with(move |id: P::Id| {
            fetch(id).map(|row| row.map(|c| c.into_iter().collect::<Vec<C>>()))
        })
    }

    /// Read related values the parent already holds in memory. Returning
    /// `None` means "not loaded", which falls back to the fetch.
    pub fn materialized<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&P) -> Option<Vec<C>> + Send + Sync + 'static,
    {
        self.materialized = Some(Arc::new(accessor));
        self
    }

    pub fn build(self) -> Relation {
        let mut relation = self.relation;
        if self.fetch.is_some() || self.materialized.is_some() {
            relation.loader = Some(Arc::new(TypedLoader::<P, C> {
                fetch: self.fetch,
                materialized: self.materialized,
            }));
        }
        relation
    }
}

/// Relations keyed by the entity type they start from.
#[derive(Clone, Debug, Default)]
pub struct RelationRegistry {
    map: HashMap<&'static str, Vec<Relation>>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation navigable from `E`. A later relation with the same
    /// name replaces the earlier one.
    pub fn register<E: Entity>(&mut self, relation: Relation) -> &mut Self {
        let list = self.map.entry(E::NAME).or_default();
        list.retain(|r| r.name != relation.name);
        list.push(relation);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<E: Entity>(mut self, relation: Relation) -> Self {
        self.register::<E>(relation);
        self
    }

    pub fn relations(&self, entity: &str) -> &[Relation] {
        self.map.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, entity: &str, name: &str) -> Option<&Relation> {
        self.relations(entity)
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Check a dotted include path such as `orders.lines` starting at `entity`.
    pub fn resolve_path(&self, entity: &str, path: &str) -> Option<Vec<&Relation>> {
        let mut current = entity;
        let mut hops = Vec::new();
        for segment in path.split('.') {
            let relation = self.find(current, segment.trim())?;
            current = relation.target;
            hops.push(relation);
        }
        Some(hops)
    }
}
