//! Backend seams: reading through [`Queryable`], writing through [`Store`].

use async_trait::async_trait;
use query_core::{CompiledFilter, OrderBy};

use crate::entity::{AnyEntity, Entity, EntityKey};
use crate::error::StoreError;

/// Everything a backend needs to run one read.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub filter: CompiledFilter,
    pub order: OrderBy,
    /// Include soft-deleted rows.
    pub with_deleted: bool,
    /// Whether returned entities are meant to be written back; backends with
    /// an identity map may skip it when false.
    pub tracking: bool,
    /// Relation paths to load together with each row.
    pub include: Vec<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: CompiledFilter::empty(),
            order: OrderBy::empty(),
            with_deleted: false,
            tracking: true,
            include: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

#[async_trait]
pub trait Queryable<E: Entity>: Send + Sync {
    /// Number of rows matching the filter, ignoring order.
    async fn count(&self, query: &QuerySpec) -> Result<u64, StoreError>;

    /// Matching rows in order; `None` returns all of them.
    async fn fetch(&self, query: &QuerySpec, window: Option<Window>) -> Result<Vec<E>, StoreError>;

    /// Count and window evaluated against one consistent state. The default
    /// runs two separate reads; backends that can snapshot should override it.
    async fn count_and_window(
        &self,
        query: &QuerySpec,
        window: Window,
    ) -> Result<(u64, Vec<E>), StoreError> {
        let total = self.count(query).await?;
        let items = self.fetch(query, Some(window)).await?;
        Ok((total, items))
    }
}

#[derive(Debug)]
pub enum Change {
    Insert(Box<dyn AnyEntity>),
    Update(Box<dyn AnyEntity>),
    Remove(EntityKey),
}

impl Change {
    pub fn key(&self) -> EntityKey {
        match self {
            Change::Insert(e) | Change::Update(e) => e.key(),
            Change::Remove(key) => key.clone(),
        }
    }
}

/// Pending writes persisted together by one [`Store::commit`].
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<E: Entity>(&mut self, entity: E) -> &mut Self {
        self.changes.push(Change::Insert(Box::new(entity)));
        self
    }

    pub fn update<E: Entity>(&mut self, entity: E) -> &mut Self {
        self.changes.push(Change::Update(Box::new(entity)));
        self
    }

    pub fn update_boxed(&mut self, entity: Box<dyn AnyEntity>) -> &mut Self {
        self.changes.push(Change::Update(entity));
        self
    }

    pub fn remove<E: Entity>(&mut self, entity: &E) -> &mut Self {
        self.changes.push(Change::Remove(EntityKey::of(entity)));
        self
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist every change or none of them.
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;
}
