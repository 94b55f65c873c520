//! Entity contract and its type-erased form used for graph traversal.

use std::any::Any;
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use query_core::Value;
use serde::{Deserialize, Serialize};

/// Audit timestamps every persisted entity carries.
///
/// `deleted_at` doubles as the soft-delete marker: an entity is deleted iff it
/// is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn created(at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            ..Self::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Value of `created_at`, `updated_at` or `deleted_at` by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "created_at" => Some(self.created_at.into()),
            "updated_at" => Some(self.updated_at.into()),
            "deleted_at" => Some(self.deleted_at.into()),
            _ => None,
        }
    }
}

pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Entity type name, unique within one relation registry.
    const NAME: &'static str;

    fn id(&self) -> &Self::Id;
    fn timestamps(&self) -> &Timestamps;
    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn is_deleted(&self) -> bool {
        self.timestamps().is_deleted()
    }
}

/// Identity of one entity instance across types: `(type name, rendered id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub entity: &'static str,
    pub id: String,
}

impl EntityKey {
    pub fn of<E: Entity>(entity: &E) -> Self {
        Self {
            entity: E::NAME,
            id: entity.id().to_string(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

/// Object-safe view of an [`Entity`], so heterogeneous rows can travel
/// through one change set or one graph walk.
pub trait AnyEntity: Send + Sync + 'static {
    fn entity_name(&self) -> &'static str;
    fn key(&self) -> EntityKey;
    fn stamps(&self) -> &Timestamps;
    fn stamps_mut(&mut self) -> &mut Timestamps;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    fn clone_boxed(&self) -> Box<dyn AnyEntity>;
}

impl<E: Entity> AnyEntity for E {
    fn entity_name(&self) -> &'static str {
        E::NAME
    }

    fn key(&self) -> EntityKey {
        EntityKey::of(self)
    }

    fn stamps(&self) -> &Timestamps {
        self.timestamps()
    }

    fn stamps_mut(&mut self) -> &mut Timestamps {
        self.timestamps_mut()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn AnyEntity> {
        Box::new(self.clone())
    }
}

impl dyn AnyEntity {
    pub fn downcast_ref<E: Entity>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    pub fn is_deleted(&self) -> bool {
        self.stamps().is_deleted()
    }
}

impl Clone for Box<dyn AnyEntity> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl fmt::Debug for dyn AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEntity")
            .field("key", &self.key())
            .field("deleted_at", &self.stamps().deleted_at)
            .finish()
    }
}
