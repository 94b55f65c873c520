//! Generic repository over a queryable store.
//!
//! A [`Repository`] couples an entity type with its whitelisted [`FieldSet`],
//! the [`RelationRegistry`] describing its entity graph and a storage backend
//! implementing [`Queryable`] and [`Store`]. It offers CRUD, dynamic filtered
//! and paginated listing, and cascading soft delete.
//!
//! # Features
//! - `sea-orm`: render compiled filters and orderings onto SeaORM selects
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use repokit::{MemoryStore, RelationRegistry, Repository, RepositoryConfig};
//! use query_core::{FieldKind, FieldSet};
//!
//! # #[derive(Clone)] struct Customer { id: u64, ts: repokit::Timestamps }
//! # impl repokit::Entity for Customer {
//! #     type Id = u64;
//! #     const NAME: &'static str = "Customer";
//! #     fn id(&self) -> &u64 { &self.id }
//! #     fn timestamps(&self) -> &repokit::Timestamps { &self.ts }
//! #     fn timestamps_mut(&mut self) -> &mut repokit::Timestamps { &mut self.ts }
//! # }
//! # impl repokit::Record for Customer {
//! #     fn field(&self, _: &str) -> Option<query_core::Value> { None }
//! # }
//! let store = Arc::new(MemoryStore::new());
//! let fields = FieldSet::new().insert("lastName", FieldKind::String);
//! let repo: Repository<Customer, MemoryStore> = Repository::new(
//!     store,
//!     fields,
//!     Arc::new(RelationRegistry::new()),
//!     RepositoryConfig::default(),
//! );
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod memory;
pub mod paginate;
pub mod repository;
#[cfg(feature = "sea-orm")]
pub mod sea;
mod soft_delete;
pub mod store;

pub use config::RepositoryConfig;
pub use entity::{AnyEntity, Entity, EntityKey, Timestamps};
pub use error::{RepoError, Result, StoreError};
pub use graph::{Cardinality, DeletePolicy, Relation, RelationBuilder, RelationLoader, RelationRegistry};
pub use memory::{MemoryStore, Record};
pub use paginate::paginate;
pub use repository::{BlockingRepository, QueryOptions, Repository};
pub use store::{Change, ChangeSet, QuerySpec, Queryable, Store, Window};

pub use query_core;
pub use tokio_util::sync::CancellationToken;
