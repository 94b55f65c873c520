//! Generic repository: CRUD, dynamic listing and soft delete for one entity type.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use query_core::{
    compile_filter, compile_sort, CompiledFilter, DynamicQuery, FieldSet, Filter, FilterError,
    OrderBy, Page, PageRequest, Sort,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RepositoryConfig;
use crate::entity::Entity;
use crate::error::{RepoError, Result};
use crate::graph::RelationRegistry;
use crate::paginate::paginate;
use crate::soft_delete::{ensure_soft_deletable, Cascade};
use crate::store::{ChangeSet, QuerySpec, Queryable, Store, Window};

/// Read options shared by single and list reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// Relation paths to load with each row, e.g. `orders.lines`.
    pub include: Vec<String>,
    pub with_deleted: bool,
    pub tracking: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            with_deleted: false,
            tracking: true,
        }
    }
}

impl QueryOptions {
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include.push(path.into());
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    pub fn no_tracking(mut self) -> Self {
        self.tracking = false;
        self
    }
}

pub struct Repository<E: Entity, S> {
    store: Arc<S>,
    fields: Arc<FieldSet>,
    relations: Arc<RelationRegistry>,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S> Clone for Repository<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fields: self.fields.clone(),
            relations: self.relations.clone(),
            config: self.config,
            _entity: PhantomData,
        }
    }
}

impl<E, S> Repository<E, S>
where
    E: Entity,
    S: Queryable<E> + Store + 'static,
{
    pub fn new(
        store: Arc<S>,
        fields: FieldSet,
        relations: Arc<RelationRegistry>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            store,
            fields: Arc::new(fields),
            relations,
            config,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Synchronous facade over this repository.
    pub fn blocking(&self) -> BlockingRepository<'_, E, S> {
        BlockingRepository { repo: self }
    }

    /* ---------- writes ---------- */

    #[tracing::instrument(skip_all, fields(entity = E::NAME), level = "debug")]
    pub async fn add(&self, mut entity: E, cancel: &CancellationToken) -> Result<E> {
        entity.timestamps_mut().created_at = Utc::now();
        let mut changes = ChangeSet::new();
        changes.insert(entity.clone());
        self.commit(changes, cancel).await?;
        Ok(entity)
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, count = entities.len()), level = "debug")]
    pub async fn add_range(&self, mut entities: Vec<E>, cancel: &CancellationToken) -> Result<Vec<E>> {
        let now = Utc::now();
        let mut changes = ChangeSet::new();
        for entity in &mut entities {
            entity.timestamps_mut().created_at = now;
            changes.insert(entity.clone());
        }
        self.commit(changes, cancel).await?;
        Ok(entities)
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, id = %entity.id()), level = "debug")]
    pub async fn update(&self, mut entity: E, cancel: &CancellationToken) -> Result<E> {
        entity.timestamps_mut().updated_at = Some(Utc::now());
        let mut changes = ChangeSet::new();
        changes.update(entity.clone());
        self.commit(changes, cancel).await?;
        Ok(entity)
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, count = entities.len()), level = "debug")]
    pub async fn update_range(
        &self,
        mut entities: Vec<E>,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>> {
        let now = Utc::now();
        let mut changes = ChangeSet::new();
        for entity in &mut entities {
            entity.timestamps_mut().updated_at = Some(now);
            changes.update(entity.clone());
        }
        self.commit(changes, cancel).await?;
        Ok(entities)
    }

    /// Delete one entity. Soft delete marks it and its cascading dependents in
    /// one commit; deleting an already deleted entity changes nothing.
    #[tracing::instrument(skip_all, fields(entity = E::NAME, id = %entity.id(), permanent), level = "debug")]
    pub async fn delete(
        &self,
        entity: E,
        permanent: bool,
        cancel: &CancellationToken,
    ) -> Result<E> {
        let mut deleted = self.delete_range(vec![entity], permanent, cancel).await?;
        deleted
            .pop()
            .ok_or_else(|| RepoError::Graph("delete returned no entity".into()))
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, count = entities.len(), permanent), level = "debug")]
    pub async fn delete_range(
        &self,
        mut entities: Vec<E>,
        permanent: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<E>> {
        let mut changes = ChangeSet::new();

        if permanent {
            for entity in &entities {
                changes.remove(entity);
            }
            self.commit(changes, cancel).await?;
            info!(entity = E::NAME, count = entities.len(), "permanently deleted");
            return Ok(entities);
        }

        for entity in &entities {
            ensure_soft_deletable(&self.relations, entity)?;
        }

        let mut cascade = Cascade::new(&self.relations, cancel, Utc::now());
        for entity in &mut entities {
            cascade.mark_root(entity).await?;
        }
        let marked = cascade.into_marked();
        if marked.is_empty() {
            debug!(entity = E::NAME, "already deleted, nothing to do");
            return Ok(entities);
        }

        let total = marked.len();
        for row in marked {
            changes.update_boxed(row);
        }
        self.commit(changes, cancel).await?;
        info!(entity = E::NAME, roots = entities.len(), total, "soft deleted");
        Ok(entities)
    }

    /* ---------- reads ---------- */

    /// First entity matching `predicate`, in store order.
    #[tracing::instrument(skip_all, fields(entity = E::NAME), level = "debug")]
    pub async fn get(
        &self,
        predicate: &Filter,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<E>> {
        let filter = self.compile_predicate(Some(predicate))?;
        let spec = self.spec(filter, OrderBy::empty(), options)?;
        self.check_cancelled(cancel)?;
        let mut rows = self
            .store
            .fetch(&spec, Some(Window { offset: 0, limit: 1 }))
            .await?;
        Ok(rows.pop())
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME, index = page.index(), size = page.size()), level = "debug")]
    pub async fn get_list(
        &self,
        predicate: Option<&Filter>,
        sort: &[Sort],
        options: &QueryOptions,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<E>> {
        let filter = self.compile_predicate(predicate)?;
        let order = compile_sort(sort, &self.fields, &self.config.limits)?;
        let spec = self.spec(filter, order, options)?;
        paginate(self.store.as_ref(), &spec, self.clamp(page), cancel).await
    }

    /// List with a client-supplied filter and sort. The server `predicate`
    /// is conjoined ahead of the client filter, so its placeholders come first.
    #[tracing::instrument(skip_all, fields(entity = E::NAME, index = page.index(), size = page.size()), level = "debug")]
    pub async fn get_list_by_dynamic(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Filter>,
        options: &QueryOptions,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<E>> {
        let compiled = dynamic.compile(&self.fields, &self.config.limits)?;
        let filter = self.compile_predicate(predicate)?.and(compiled.filter);
        debug!(filter = %filter, order = %compiled.order.to_signed_tokens(), "dynamic query compiled");
        let spec = self.spec(filter, compiled.order, options)?;
        paginate(self.store.as_ref(), &spec, self.clamp(page), cancel).await
    }

    #[tracing::instrument(skip_all, fields(entity = E::NAME), level = "debug")]
    pub async fn any(
        &self,
        predicate: Option<&Filter>,
        with_deleted: bool,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let filter = self.compile_predicate(predicate)?;
        let options = QueryOptions {
            with_deleted,
            tracking: false,
            ..QueryOptions::default()
        };
        let spec = self.spec(filter, OrderBy::empty(), &options)?;
        self.check_cancelled(cancel)?;
        let rows = self
            .store
            .fetch(&spec, Some(Window { offset: 0, limit: 1 }))
            .await?;
        Ok(!rows.is_empty())
    }

    /* ---------- helpers ---------- */

    fn compile_predicate(&self, predicate: Option<&Filter>) -> Result<CompiledFilter> {
        match predicate {
            Some(root) => Ok(compile_filter(root, &self.fields, &self.config.limits)?),
            None => Ok(CompiledFilter::empty()),
        }
    }

    fn spec(&self, filter: CompiledFilter, order: OrderBy, options: &QueryOptions) -> Result<QuerySpec> {
        for path in &options.include {
            if self.relations.resolve_path(E::NAME, path).is_none() {
                return Err(query_core::Error::from(FilterError::UnknownField(path.clone())).into());
            }
        }
        Ok(QuerySpec {
            filter,
            order,
            with_deleted: options.with_deleted,
            tracking: options.tracking,
            include: options.include.clone(),
        })
    }

    fn clamp(&self, page: PageRequest) -> PageRequest {
        let clamped = page.clamp_size(self.config.max_page_size);
        if clamped.size() != page.size() {
            debug!(requested = page.size(), max = self.config.max_page_size, "page size clamped");
        }
        clamped
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        Ok(())
    }

    async fn commit(&self, changes: ChangeSet, cancel: &CancellationToken) -> Result<()> {
        self.check_cancelled(cancel)?;
        self.store.commit(changes).await?;
        Ok(())
    }
}

/// Blocking variants of every [`Repository`] operation.
///
/// Each call drives the async operation to completion on the current thread.
/// Calling from inside a Tokio runtime would stall a worker, so it fails with
/// [`RepoError::NotSupported`] there.
pub struct BlockingRepository<'r, E: Entity, S> {
    repo: &'r Repository<E, S>,
}

impl<E, S> BlockingRepository<'_, E, S>
where
    E: Entity,
    S: Queryable<E> + Store + 'static,
{
    fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(RepoError::NotSupported(
                "blocking repository call inside an async runtime",
            ));
        }
        futures::executor::block_on(fut)
    }

    pub fn add(&self, entity: E) -> Result<E> {
        self.run(self.repo.add(entity, &CancellationToken::new()))
    }

    pub fn add_range(&self, entities: Vec<E>) -> Result<Vec<E>> {
        self.run(self.repo.add_range(entities, &CancellationToken::new()))
    }

    pub fn update(&self, entity: E) -> Result<E> {
        self.run(self.repo.update(entity, &CancellationToken::new()))
    }

    pub fn update_range(&self, entities: Vec<E>) -> Result<Vec<E>> {
        self.run(self.repo.update_range(entities, &CancellationToken::new()))
    }

    pub fn delete(&self, entity: E, permanent: bool) -> Result<E> {
        self.run(self.repo.delete(entity, permanent, &CancellationToken::new()))
    }

    pub fn delete_range(&self, entities: Vec<E>, permanent: bool) -> Result<Vec<E>> {
        self.run(self.repo.delete_range(entities, permanent, &CancellationToken::new()))
    }

    pub fn get(&self, predicate: &Filter, options: &QueryOptions) -> Result<Option<E>> {
        self.run(self.repo.get(predicate, options, &CancellationToken::new()))
    }

    pub fn get_list(
        &self,
        predicate: Option<&Filter>,
        sort: &[Sort],
        options: &QueryOptions,
        page: PageRequest,
    ) -> Result<Page<E>> {
        self.run(self.repo.get_list(predicate, sort, options, page, &CancellationToken::new()))
    }

    pub fn get_list_by_dynamic(
        &self,
        dynamic: &DynamicQuery,
        predicate: Option<&Filter>,
        options: &QueryOptions,
        page: PageRequest,
    ) -> Result<Page<E>> {
        self.run(
            self.repo
                .get_list_by_dynamic(dynamic, predicate, options, page, &CancellationToken::new()),
        )
    }

    pub fn any(&self, predicate: Option<&Filter>, with_deleted: bool) -> Result<bool> {
        self.run(self.repo.any(predicate, with_deleted, &CancellationToken::new()))
    }
}

