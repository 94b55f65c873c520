//! In-process backend: tables of type-erased rows behind one lock.
//!
//! Filters are evaluated directly against [`Record`] field values with
//! null-safe semantics: a comparison against a missing value is false, except
//! `!=` and negated text matches, which are true.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use query_core::ast::{CompareOperator, Expr};
use query_core::{OrderBy, SortDir, Value};
use tracing::debug;

use crate::entity::{AnyEntity, Entity, EntityKey};
use crate::error::StoreError;
use crate::store::{Change, ChangeSet, QuerySpec, Queryable, Store, Window};

/// Field access by dotted path, used to evaluate filters and orderings.
pub trait Record {
    /// `None` when the path does not resolve, which is treated like null.
    fn field(&self, path: &str) -> Option<Value>;
}

#[derive(Default)]
struct Table {
    rows: Vec<Box<dyn AnyEntity>>,
    index: HashMap<String, usize>,
}

impl Table {
    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn insert(&mut self, row: Box<dyn AnyEntity>) {
        self.index.insert(row.key().id, self.rows.len());
        self.rows.push(row);
    }

    fn replace(&mut self, row: Box<dyn AnyEntity>) {
        if let Some(&i) = self.index.get(&row.key().id) {
            self.rows[i] = row;
        }
    }

    fn remove(&mut self, id: &str) {
        if let Some(i) = self.index.remove(id) {
            self.rows.remove(i);
            for slot in self.index.values_mut() {
                if *slot > i {
                    *slot -= 1;
                }
            }
        }
    }
}

/// Rows keep insertion order, which is the order of unsorted reads.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Table>>,
    commits: AtomicU64,
    last_query: Mutex<Option<QuerySpec>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(AtomicOrdering::SeqCst)
    }

    /// The most recent query spec handed to a read.
    pub fn last_query(&self) -> Option<QuerySpec> {
        self.last_query.lock().clone()
    }

    /// All rows of `E` passing `pred`, in insertion order.
    pub fn scan<E: Entity>(&self, with_deleted: bool, pred: impl Fn(&E) -> bool) -> Vec<E> {
        let tables = self.tables.read();
        let Some(table) = tables.get(E::NAME) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .filter_map(|row| row.downcast_ref::<E>())
            .filter(|e| with_deleted || !e.is_deleted())
            .filter(|e| pred(e))
            .cloned()
            .collect()
    }

    /// Row by id regardless of its deleted state.
    pub fn find<E: Entity>(&self, id: &E::Id) -> Option<E> {
        let tables = self.tables.read();
        let table = tables.get(E::NAME)?;
        let i = *table.index.get(&id.to_string())?;
        table.rows[i].downcast_ref::<E>().cloned()
    }

    fn select<E: Entity + Record>(&self, query: &QuerySpec) -> Result<Vec<E>, StoreError> {
        *self.last_query.lock() = Some(query.clone());
        let mut rows = Vec::new();
        for row in self.scan::<E>(query.with_deleted, |_| true) {
            let keep = match &query.filter.expr {
                Some(expr) => eval(expr, &row, &query.filter.params)?,
                None => true,
            };
            if keep {
                rows.push(row);
            }
        }
        sort_rows(&mut rows, &query.order);
        Ok(rows)
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut tables = self.tables.write();

        // Validate the whole batch against the projected state first.
        let mut projected: HashMap<EntityKey, bool> = HashMap::new();
        for change in changes.iter() {
            let key = change.key();
            let exists = projected.get(&key).copied().unwrap_or_else(|| {
                tables
                    .get(key.entity)
                    .is_some_and(|t| t.contains(&key.id))
            });
            match change {
                Change::Insert(_) if exists => return Err(StoreError::DuplicateKey(key)),
                Change::Insert(_) => {
                    projected.insert(key, true);
                }
                Change::Update(_) if !exists => return Err(StoreError::Missing(key)),
                Change::Update(_) => {}
                Change::Remove(_) if !exists => return Err(StoreError::Missing(key)),
                Change::Remove(_) => {
                    projected.insert(key, false);
                }
            }
        }

        let applied = changes.len();
        for change in changes {
            match change {
                Change::Insert(row) => tables.entry(row.entity_name()).or_default().insert(row),
                Change::Update(row) => tables.entry(row.entity_name()).or_default().replace(row),
                Change::Remove(key) => tables.entry(key.entity).or_default().remove(&key.id),
            }
        }
        self.commits.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(changes = applied, "memory store commit");
        Ok(())
    }
}

fn window<E>(rows: Vec<E>, window: Window) -> Vec<E> {
    let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);
    rows.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl<E: Entity + Record> Queryable<E> for MemoryStore {
    async fn count(&self, query: &QuerySpec) -> Result<u64, StoreError> {
        Ok(self.select::<E>(query)?.len() as u64)
    }

    async fn fetch(&self, query: &QuerySpec, range: Option<Window>) -> Result<Vec<E>, StoreError> {
        let rows = self.select::<E>(query)?;
        Ok(match range {
            Some(range) => window(rows, range),
            None => rows,
        })
    }

    async fn count_and_window(
        &self,
        query: &QuerySpec,
        range: Window,
    ) -> Result<(u64, Vec<E>), StoreError> {
        // Count and window come from the same selection.
        let rows = self.select::<E>(query)?;
        let total = rows.len() as u64;
        Ok((total, window(rows, range)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        self.apply(changes)
    }
}

fn param(params: &[String], index: usize) -> Result<&str, StoreError> {
    params
        .get(index)
        .map(String::as_str)
        .ok_or(StoreError::BadParameter(index))
}

/// Evaluate a compiled predicate against one record.
pub fn eval<R: Record + ?Sized>(expr: &Expr, record: &R, params: &[String]) -> Result<bool, StoreError> {
    Ok(match expr {
        Expr::And(items) => {
            for item in items {
                if !eval(item, record, params)? {
                    return Ok(false);
                }
            }
            true
        }
        Expr::Or(items) => {
            for item in items {
                if eval(item, record, params)? {
                    return Ok(true);
                }
            }
            false
        }
        Expr::Not(inner) => !eval(inner, record, params)?,
        Expr::Compare { field, op, param: i } => {
            let rhs = Value::parse(field.kind, param(params, *i)?)
                .ok_or(StoreError::BadParameter(*i))?;
            let lhs = record.field(&field.path).unwrap_or(Value::Null);
            if lhs.is_null() {
                return Ok(*op == CompareOperator::Ne);
            }
            match lhs.compare(&rhs) {
                Some(ord) => op.matches(ord),
                None => {
                    return Err(StoreError::TypeMismatch {
                        field: field.path.clone(),
                        expected: field.kind,
                        found: lhs.type_name(),
                    })
                }
            }
        }
        Expr::Text { field, func, param: i } => {
            let needle = param(params, *i)?;
            match record.field(&field.path) {
                Some(Value::String(s)) => func.matches(&s, needle),
                Some(Value::Null) | None => false,
                Some(other) => {
                    return Err(StoreError::TypeMismatch {
                        field: field.path.clone(),
                        expected: field.kind,
                        found: other.type_name(),
                    })
                }
            }
        }
        Expr::IsNull(field) => record.field(&field.path).map_or(true, |v| v.is_null()),
        Expr::IsNotNull(field) => !record.field(&field.path).map_or(true, |v| v.is_null()),
        Expr::IsEmpty(field) => is_empty_string(record, &field.path),
        Expr::IsNotEmpty(field) => !is_empty_string(record, &field.path),
    })
}

fn is_empty_string<R: Record + ?Sized>(record: &R, path: &str) -> bool {
    matches!(record.field(path), Some(Value::String(s)) if s.is_empty())
}

/// Stable multi-key sort; incomparable values count as equal.
fn sort_rows<R: Record>(rows: &mut [R], order: &OrderBy) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in order.keys() {
            let left = a.field(&key.field.path).unwrap_or(Value::Null);
            let right = b.field(&key.field.path).unwrap_or(Value::Null);
            let ord = left.compare(&right).unwrap_or(Ordering::Equal);
            let ord = match key.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
