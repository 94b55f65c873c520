//! Compiled filter/order → SeaORM `Condition` and `ORDER BY`.
//!
//! Null handling follows the in-memory evaluator: `!=`, negated text matches
//! and `isnotempty` also match rows where the column is NULL.

use std::collections::HashMap;

use query_core::ast::{CompareOperator, Expr as Ast, TextFunction};
use query_core::{CompiledFilter, FieldKind, OrderBy, SortDir, Value};
use sea_orm::{
    sea_query::{Expr, Order},
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Select,
};
use thiserror::Error;

use crate::store::QuerySpec;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no column mapped for field path '{0}'")]
    UnmappedField(String),
    #[error("parameter @{0} is missing or does not fit its field")]
    BadParameter(usize),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Field path → column of one SeaORM entity.
#[derive(Clone)]
pub struct ColumnMap<E: EntityTrait> {
    map: HashMap<String, E::Column>,
    deleted_at: Option<E::Column>,
}

impl<E: EntityTrait> Default for ColumnMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> ColumnMap<E> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            deleted_at: None,
        }
    }

    pub fn insert(mut self, path: impl Into<String>, col: E::Column) -> Self {
        self.map.insert(path.into(), col);
        self
    }

    /// Column holding the soft-delete timestamp.
    pub fn soft_delete(mut self, col: E::Column) -> Self {
        self.deleted_at = Some(col);
        self
    }

    pub fn get(&self, path: &str) -> Option<&E::Column> {
        self.map.get(path)
    }
}

fn to_sea_value(value: Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => sea_orm::Value::Bool(Some(b)),
        Value::I64(i) => sea_orm::Value::BigInt(Some(i)),
        Value::F64(f) => sea_orm::Value::Double(Some(f)),
        Value::String(s) => sea_orm::Value::String(Some(Box::new(s))),
        Value::Uuid(u) => sea_orm::Value::Uuid(Some(Box::new(u))),
        Value::DateTime(dt) => sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(dt))),
        Value::Date(d) => sea_orm::Value::ChronoDate(Some(Box::new(d))),
    }
}

fn coerce(kind: FieldKind, params: &[String], index: usize) -> RenderResult<sea_orm::Value> {
    params
        .get(index)
        .and_then(|raw| Value::parse(kind, raw))
        .map(to_sea_value)
        .ok_or(RenderError::BadParameter(index))
}

/* ---------- LIKE helpers ---------- */

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

fn like_pattern(func: TextFunction, s: &str) -> String {
    let s = like_escape(s);
    match func {
        TextFunction::Contains => format!("%{s}%"),
        TextFunction::StartsWith => format!("{s}%"),
        TextFunction::EndsWith => format!("%{s}"),
    }
}

fn column<E: EntityTrait>(cols: &ColumnMap<E>, path: &str) -> RenderResult<E::Column>
where
    E::Column: Copy,
{
    cols.get(path)
        .copied()
        .ok_or_else(|| RenderError::UnmappedField(path.to_string()))
}

pub fn expr_to_condition<E: EntityTrait>(
    expr: &Ast,
    params: &[String],
    cols: &ColumnMap<E>,
) -> RenderResult<Condition>
where
    E::Column: ColumnTrait + Copy,
{
    Ok(match expr {
        Ast::And(items) => {
            let mut cond = Condition::all();
            for item in items {
                cond = cond.add(expr_to_condition(item, params, cols)?);
            }
            cond
        }
        Ast::Or(items) => {
            let mut cond = Condition::any();
            for item in items {
                cond = cond.add(expr_to_condition(item, params, cols)?);
            }
            cond
        }
        Ast::Not(inner) => {
            let negated = Condition::all().not().add(expr_to_condition(inner, params, cols)?);
            match &**inner {
                // NOT (col LIKE x) is NULL for a NULL column; keep those rows
                Ast::Text { field, .. } => Condition::any()
                    .add(Expr::col(column(cols, &field.path)?).is_null())
                    .add(negated),
                _ => negated,
            }
        }
        Ast::Compare { field, op, param } => {
            let col = column(cols, &field.path)?;
            let v = coerce(field.kind, params, *param)?;
            match op {
                CompareOperator::Eq => Condition::all().add(Expr::col(col).eq(v)),
                CompareOperator::Ne => Condition::any()
                    .add(Expr::col(col).is_null())
                    .add(Expr::col(col).ne(v)),
                CompareOperator::Gt => Condition::all().add(Expr::col(col).gt(v)),
                CompareOperator::Ge => Condition::all().add(Expr::col(col).gte(v)),
                CompareOperator::Lt => Condition::all().add(Expr::col(col).lt(v)),
                CompareOperator::Le => Condition::all().add(Expr::col(col).lte(v)),
            }
        }
        Ast::Text { field, func, param } => {
            let col = column(cols, &field.path)?;
            let needle = params
                .get(*param)
                .ok_or(RenderError::BadParameter(*param))?;
            Condition::all().add(Expr::col(col).like(like_pattern(*func, needle)))
        }
        Ast::IsNull(field) => Condition::all().add(Expr::col(column(cols, &field.path)?).is_null()),
        Ast::IsNotNull(field) => {
            Condition::all().add(Expr::col(column(cols, &field.path)?).is_not_null())
        }
        Ast::IsEmpty(field) => Condition::all().add(Expr::col(column(cols, &field.path)?).eq("")),
        Ast::IsNotEmpty(field) => {
            let col = column(cols, &field.path)?;
            Condition::any()
                .add(Expr::col(col).is_null())
                .add(Expr::col(col).ne(""))
        }
    })
}

/// Apply compiled queries to a plain SeaORM `Select<E>`.
pub trait CompiledQueryExt<E: EntityTrait>: Sized {
    fn apply_filter(self, filter: &CompiledFilter, cols: &ColumnMap<E>) -> RenderResult<Self>;
    fn apply_order(self, order: &OrderBy, cols: &ColumnMap<E>) -> RenderResult<Self>;
    /// Filter, order and the soft-delete exclusion unless `with_deleted`.
    fn apply_query_spec(self, spec: &QuerySpec, cols: &ColumnMap<E>) -> RenderResult<Self>;
}

impl<E> CompiledQueryExt<E> for Select<E>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    fn apply_filter(self, filter: &CompiledFilter, cols: &ColumnMap<E>) -> RenderResult<Self> {
        match &filter.expr {
            Some(expr) => Ok(self.filter(expr_to_condition(expr, &filter.params, cols)?)),
            None => Ok(self),
        }
    }

    fn apply_order(self, order: &OrderBy, cols: &ColumnMap<E>) -> RenderResult<Self> {
        let mut query = self;
        for key in order.keys() {
            let col = column(cols, &key.field.path)?;
            let sea_order = match key.dir {
                SortDir::Asc => Order::Asc,
                SortDir::Desc => Order::Desc,
            };
            query = query.order_by(col, sea_order);
        }
        Ok(query)
    }

    fn apply_query_spec(self, spec: &QuerySpec, cols: &ColumnMap<E>) -> RenderResult<Self> {
        let mut query = self.apply_filter(&spec.filter, cols)?;
        if !spec.with_deleted {
            if let Some(col) = cols.deleted_at {
                query = query.filter(Expr::col(col).is_null());
            }
        }
        query.apply_order(&spec.order, cols)
    }
}
