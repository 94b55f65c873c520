//! Filter tree → [`Expr`] + positional parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::error::{FilterError, Result};
use crate::filter::{DynamicQuery, Filter, Logic, Operator};
use crate::order::{compile_sort, OrderBy};
use crate::schema::{FieldKind, FieldRef, FieldSet, Value};

/// Upper bounds applied while compiling client input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileLimits {
    pub max_filter_nodes: usize,
    pub max_sort_keys: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_filter_nodes: 2000,
            max_sort_keys: 10,
        }
    }
}

/// A compiled predicate. `expr` is `None` when the tree produced no condition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledFilter {
    pub expr: Option<Expr>,
    /// Literal values in placeholder order: `@i` reads `params[i]`.
    pub params: Vec<String>,
}

impl CompiledFilter {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    /// Conjoin `self AND other`; `other`'s placeholders are renumbered after ours.
    pub fn and(self, other: CompiledFilter) -> CompiledFilter {
        match (self.expr, other.expr) {
            (None, None) => CompiledFilter::empty(),
            (Some(expr), None) => CompiledFilter {
                expr: Some(expr),
                params: self.params,
            },
            (None, Some(expr)) => CompiledFilter {
                expr: Some(expr),
                params: other.params,
            },
            (Some(left), Some(mut right)) => {
                right.shift_params(self.params.len());
                let mut params = self.params;
                params.extend(other.params);
                CompiledFilter {
                    expr: Some(Expr::And(vec![left, right])),
                    params,
                }
            }
        }
    }

    /// Parameter `i`, coerced to the kind of the field that reads it.
    pub fn param(&self, index: usize, kind: FieldKind) -> Option<Value> {
        self.params
            .get(index)
            .and_then(|raw| Value::parse(kind, raw))
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Some(expr) => expr.fmt(f),
            None => Ok(()),
        }
    }
}

/// Compile a filter tree against the declared fields of an entity.
///
/// Nodes are visited in pre-order; every node that carries a value takes the
/// next placeholder index, so compiling the same tree twice yields the same
/// expression and parameter order.
pub fn compile_filter(
    root: &Filter,
    fields: &FieldSet,
    limits: &CompileLimits,
) -> Result<CompiledFilter> {
    if root.node_count() > limits.max_filter_nodes {
        return Err(FilterError::TooManyNodes(limits.max_filter_nodes).into());
    }
    let mut params = Vec::new();
    let expr = compile_node(root, fields, &mut params)?;
    Ok(CompiledFilter { expr, params })
}

fn compile_node(
    node: &Filter,
    fields: &FieldSet,
    params: &mut Vec<String>,
) -> std::result::Result<Option<Expr>, FilterError> {
    if node.field.trim().is_empty() {
        return Err(FilterError::EmptyField);
    }
    let op: Operator = node.operator.parse()?;
    let field = fields
        .get(&node.field)
        .ok_or_else(|| FilterError::UnknownField(node.field.clone()))?;

    let own = leaf_predicate(node, op, field, params)?;
    if node.filters.is_empty() {
        return Ok(own);
    }

    let logic: Logic = match node.logic.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse()?,
        _ => {
            return Err(FilterError::MissingLogic {
                field: node.field.clone(),
            })
        }
    };

    let mut children = Vec::with_capacity(node.filters.len());
    for child in &node.filters {
        if let Some(expr) = compile_node(child, fields, params)? {
            children.push(expr);
        }
    }
    let group = (!children.is_empty()).then(|| logic.combine(children));

    Ok(match (own, group) {
        (Some(own), Some(group)) => Some(logic.combine(vec![own, group])),
        (own, group) => own.or(group),
    })
}

fn leaf_predicate(
    node: &Filter,
    op: Operator,
    field: &FieldRef,
    params: &mut Vec<String>,
) -> std::result::Result<Option<Expr>, FilterError> {
    let expr = match op {
        Operator::IsNull => Expr::IsNull(field.clone()),
        Operator::IsNotNull => Expr::IsNotNull(field.clone()),
        Operator::IsEmpty => {
            ensure_string_field(node, op, field)?;
            Expr::IsEmpty(field.clone())
        }
        Operator::IsNotEmpty => {
            ensure_string_field(node, op, field)?;
            Expr::IsNotEmpty(field.clone())
        }
        _ => return value_predicate(node, op, field, params),
    };
    Ok(Some(expr))
}

fn value_predicate(
    node: &Filter,
    op: Operator,
    field: &FieldRef,
    params: &mut Vec<String>,
) -> std::result::Result<Option<Expr>, FilterError> {
    // An absent or empty value means "no condition" for value operators.
    let Some(value) = node.value.as_deref().filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let param = params.len();

    let expr = match (op.compare_operator(), op.text_function()) {
        (Some(cmp), _) => Expr::Compare {
            field: field.clone(),
            op: cmp,
            param,
        },
        (None, Some((func, negated))) => {
            ensure_string_field(node, op, field)?;
            let text = Expr::Text {
                field: field.clone(),
                func,
                param,
            };
            if negated {
                Expr::Not(Box::new(text))
            } else {
                text
            }
        }
        (None, None) => return Ok(None),
    };

    if Value::parse(field.kind, value).is_none() {
        return Err(FilterError::TypeMismatch {
            field: node.field.clone(),
            value: value.to_string(),
            kind: field.kind,
        });
    }
    params.push(value.to_string());
    Ok(Some(expr))
}

#[inline]
fn ensure_string_field(
    node: &Filter,
    op: Operator,
    field: &FieldRef,
) -> std::result::Result<(), FilterError> {
    if field.kind != FieldKind::String {
        return Err(FilterError::NotAStringField {
            field: node.field.clone(),
            op,
            kind: field.kind,
        });
    }
    Ok(())
}

/// Filter and order ready for a queryable backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledQuery {
    pub filter: CompiledFilter,
    pub order: OrderBy,
}

impl DynamicQuery {
    /// Validate and compile both halves; nothing is returned unless both succeed.
    pub fn compile(&self, fields: &FieldSet, limits: &CompileLimits) -> Result<CompiledQuery> {
        let filter = match &self.filter {
            Some(root) => compile_filter(root, fields, limits)?,
            None => CompiledFilter::empty(),
        };
        let order = compile_sort(&self.sort, fields, limits)?;
        Ok(CompiledQuery { filter, order })
    }
}
