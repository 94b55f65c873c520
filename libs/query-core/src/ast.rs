//! Backend-agnostic predicate tree produced by the filter compiler.
//!
//! Leaves never carry literal values, only the index of a positional parameter
//! in [`CompiledFilter::params`](crate::CompiledFilter). Each storage backend
//! renders this tree its own way; `Display` gives the canonical text form.

use std::cmp::Ordering;
use std::fmt;

use crate::schema::FieldRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Eq => "==",
            CompareOperator::Ne => "!=",
            CompareOperator::Gt => ">",
            CompareOperator::Ge => ">=",
            CompareOperator::Lt => "<",
            CompareOperator::Le => "<=",
        }
    }

    /// Whether `lhs.cmp(rhs) == ord` satisfies this operator.
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            CompareOperator::Eq => ord == Ordering::Equal,
            CompareOperator::Ne => ord != Ordering::Equal,
            CompareOperator::Gt => ord == Ordering::Greater,
            CompareOperator::Ge => ord != Ordering::Less,
            CompareOperator::Lt => ord == Ordering::Less,
            CompareOperator::Le => ord != Ordering::Greater,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextFunction {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextFunction {
    pub fn name(self) -> &'static str {
        match self {
            TextFunction::Contains => "contains",
            TextFunction::StartsWith => "startswith",
            TextFunction::EndsWith => "endswith",
        }
    }

    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            TextFunction::Contains => haystack.contains(needle),
            TextFunction::StartsWith => haystack.starts_with(needle),
            TextFunction::EndsWith => haystack.ends_with(needle),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        field: FieldRef,
        op: CompareOperator,
        param: usize,
    },
    Text {
        field: FieldRef,
        func: TextFunction,
        param: usize,
    },
    IsNull(FieldRef),
    IsNotNull(FieldRef),
    IsEmpty(FieldRef),
    IsNotEmpty(FieldRef),
}

impl Expr {
    /// Number of parameter placeholders referenced by this tree.
    pub fn param_count(&self) -> usize {
        match self {
            Expr::And(items) | Expr::Or(items) => items.iter().map(Expr::param_count).sum(),
            Expr::Not(inner) => inner.param_count(),
            Expr::Compare { .. } | Expr::Text { .. } => 1,
            Expr::IsNull(_) | Expr::IsNotNull(_) | Expr::IsEmpty(_) | Expr::IsNotEmpty(_) => 0,
        }
    }

    /// Renumber every placeholder by `offset`; used when two compiled filters
    /// are conjoined into one parameter list.
    pub fn shift_params(&mut self, offset: usize) {
        match self {
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.shift_params(offset);
                }
            }
            Expr::Not(inner) => inner.shift_params(offset),
            Expr::Compare { param, .. } | Expr::Text { param, .. } => *param += offset,
            Expr::IsNull(_) | Expr::IsNotNull(_) | Expr::IsEmpty(_) | Expr::IsNotEmpty(_) => {}
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
        match self {
            Expr::And(items) | Expr::Or(items) => {
                let sep = if matches!(self, Expr::And(_)) {
                    " and "
                } else {
                    " or "
                };
                if nested {
                    f.write_str("(")?;
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    item.write(f, true)?;
                }
                if nested {
                    f.write_str(")")?;
                }
                Ok(())
            }
            Expr::Not(inner) => {
                f.write_str("!")?;
                inner.write(f, true)
            }
            Expr::Compare { field, op, param } => {
                write!(f, "{} {} @{}", field.path, op.symbol(), param)
            }
            Expr::Text { field, func, param } => {
                write!(f, "{}.{}(@{})", field.path, func.name(), param)
            }
            Expr::IsNull(field) => write!(f, "{} == null", field.path),
            Expr::IsNotNull(field) => write!(f, "{} != null", field.path),
            Expr::IsEmpty(field) => write!(f, "{} == \"\"", field.path),
            Expr::IsNotEmpty(field) => write!(f, "{} != \"\"", field.path),
        }
    }
}

/// Renders e.g. `age >= @0 and (age < @1)`; nested groups are always parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false)
    }
}
