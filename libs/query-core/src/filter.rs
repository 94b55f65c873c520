//! Wire shapes accepted from callers: `{field, operator, value?, logic?, filters?}`,
//! `{field, dir}` and `{filter?, sort?}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::{CompareOperator, Expr, TextFunction};
use crate::error::FilterError;

/// One node of a client-supplied filter tree.
///
/// Operator and logic stay plain strings on the wire; they are validated by the
/// compiler so a bad token surfaces as [`FilterError`] instead of a decode failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: Operator) -> Self {
        Self {
            field: field.into(),
            operator: op.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Leaf comparing `field` with `value`.
    pub fn leaf(field: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self::new(field, op).with_value(value)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = Some(logic.as_str().to_string());
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Number of nodes in the tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.filters.iter().map(Filter::node_count).sum::<usize>()
    }

    /// Flattens the tree in pre-order (node first, then children left to right).
    pub fn pre_order(&self) -> Vec<&Filter> {
        fn walk<'a>(f: &'a Filter, out: &mut Vec<&'a Filter>) {
            out.push(f);
            for child in &f.filters {
                walk(child, out);
            }
        }
        let mut out = Vec::with_capacity(self.node_count());
        walk(self, &mut out);
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::IsNull => "isnull",
            Operator::IsNotNull => "isnotnull",
            Operator::IsEmpty => "isempty",
            Operator::IsNotEmpty => "isnotempty",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesnotcontain",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }

    /// The null/empty family never reads `value` and never takes a parameter.
    pub fn consumes_value(self) -> bool {
        !matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::IsEmpty | Operator::IsNotEmpty
        )
    }

    pub fn compare_operator(self) -> Option<CompareOperator> {
        Some(match self {
            Operator::Eq => CompareOperator::Eq,
            Operator::Neq => CompareOperator::Ne,
            Operator::Lt => CompareOperator::Lt,
            Operator::Lte => CompareOperator::Le,
            Operator::Gt => CompareOperator::Gt,
            Operator::Gte => CompareOperator::Ge,
            _ => return None,
        })
    }

    /// Substring function and whether the result is negated.
    pub fn text_function(self) -> Option<(TextFunction, bool)> {
        Some(match self {
            Operator::Contains => (TextFunction::Contains, false),
            Operator::DoesNotContain => (TextFunction::Contains, true),
            Operator::StartsWith => (TextFunction::StartsWith, false),
            Operator::EndsWith => (TextFunction::EndsWith, false),
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == lowered)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn as_str(self) -> &'static str {
        match self {
            Logic::And => "and",
            Logic::Or => "or",
        }
    }

    pub fn combine(self, items: Vec<Expr>) -> Expr {
        match self {
            Logic::And => Expr::And(items),
            Logic::Or => Expr::Or(items),
        }
    }
}

impl FromStr for Logic {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Logic::And),
            "or" => Ok(Logic::Or),
            _ => Err(FilterError::InvalidLogic(s.to_string())),
        }
    }
}

/// One sort key as sent by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub dir: String,
}

impl Sort {
    pub fn new(field: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: dir.into(),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: "asc".to_string(),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: "desc".to_string(),
        }
    }
}

/// Filter plus sort, the body an API layer forwards to `get_list_by_dynamic`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
}

impl DynamicQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: impl IntoIterator<Item = Sort>) -> Self {
        self.sort.extend(sort);
        self
    }
}
