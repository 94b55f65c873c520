use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compile::CompileLimits;
use crate::error::{Result, SortError};
use crate::filter::Sort;
use crate::schema::{FieldRef, FieldSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

impl FromStr for SortDir {
    type Err = SortError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            _ => Err(SortError::InvalidDirection(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: FieldRef,
    pub dir: SortDir,
}

/// Multi-key ordering: the first key is primary, later keys break ties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderBy(pub Vec<OrderKey>);

impl OrderBy {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }

    /// Compact form used in logs, e.g. `+lastName,-createdAt`.
    pub fn to_signed_tokens(&self) -> String {
        self.0
            .iter()
            .map(|k| match k.dir {
                SortDir::Asc => format!("+{}", k.field.path),
                SortDir::Desc => format!("-{}", k.field.path),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", key.field.path, key.dir.as_str())?;
        }
        Ok(())
    }
}

/// Compile client sort specs into one ordering. No implicit tie-breaker is
/// added; rows equal on every key keep whatever order the backend yields.
pub fn compile_sort(specs: &[Sort], fields: &FieldSet, limits: &CompileLimits) -> Result<OrderBy> {
    if specs.len() > limits.max_sort_keys {
        return Err(SortError::TooManyKeys(limits.max_sort_keys).into());
    }

    let mut keys = Vec::with_capacity(specs.len());
    for spec in specs {
        if spec.field.trim().is_empty() {
            return Err(SortError::EmptyField.into());
        }
        let dir: SortDir = spec.dir.parse()?;
        let field = fields
            .get(&spec.field)
            .ok_or_else(|| SortError::UnknownField(spec.field.clone()))?;
        keys.push(OrderKey {
            field: field.clone(),
            dir,
        });
    }
    Ok(OrderBy(keys))
}
