//! Storage-agnostic half of the dynamic query engine.
//!
//! Callers send a [`Filter`] tree and a list of [`Sort`] keys. This crate
//! validates them against the entity's [`FieldSet`] and compiles them into a
//! typed predicate ([`ast::Expr`] plus positional parameters) and an
//! [`OrderBy`]. Executing the result belongs to a storage backend.

pub mod ast;
pub mod compile;
pub mod error;
pub mod filter;
pub mod order;
pub mod page;
pub mod schema;

pub use compile::{compile_filter, CompileLimits, CompiledFilter, CompiledQuery};
pub use error::{Error, FilterError, Result, SortError};
pub use filter::{DynamicQuery, Filter, Logic, Operator, Sort};
pub use order::{compile_sort, OrderBy, OrderKey, SortDir};
pub use page::{Page, PageRequest};
pub use schema::{FieldKind, FieldRef, FieldSet, Value};
