//! Restricted query language support.
//!
//! The service accepts a small SQL-like subset: a single-module `SELECT`
//! with an optional field projection, `LIKE` predicates joined by `AND`,
//! and an optional `LIMIT`.

mod builder;

pub use builder::{build_query, normalize_query, QueryBuilder, QuerySpec};
