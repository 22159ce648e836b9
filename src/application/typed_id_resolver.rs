//! Resolution of bare numeric ids to typed ids.
//!
//! Module prefixes never change for the lifetime of a CRM install, so they
//! are looked up once per module with `describe` and cached for the life of
//! the resolver. Concurrent first lookups of the same module may both call
//! `describe`; the first stored prefix wins.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::foundation::{ClientError, FieldMap};
use crate::domain::typed_id::{is_typed, parse_numeric_id, TypedId};
use crate::ports::{HttpMethod, OperationInvoker};

pub struct TypedIdResolver {
    invoker: Arc<dyn OperationInvoker>,
    prefixes: DashMap<String, String>,
}

impl TypedIdResolver {
    pub fn new(invoker: Arc<dyn OperationInvoker>) -> Self {
        Self {
            invoker,
            prefixes: DashMap::new(),
        }
    }

    /// Turns `id` into a typed id for `module`.
    ///
    /// Ids that already contain the separator are returned unchanged without
    /// any network call.
    ///
    /// # Errors
    ///
    /// - `Validation` if `id` is not a positive integer
    /// - `ModuleNotFound` if `describe` reports no id prefix
    /// - any error of the `describe` call
    pub async fn resolve(&self, module: &str, id: &str) -> Result<TypedId, ClientError> {
        if is_typed(id) {
            return Ok(TypedId::from_canonical(id));
        }

        let numeric = parse_numeric_id(id)?;
        let prefix = self.prefix_for(module).await?;
        Ok(TypedId::compose(&prefix, numeric))
    }

    /// Id prefix of `module`, from cache or via `describe`.
    pub async fn prefix_for(&self, module: &str) -> Result<String, ClientError> {
        let cached = self.prefixes.get(module).map(|p| p.value().clone());
        if let Some(prefix) = cached {
            return Ok(prefix);
        }

        tracing::debug!(module = %module, "Module prefix not cached, describing module");
        let params = FieldMap::new().with("elementType", module);
        let description = self
            .invoker
            .invoke("describe", params, HttpMethod::Get)
            .await?;

        let prefix = id_prefix(&description).ok_or_else(|| {
            tracing::warn!(module = %module, "Describe result has no idPrefix");
            ClientError::module_not_found(module)
        })?;

        let stored = self
            .prefixes
            .entry(module.to_string())
            .or_insert(prefix)
            .value()
            .clone();
        Ok(stored)
    }

    /// Cached prefix of `module`, without any lookup.
    pub fn cached_prefix(&self, module: &str) -> Option<String> {
        self.prefixes.get(module).map(|p| p.value().clone())
    }

    /// Seeds the cache, e.g. from a `describe` the caller already made.
    /// An existing entry is kept.
    pub fn remember_prefix(&self, module: &str, prefix: &str) {
        self.prefixes
            .entry(module.to_string())
            .or_insert_with(|| prefix.to_string());
    }

    /// Seeds the cache from a `describe` result, if it carries a prefix.
    pub fn remember_described(&self, module: &str, description: &Value) {
        if let Some(prefix) = id_prefix(description) {
            self.remember_prefix(module, &prefix);
        }
    }
}

impl std::fmt::Debug for TypedIdResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedIdResolver")
            .field("cached_modules", &self.prefixes.len())
            .finish_non_exhaustive()
    }
}

/// `idPrefix` may be a string or a number depending on the server build.
fn id_prefix(description: &Value) -> Option<String> {
    match description.get("idPrefix")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
