//! Query string construction and normalization.
//!
//! Values are embedded without escaping. A value containing `'` produces a
//! query the service cannot parse; callers own that constraint.

use crate::domain::foundation::{ClientError, FieldMap, FieldValue};

/// Structured input for [`build_query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Module (entity type) to select from.
    pub module: String,
    /// Field constraints, rendered in insertion order.
    pub constraints: FieldMap,
    /// Fields to return; empty selects every field.
    pub projection: Vec<String>,
    /// Maximum rows; zero means no `LIMIT` clause.
    pub limit: u32,
}

impl QuerySpec {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Default::default()
        }
    }

    /// Adds a `field LIKE 'value'` constraint.
    pub fn with_constraint(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.constraints.insert(field, value);
        self
    }

    /// Sets the projected fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the query string.
    pub fn build(&self) -> Result<String, ClientError> {
        build_query(self)
    }
}

/// Namespace-style entry point mirroring `build(module, constraints, projection, limit)`.
pub struct QueryBuilder;

impl QueryBuilder {
    /// Builds a query from loose arguments.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` if `constraints` is empty or the
    /// module name is blank.
    pub fn build(
        module: &str,
        constraints: &FieldMap,
        projection: &[&str],
        limit: u32,
    ) -> Result<String, ClientError> {
        render(module, constraints, projection.iter().copied(), limit)
    }
}

/// Builds `SELECT <fields> FROM <module> WHERE <predicates>[ LIMIT n];`.
///
/// # Errors
///
/// Returns `ClientError::Validation` if there are no constraints or the
/// module name is blank.
pub fn build_query(spec: &QuerySpec) -> Result<String, ClientError> {
    render(
        &spec.module,
        &spec.constraints,
        spec.projection.iter().map(String::as_str),
        spec.limit,
    )
}

fn render<'a>(
    module: &str,
    constraints: &FieldMap,
    projection: impl Iterator<Item = &'a str>,
    limit: u32,
) -> Result<String, ClientError> {
    if module.trim().is_empty() {
        return Err(ClientError::validation("module name cannot be empty"));
    }
    if constraints.is_empty() {
        return Err(ClientError::validation(
            "at least one constraint (field => value) is required to build a query",
        ));
    }

    let fields: Vec<&str> = projection.collect();
    let select = if fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(",")
    };

    let mut predicates = Vec::with_capacity(constraints.len());
    for (field, value) in constraints.iter() {
        let literal = value.to_literal().map_err(|e| {
            ClientError::validation(format!("cannot render value of field '{}': {}", field, e))
        })?;
        predicates.push(format!("{} LIKE '{}'", field, literal));
    }

    let mut query = format!(
        "SELECT {} FROM {} WHERE {}",
        select,
        module,
        predicates.join(" AND ")
    );
    if limit > 0 {
        query.push_str(&format!(" LIMIT {}", limit));
    }
    query.push(';');
    Ok(query)
}

/// Ensures a raw query ends with exactly one `;`.
///
/// Trailing whitespace and semicolons are trimmed before the terminator is
/// appended.
///
/// # Errors
///
/// Returns `ClientError::Validation` if nothing but whitespace and
/// semicolons remains.
pub fn normalize_query(raw: &str) -> Result<String, ClientError> {
    let body = raw
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if body.is_empty() {
        return Err(ClientError::validation("query cannot be empty"));
    }
    Ok(format!("{};", body))
}
