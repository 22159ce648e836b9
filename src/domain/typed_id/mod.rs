//! Typed identifiers: `<module-prefix>x<numeric-id>`.
//!
//! The service addresses every record with a typed id whose prefix
//! identifies the module. Callers usually only know the numeric part; the
//! resolver in the application layer fills in the prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ClientError;

/// Separator between module prefix and numeric id.
pub const ID_SEPARATOR: char = 'x';

/// Sentinel returned by [`extract_numeric_id`] for ids it cannot split.
pub const UNRESOLVABLE_ID: i64 = -1;

/// Canonical wire identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedId(String);

impl TypedId {
    /// Composes `<prefix>x<numeric>`.
    pub fn compose(prefix: &str, numeric: u64) -> Self {
        Self(format!("{}{}{}", prefix, ID_SEPARATOR, numeric))
    }

    /// Wraps a string already containing the separator, unchecked.
    pub(crate) fn from_canonical(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Numeric part of the id, or [`UNRESOLVABLE_ID`].
    pub fn numeric_id(&self) -> i64 {
        extract_numeric_id(&self.0)
    }
}

impl fmt::Display for TypedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TypedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True if `id` contains the separator in either case and is therefore
/// treated as canonical.
///
/// The prefix is not checked against any module.
pub fn is_typed(id: &str) -> bool {
    id.contains(|c: char| c.eq_ignore_ascii_case(&ID_SEPARATOR))
}

/// Parses a bare numeric id, which must be a positive integer.
///
/// # Errors
///
/// Returns `ClientError::Validation` for empty, non-numeric or zero ids.
pub fn parse_numeric_id(id: &str) -> Result<u64, ClientError> {
    let trimmed = id.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClientError::validation(format!(
            "entity id must be a valid positive number, got '{}'",
            id
        )));
    }
    match trimmed.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ClientError::validation("entity id must be greater than zero")),
        Err(e) => Err(ClientError::validation(format!(
            "entity id '{}' is out of range: {}",
            id, e
        ))),
    }
}

/// Splits a typed id on its first separator and returns the numeric part.
///
/// Malformed or legacy ids are not an error. Without a separator the result
/// is [`UNRESOLVABLE_ID`]; otherwise it is the integer formed by the leading
/// digits after the separator, or 0 if there are none.
pub fn extract_numeric_id(typed_id: &str) -> i64 {
    match typed_id.split_once(ID_SEPARATOR) {
        Some((_, tail)) => leading_integer(tail),
        None => UNRESOLVABLE_ID,
    }
}

/// Optional sign followed by as many digits as are present; saturates.
fn leading_integer(raw: &str) -> i64 {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, b| acc.saturating_mul(10).saturating_add(i64::from(b - b'0')));
    sign * magnitude
}
