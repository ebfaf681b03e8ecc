// crates/mergegate-core/src/identifiers.rs
// ============================================================================
// Module: Merge-Train Identifiers
// Description: Canonical opaque identifiers for items and gates.
// Purpose: Prevent bare strings from standing in for validated names.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Item and gate names are validated once, at construction, and carried as
//! opaque newtypes from then on. This keeps "is this name non-empty" a
//! question the type system answers rather than a check repeated at every
//! call site.

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier was empty or contained only whitespace.
    #[error("identifier must be non-empty")]
    Empty,
}

/// Item name, unique within a plan.
///
/// # Invariants
/// - Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemName(String);

/// Gate name, unique within an item.
///
/// # Invariants
/// - Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GateName(String);

macro_rules! opaque_name {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                Self::new(value).map_err(serde::de::Error::custom)
            }
        }

        impl $ty {
            /// Creates a new identifier, rejecting empty or whitespace-only input.
            ///
            /// # Errors
            ///
            /// Returns [`IdentifierError::Empty`] when `value` is empty or
            /// whitespace-only.
            pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(IdentifierError::Empty);
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_name!(ItemName);
opaque_name!(GateName);
