//! Stable identifiers for authored entities.
//!
//! Every module, interface point, interface and failure mode is keyed by an
//! identifier supplied by the model provider. Identifiers are non-empty and
//! restricted to `[A-Za-z0-9_.-]`, which keeps them safe to embed in the
//! `kind:ID/condition` syntax used on the command line.

use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid identifier '{0}': must be non-empty and contain only letters, digits, '_', '.' or '-'"
)]
pub struct InvalidIdError(String);

fn validate(s: String) -> Result<NonEmptyString, InvalidIdError> {
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(InvalidIdError(s));
    }
    NonEmptyString::new(s).map_err(InvalidIdError)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(NonEmptyString);

        impl $name {
            /// Creates a new identifier.
            ///
            /// # Errors
            ///
            /// Returns [`InvalidIdError`] if the string is empty or contains
            /// characters outside `[A-Za-z0-9_.-]`.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidIdError> {
                validate(s.into()).map(Self)
            }

            /// Returns the string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = InvalidIdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.as_str().to_owned()
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

identifier!(
    /// Identifier of a [`Module`](crate::domain::Module).
    ModuleId
);

identifier!(
    /// Identifier of an interface point owned by a module.
    PointId
);

identifier!(
    /// Identifier of an [`Interface`](crate::domain::Interface).
    InterfaceId
);

identifier!(
    /// Identifier of a [`FailureMode`](crate::domain::FailureMode).
    FailureModeId
);

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("M1"; "alphanumeric")]
    #[test_case("power_supply.out-2"; "punctuation")]
    fn accepts_valid_identifiers(s: &str) {
        let id = ModuleId::new(s).unwrap();
        assert_eq!(id.as_str(), s);
        assert_eq!(id.to_string(), s);
    }

    #[test_case(""; "empty")]
    #[test_case("has space"; "whitespace")]
    #[test_case("a/b"; "slash")]
    #[test_case("kind:id"; "colon")]
    fn rejects_invalid_identifiers(s: &str) {
        assert_eq!(
            InterfaceId::new(s).unwrap_err(),
            InvalidIdError(s.to_string())
        );
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![
            FailureModeId::new("b").unwrap(),
            FailureModeId::new("a2").unwrap(),
            FailureModeId::new("a10").unwrap(),
        ];
        ids.sort();
        let ids: Vec<_> = ids.iter().map(FailureModeId::as_str).collect();
        assert_eq!(ids, ["a10", "a2", "b"]);
    }

    #[test]
    fn deserializes_through_validation() {
        let id: PointId = serde_json::from_str("\"p.1\"").unwrap();
        assert_eq!(id.as_str(), "p.1");
        assert!(serde_json::from_str::<PointId>("\"\"").is_err());
    }
}
