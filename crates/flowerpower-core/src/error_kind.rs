use serde::{Deserialize, Serialize};
use std::fmt;

/// A coarse, serializable classification of an error.
///
/// `RunConfig::retry.retry_exceptions` is persisted as a set of these names
/// rather than as language-native exception types, so that a retry policy
/// loaded from YAML round-trips losslessly and can be compared across
/// processes. Concrete error types across the workspace implement
/// [`Classify`] to report which kind they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Matches any error. This is the default for a freshly built retry
    /// policy, mirroring the source's "retry_exceptions defaults to match
    /// any exception".
    Any,
    Timeout,
    Connection,
    Io,
    Validation,
    Execution,
    Broker,
    /// A named kind not covered by the fixed set above. Preserves the
    /// original string so round-tripping through YAML never loses data.
    Other(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Any => write!(f, "any"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Broker => write!(f, "broker"),
            ErrorKind::Other(name) => write!(f, "{name}"),
        }
    }
}

impl ErrorKind {
    /// Parses a kind name as it would appear in a persisted
    /// `retry_exceptions` list, e.g. `"TimeoutError"` or `"timeout"`.
    pub fn parse(name: &str) -> ErrorKind {
        match name.to_ascii_lowercase().as_str() {
            "any" => ErrorKind::Any,
            "timeouterror" | "timeout" => ErrorKind::Timeout,
            "connectionerror" | "connection" => ErrorKind::Connection,
            "ioerror" | "io" => ErrorKind::Io,
            "valueerror" | "validationerror" | "validation" => ErrorKind::Validation,
            "executionerror" | "execution" => ErrorKind::Execution,
            "brokerunavailableerror" | "broker" => ErrorKind::Broker,
            _ => ErrorKind::Other(name.to_string()),
        }
    }
}

/// Implemented by error types that can report a coarse [`ErrorKind`] so a
/// [`crate::retry`]-style policy can decide whether they are retryable.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for std::io::Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}

/// Returns true if `kind` is matched by the given retry-exceptions set.
/// An empty set or a set containing [`ErrorKind::Any`] matches everything.
pub fn matches(retry_exceptions: &std::collections::HashSet<ErrorKind>, kind: &ErrorKind) -> bool {
    retry_exceptions.is_empty()
        || retry_exceptions.contains(&ErrorKind::Any)
        || retry_exceptions.contains(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrips_known_kinds() {
        assert_eq!(ErrorKind::parse("TimeoutError"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::parse("timeout"), ErrorKind::Timeout);
        assert_eq!(
            ErrorKind::parse("SomeWeirdError"),
            ErrorKind::Other("someweirderror".to_string())
        );
    }

    #[test]
    fn empty_set_matches_any_kind() {
        let set = std::collections::HashSet::new();
        assert!(matches(&set, &ErrorKind::Timeout));
    }

    #[test]
    fn any_in_set_matches_everything() {
        let mut set = std::collections::HashSet::new();
        set.insert(ErrorKind::Any);
        assert!(matches(&set, &ErrorKind::Validation));
    }

    #[test]
    fn specific_set_only_matches_listed_kinds() {
        let mut set = std::collections::HashSet::new();
        set.insert(ErrorKind::Timeout);
        assert!(matches(&set, &ErrorKind::Timeout));
        assert!(!matches(&set, &ErrorKind::Connection));
    }
}
