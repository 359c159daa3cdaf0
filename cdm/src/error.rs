//! Resolution errors
//!
//! Every failure is terminal for the request that raised it. The error carries
//! the definition path (entity / attribute chain) that was being expanded when
//! the failure happened, so callers can point at the offending definition.

use crate::definitions::DefinitionKind;
use itertools::Itertools;
use std::fmt;

/// What went wrong, independent of where.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("unresolved reference '{name}' (expected {expected})")]
    UnresolvedReference {
        name: String,
        expected: DefinitionKind,
    },

    #[error("ambiguous reference '{name}': {count} definitions in document '{document}'")]
    AmbiguousReference {
        name: String,
        document: String,
        count: usize,
    },

    #[error("cyclic inheritance: {}", .chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    #[error("cyclic embedding: {}", .chain.join(" -> "))]
    CyclicEmbedding { chain: Vec<String> },

    #[error("trait '{trait_name}' requires a value for parameter '{parameter}'")]
    MissingRequiredArgument {
        trait_name: String,
        parameter: String,
    },

    #[error("no eligible sub-attribute to select for '{attribute}'")]
    NoEligibleAttribute { attribute: String },

    #[error("recursion limit of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },

    #[error("trait '{trait_name}' has no parameter '{parameter}'")]
    UnknownParameter {
        trait_name: String,
        parameter: String,
    },

    #[error("resolution cancelled")]
    Cancelled,

    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),
}

/// The entity/attribute chain at which an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionPath(pub Vec<String>);

impl DefinitionPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DefinitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<corpus>")
        } else {
            write!(f, "{}", self.0.iter().join("/"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (at {path})")]
pub struct ResolutionError {
    pub kind: ErrorKind,
    pub path: DefinitionPath,
}

impl ResolutionError {
    pub fn new(kind: ErrorKind, path: Vec<String>) -> Self {
        Self {
            kind,
            path: DefinitionPath(path),
        }
    }
}

impl From<ErrorKind> for ResolutionError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: DefinitionPath::default(),
        }
    }
}

pub type ResolutionResult<T> = Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = ResolutionError::new(
            ErrorKind::NoEligibleAttribute {
                attribute: "contact".to_string(),
            },
            vec!["Customer".to_string(), "contact".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "no eligible sub-attribute to select for 'contact' (at Customer/contact)"
        );
    }

    #[test]
    fn cycle_chain_is_rendered_in_order() {
        let kind = ErrorKind::CyclicInheritance {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(kind.to_string(), "cyclic inheritance: A -> B -> A");
        let err: ResolutionError = kind.into();
        assert!(err.to_string().ends_with("(at <corpus>)"));
    }
}
