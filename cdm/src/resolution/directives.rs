use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The directive set in force for a subtree.
///
/// Values are never mutated in place: a subtree that imposes or removes
/// directives gets its own copy, so siblings cannot observe each other's edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Directives(BTreeSet<String>);

impl Directives {
    pub const REFERENCE_ONLY: &'static str = "referenceOnly";
    pub const STRUCTURED: &'static str = "structured";
    pub const NORMALIZED: &'static str = "normalized";
    pub const NO_MAX_DEPTH: &'static str = "noMaxDepth";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, directive: &str) -> bool {
        self.0.contains(directive)
    }

    pub fn reference_only(&self) -> bool {
        self.contains(Self::REFERENCE_ONLY)
    }

    pub fn structured(&self) -> bool {
        self.contains(Self::STRUCTURED)
    }

    pub fn normalized(&self) -> bool {
        self.contains(Self::NORMALIZED)
    }

    pub fn no_max_depth(&self) -> bool {
        self.contains(Self::NO_MAX_DEPTH)
    }

    /// Copy of this set with `imposed` added, then `removed` taken out.
    pub fn with_changes(&self, imposed: &[String], removed: &[String]) -> Self {
        if imposed.is_empty() && removed.is_empty() {
            return self.clone();
        }
        let mut next = self.0.clone();
        next.extend(imposed.iter().cloned());
        for directive in removed {
            next.remove(directive);
        }
        Self(next)
    }

    pub fn union<I, S>(&self, other: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.0.clone();
        next.extend(other.into_iter().map(Into::into));
        Self(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Directives {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Directives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, directive) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", directive)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_do_not_touch_the_parent_set() {
        let parent: Directives = ["structured", "normalized"].into_iter().collect();
        let child = parent.with_changes(&["referenceOnly".to_string()], &["structured".to_string()]);

        assert!(child.reference_only());
        assert!(!child.structured());
        assert!(child.normalized());

        assert!(parent.structured());
        assert!(!parent.reference_only());
    }

    #[test]
    fn display_is_sorted() {
        let set: Directives = ["structured", "normalized"].into_iter().collect();
        assert_eq!(set.to_string(), "{normalized, structured}");
        assert_eq!(Directives::new().to_string(), "{}");
    }
}
