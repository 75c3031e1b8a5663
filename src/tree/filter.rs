//! Exclusion filter for the public copy

use serde::{Deserialize, Serialize};

/// Default marker tagging instructor-only content
pub const DEFAULT_EXCLUSION_MARKER: &str = "(priv)";

/// True iff `name` contains `marker`. An empty marker excludes nothing.
pub fn is_excluded(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.contains(marker)
}

/// Which source nodes a destination tree admits.
///
/// Evaluated per node at every depth: a folder that is admitted says nothing
/// about its children, and an excluded folder takes its whole subtree with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPolicy {
    /// Privileged copy: everything
    IncludeAll,
    /// Public copy: drop nodes whose name contains the marker
    ExcludeMarked(String),
}

impl FilterPolicy {
    /// Policy for the public tree
    pub fn public(marker: impl Into<String>) -> Self {
        Self::ExcludeMarked(marker.into())
    }

    /// Check whether a name is filtered out
    pub fn excluded(&self, name: &str) -> bool {
        match self {
            Self::IncludeAll => false,
            Self::ExcludeMarked(marker) => is_excluded(name, marker),
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::IncludeAll => "instructor",
            Self::ExcludeMarked(_) => "public",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_substring() {
        assert!(is_excluded("(priv) answers.pdf", "(priv)"));
        assert!(is_excluded("week3 (priv)", "(priv)"));
        assert!(!is_excluded("week3 (private notes)", "(priv)"));
        assert!(!is_excluded("priv", "(priv)"));
    }

    #[test]
    fn test_empty_marker_excludes_nothing() {
        assert!(!is_excluded("anything", ""));
    }

    #[test]
    fn test_policies() {
        let public = FilterPolicy::public("(priv)");
        assert!(public.excluded("key (priv)"));
        assert!(!FilterPolicy::IncludeAll.excluded("key (priv)"));
        assert_eq!(public.label(), "public");
    }
}
