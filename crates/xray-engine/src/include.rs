//! Inclusion scope: which callables are eligible for instrumentation.
//!
//! Eligibility is prefix matching on dot-delimited qualified names. The root
//! target's namespace is always included; extra scopes widen the set. This is
//! a pure function of its inputs -- the instrumentor consults it at every
//! call site reached while lowering.

use std::collections::BTreeSet;

/// The set of namespace prefixes eligible for instrumentation.
#[derive(Debug, Clone)]
pub struct InclusionScope {
    root: String,
    extra: BTreeSet<String>,
}

impl InclusionScope {
    /// Creates a scope containing only the root target's namespace.
    pub fn new(root: impl Into<String>) -> Self {
        InclusionScope {
            root: root.into(),
            extra: BTreeSet::new(),
        }
    }

    /// Adds an extra namespace prefix.
    pub fn include(&mut self, scope: impl Into<String>) {
        self.extra.insert(scope.into());
    }

    /// The implicit root namespace.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// `true` if `qualified` falls under the root namespace or any extra
    /// scope. Matching is per dot segment: scope `a.b` covers `a.b` and
    /// `a.b.c` but not `a.bc`.
    pub fn is_eligible(&self, qualified: &str) -> bool {
        prefix_matches(&self.root, qualified)
            || self.extra.iter().any(|s| prefix_matches(s, qualified))
    }
}

fn prefix_matches(scope: &str, qualified: &str) -> bool {
    match qualified.strip_prefix(scope) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
