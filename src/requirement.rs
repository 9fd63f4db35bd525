/*!

Requirements: the caller-supplied `(kind, value)` pairs a lookup matches
domains against (§3).
 */
use std::fmt;

/// What a [`Requirement`] is about. Non-exhaustive: specification
/// implementations may introduce their own `Custom` kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RequirementKind {
    Hostname,
    Scheme,
    Path,
    Uri,
    Custom(String),
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementKind::Hostname => f.write_str("hostname"),
            RequirementKind::Scheme => f.write_str("scheme"),
            RequirementKind::Path => f.write_str("path"),
            RequirementKind::Uri => f.write_str("uri"),
            RequirementKind::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// A single fact asserted by a caller at lookup time, e.g.
/// `(Hostname, "api.github.com")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub value: String,
}

impl Requirement {
    pub fn new(kind: RequirementKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn hostname(value: impl Into<String>) -> Self {
        Self::new(RequirementKind::Hostname, value)
    }

    pub fn scheme(value: impl Into<String>) -> Self {
        Self::new(RequirementKind::Scheme, value)
    }

    pub fn path(value: impl Into<String>) -> Self {
        Self::new(RequirementKind::Path, value)
    }

    pub fn uri(value: impl Into<String>) -> Self {
        Self::new(RequirementKind::Uri, value)
    }
}
