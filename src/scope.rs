/*!

Credential visibility scope (§4.2).

`Scope` is totally ordered `System ⊏ Global ⊏ User`; the ordering itself
isn't load-bearing for visibility (visibility is context-dependent, see
[`crate::context`]) but it does drive the UI-facing "valid scopes" selector:
a store that only ever hands out one scope makes the selector irrelevant.
 */
use std::fmt;

/// Who may see a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Scope {
    /// Visible only when the consumer's context is the root installation.
    System,
    /// Visible to any context descended from the defining store's context.
    Global,
    /// Defined in a per-user store; visible only while the defining user is
    /// the effective principal.
    User,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::System => "SYSTEM",
            Scope::Global => "GLOBAL",
            Scope::User => "USER",
        };
        f.write_str(s)
    }
}

/// Returns whether a scope selector would matter to show: a singleton list
/// of valid scopes makes the selector irrelevant.
pub fn selector_is_relevant(valid_scopes: &[Scope]) -> bool {
    valid_scopes.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order() {
        assert!(Scope::System < Scope::Global);
        assert!(Scope::Global < Scope::User);
        assert!(Scope::System < Scope::User);
    }

    #[test]
    fn singleton_selector_is_irrelevant() {
        assert!(!selector_is_relevant(&[Scope::Global]));
        assert!(selector_is_relevant(&[Scope::Global, Scope::User]));
    }

    #[test]
    fn display_matches_spec_tokens() {
        assert_eq!(Scope::System.to_string(), "SYSTEM");
        assert_eq!(Scope::Global.to_string(), "GLOBAL");
        assert_eq!(Scope::User.to_string(), "USER");
    }
}
