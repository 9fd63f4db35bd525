/*!

The authenticated identity a store or resolution call acts on behalf of.

The core never authenticates anyone (§1 Non-goals) — it receives an already
authenticated `Principal` and uses it only for scope visibility and ACL
checks.
 */
use std::fmt;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    /// The distinguished system principal: sees SYSTEM-scoped credentials
    /// and is used internally by the resolution engine to re-query on
    /// behalf of an item with `USE_ITEM`/`USE_OWN` (§4.7 step 3).
    System,
    /// A specific, named user.
    User(String),
}

impl Principal {
    pub fn is_system(&self) -> bool {
        matches!(self, Principal::System)
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Principal::User(id) => Some(id),
            Principal::System => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::System => f.write_str("SYSTEM"),
            Principal::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_has_no_user_id() {
        assert_eq!(Principal::System.user_id(), None);
        assert!(Principal::System.is_system());
    }

    #[test]
    fn user_principal_roundtrips_id() {
        let p = Principal::User("alice".to_string());
        assert_eq!(p.user_id(), Some("alice"));
        assert!(!p.is_system());
        assert_eq!(p.to_string(), "user:alice");
    }
}
