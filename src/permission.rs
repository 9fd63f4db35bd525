/*!

The permissions surface (§6): five store CRUD permissions plus the pair
governing whose credentials a running task may consume.
 */
use std::fmt;

/// A permission a `Principal` may hold on a context/store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Permission {
    View,
    Create,
    Update,
    Delete,
    ManageDomains,
    /// May consume credentials it is itself the owner/triggerer of.
    UseOwn,
    /// May consume any credential visible to the context it runs in.
    UseItem,
    /// Administrative rights on a store, beyond ordinary CRUD. Gates
    /// `UseOwn` as well when [`crate::config::Config::use_own_implies_administer`]
    /// is set.
    Administer,
}

impl Permission {
    /// The dotted token form used on the external permissions surface
    /// (§6), e.g. `"Credentials.View"`.
    pub fn as_token(&self) -> &'static str {
        match self {
            Permission::View => "Credentials.View",
            Permission::Create => "Credentials.Create",
            Permission::Update => "Credentials.Update",
            Permission::Delete => "Credentials.Delete",
            Permission::ManageDomains => "Credentials.ManageDomains",
            Permission::UseOwn => "UseOwn",
            Permission::UseItem => "UseItem",
            Permission::Administer => "Administer",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "Credentials.View" => Permission::View,
            "Credentials.Create" => Permission::Create,
            "Credentials.Update" => Permission::Update,
            "Credentials.Delete" => Permission::Delete,
            "Credentials.ManageDomains" => Permission::ManageDomains,
            "UseOwn" => Permission::UseOwn,
            "UseItem" => Permission::UseItem,
            "Administer" => Permission::Administer,
            _ => return None,
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Something that can answer ACL questions for a context: stores delegate
/// authorisation to their owning context (§4.5 "Each store delegates
/// authorisation to its context").
pub trait AccessControl: Send + Sync {
    fn has_permission(&self, principal: &crate::principal::Principal, perm: Permission) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_for_all_variants() {
        let all = [
            Permission::View,
            Permission::Create,
            Permission::Update,
            Permission::Delete,
            Permission::ManageDomains,
            Permission::UseOwn,
            Permission::UseItem,
            Permission::Administer,
        ];
        for perm in all {
            let token = perm.as_token();
            assert_eq!(Permission::from_token(token), Some(perm));
        }
    }

    #[test]
    fn unknown_token_is_none() {
        assert_eq!(Permission::from_token("Credentials.Nope"), None);
    }
}
