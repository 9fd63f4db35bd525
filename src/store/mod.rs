/*!

The store abstraction (§4.5): capability-typed credential storage.

Per the design notes, capability is expressed through trait objects rather
than runtime reflection: a store that can mutate domains implements
[`MutableDomainsStore`] and exposes itself through
[`ReadOnlyStore::as_mutable_domains`]; one that can't simply returns `None`
there. Likewise for general mutability via [`ReadOnlyStore::as_mutable`].
This mirrors the teacher's trait-object `as_any`/`CredentialStoreApi` split
in spirit, but narrows it to the capabilities this domain actually needs
instead of a single downcast-everything escape hatch.
*/
mod memory;

pub use memory::InMemoryStore;

use crate::credential::Credential;
use crate::domain::Domain;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::permission::{AccessControl, Permission};
use crate::principal::Principal;
use crate::scope::Scope;

/// Read access to a store's domains and credentials, plus the ACL surface
/// every store exposes regardless of its mutability.
pub trait ReadOnlyStore: AccessControl {
    /// A stable, store-implementation-specific identifier, used in store
    /// tokens (§6) and in logging.
    fn id(&self) -> &str;

    fn scopes(&self) -> &[Scope];

    fn domains(&self) -> Vec<Domain>;

    fn domain_by_name(&self, name: Option<&str>) -> Option<Domain>;

    /// Every credential in `domain` satisfying `matcher`. `domain == None`
    /// is the global domain's contents.
    fn credentials(&self, domain: Option<&str>, matcher: &Matcher) -> Result<Vec<Credential>>;

    /// Upcast to the mutable-credentials capability, if this store has it.
    fn as_mutable(&self) -> Option<&dyn MutableStore>;

    /// Upcast to the mutable-domains capability, if this store has it.
    fn as_mutable_domains(&self) -> Option<&dyn MutableDomainsStore>;
}

/// Credential CRUD (§4.5). A store implementing only this (and not
/// [`MutableDomainsStore`]) has a fixed, pre-provisioned set of domains.
pub trait MutableStore: ReadOnlyStore {
    fn add_credential(
        &self,
        principal: &Principal,
        domain: Option<&str>,
        credential: Credential,
    ) -> Result<()>;

    fn remove_credential(&self, principal: &Principal, domain: Option<&str>, id: &str) -> Result<()>;

    /// Replace the credential at `(domain, id)` with `replacement`, first
    /// checking that what's stored still equals `cur` — the compare-and-swap
    /// update §4.5 requires. A caller holding a stale read gets
    /// `Error::Concurrent` instead of silently clobbering a write it never
    /// saw.
    fn update_credential(
        &self,
        principal: &Principal,
        domain: Option<&str>,
        cur: Credential,
        replacement: Credential,
    ) -> Result<()>;

    /// Persist pending changes. A no-op for stores with no backing medium.
    fn save(&self) -> Result<()>;
}

/// Domain CRUD (§4.5), for stores whose domain list isn't fixed.
pub trait MutableDomainsStore: MutableStore {
    fn add_domain(&self, principal: &Principal, domain: Domain) -> Result<()>;

    fn remove_domain(&self, principal: &Principal, name: &str) -> Result<()>;

    fn update_domain(&self, principal: &Principal, domain: Domain) -> Result<()>;
}
