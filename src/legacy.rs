/*!

Legacy credential resolvers (§4.7 step 1, §9 design notes): transform a
lookup for one credential type into a lookup for another, projecting the
results back. Consulted before provider enumeration, so a caller asking for
a type that's been superseded still gets results sourced from the type it
was migrated from.
*/
use std::collections::HashMap;
use std::sync::Arc;

use crate::credential::{Credential, CredentialType};

/// Projects a credential of the registered *from* type into one of the *to*
/// type. Returning `None` means this particular credential doesn't project
/// (the lookup simply omits it, it is not an error).
pub trait LegacyProjection: Send + Sync {
    fn from_type(&self) -> CredentialType;
    fn project(&self, credential: &Credential) -> Option<Credential>;
}

/// Registry of `(fromType, toType) -> projection`, keyed by the type being
/// requested (`toType`).
#[derive(Default)]
pub struct LegacyResolverRegistry {
    resolvers: HashMap<CredentialType, Arc<dyn LegacyProjection>>,
}

impl LegacyResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver producing `to_type` by projecting from
    /// `resolver.from_type()`.
    pub fn register(&mut self, to_type: CredentialType, resolver: Arc<dyn LegacyProjection>) {
        self.resolvers.insert(to_type, resolver);
    }

    pub fn resolver_for(&self, to_type: CredentialType) -> Option<Arc<dyn LegacyProjection>> {
        self.resolvers.get(&to_type).cloned()
    }
}
