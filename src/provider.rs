/*!

Providers (§4.6): plugs a concrete store implementation into a context.

A provider is asked, for a given context, whether it has a store to offer
there at all; the [`ProviderRegistry`] additionally applies an allow/deny
policy on top, so a deployment can disable a provider without touching its
code. The policy snapshot is immutable once built and swapped in behind a
lock, so a lookup in progress never observes a policy change half-applied.
*/
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::context::Context;
use crate::credential::CredentialType;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::store::ReadOnlyStore;

/// Supplies a store for a context, when it has one.
pub trait Provider: Send + Sync {
    /// A stable name, used by the allow/deny policy and in logging.
    fn name(&self) -> &str;

    /// The store this provider offers at `context`, if any. Returning
    /// `Ok(None)` means "no opinion here"; an `Err` is logged and the
    /// provider is skipped for the rest of this lookup (§4.7,
    /// `OptionalDependencyMissing`).
    fn store_for(&self, context: &Arc<Context>) -> crate::error::Result<Option<Arc<dyn ReadOnlyStore>>>;
}

/// An allow/deny policy over provider names, plus a per-provider credential
/// type restriction. An empty name allow-list means "all providers
/// allowed" (the name deny-list still applies on top); similarly, a
/// provider absent from `type_allow` has no type restriction (the
/// `type_deny` list still applies on top).
#[derive(Debug, Clone, Default)]
pub struct Policy {
    allow: Vec<String>,
    deny: Vec<String>,
    type_allow: HashMap<String, Vec<CredentialType>>,
    type_deny: HashMap<String, Vec<CredentialType>>,
}

impl Policy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn with_allow(mut self, name: impl Into<String>) -> Self {
        self.allow.push(name.into());
        self
    }

    pub fn with_deny(mut self, name: impl Into<String>) -> Self {
        self.deny.push(name.into());
        self
    }

    /// Restrict `provider` to only the listed credential types, on top of
    /// whatever `with_type_deny` also excludes.
    pub fn with_type_allow(mut self, provider: impl Into<String>, credential_type: CredentialType) -> Self {
        self.type_allow.entry(provider.into()).or_default().push(credential_type);
        self
    }

    /// Exclude `credential_type` from `provider` regardless of
    /// `with_type_allow`.
    pub fn with_type_deny(mut self, provider: impl Into<String>, credential_type: CredentialType) -> Self {
        self.type_deny.entry(provider.into()).or_default().push(credential_type);
        self
    }

    /// The admission rule: the provider-name policy must permit `provider_name`,
    /// AND `credential_type` must not be on that provider's type deny-list,
    /// AND (the provider has no type allow-list, or `credential_type` is on it).
    pub fn permits(&self, provider_name: &str, credential_type: CredentialType) -> bool {
        if self.deny.iter().any(|d| d == provider_name) {
            return false;
        }
        if !(self.allow.is_empty() || self.allow.iter().any(|a| a == provider_name)) {
            return false;
        }
        if let Some(denied) = self.type_deny.get(provider_name) {
            if denied.contains(&credential_type) {
                return false;
            }
        }
        if let Some(allowed) = self.type_allow.get(provider_name) {
            if !allowed.contains(&credential_type) {
                return false;
            }
        }
        true
    }
}

/// The registry of active providers, gated by an immutable policy snapshot.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    policy: RwLock<Arc<Policy>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            policy: RwLock::new(Arc::new(Policy::allow_all())),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Look up a registered provider by its name, for store-token
    /// resolution (§6).
    pub fn provider_named(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Atomically replace the policy; readers in flight keep the snapshot
    /// they already took.
    pub fn set_policy(&self, policy: Policy) {
        *self.policy.write().expect("policy lock poisoned") = Arc::new(policy);
    }

    fn policy_snapshot(&self) -> Arc<Policy> {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Every store reachable from `context`'s ancestry, nearest-node first,
    /// across every enabled provider (§4.7 step 2), paired with the context
    /// node it was supplied at (the resolution engine needs this to decide
    /// `SYSTEM`/`USER` scope visibility per credential). A provider whose
    /// `store_for` errors is logged and skipped, not propagated.
    pub fn stores_of(
        &self,
        context: &Arc<Context>,
        principal: &Principal,
        credential_type: CredentialType,
    ) -> Vec<(Arc<Context>, Arc<dyn ReadOnlyStore>)> {
        let policy = self.policy_snapshot();
        let nodes = self.ancestry_for_lookup(context, principal, &policy, credential_type);
        let mut found = Vec::new();
        for node in nodes {
            for provider in &self.providers {
                if !policy.permits(provider.name(), credential_type) {
                    continue;
                }
                match provider.store_for(&node) {
                    Ok(Some(store)) => found.push((node.clone(), store)),
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!(
                            "provider {} could not supply a store for context {}: {err}",
                            provider.name(),
                            node.name()
                        );
                    }
                }
            }
        }
        found
    }

    /// §9 Open Question 1's exception: [`Context::ancestry`] stops past a
    /// `User` node that isn't `principal`'s own. It continues anyway, to the
    /// unrestricted [`Context::full_ancestry`], when `principal` holds
    /// `UseItem` on whatever store an enabled provider offers at the root —
    /// that grant is itself permission to see past any one user's boundary.
    fn ancestry_for_lookup(
        &self,
        context: &Arc<Context>,
        principal: &Principal,
        policy: &Policy,
        credential_type: CredentialType,
    ) -> Vec<Arc<Context>> {
        let truncated = context.ancestry(principal);
        let full = context.full_ancestry();
        if truncated.len() == full.len() {
            return truncated;
        }
        let Some(root) = full.last() else {
            return truncated;
        };
        let root_grants_use_item = self.providers.iter().any(|provider| {
            policy.permits(provider.name(), credential_type)
                && matches!(
                    provider.store_for(root),
                    Ok(Some(store)) if store.has_permission(principal, Permission::UseItem)
                )
        });
        if root_grants_use_item { full } else { truncated }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKind;
    use crate::permission::{AccessControl, Permission};
    use crate::principal::Principal;
    use crate::scope::Scope;
    use crate::store::InMemoryStore;

    struct AllowAll;
    impl AccessControl for AllowAll {
        fn has_permission(&self, _principal: &Principal, _perm: Permission) -> bool {
            true
        }
    }

    struct FixedProvider {
        name: String,
        store: Arc<dyn ReadOnlyStore>,
    }

    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            &self.name
        }
        fn store_for(
            &self,
            _context: &Arc<Context>,
        ) -> crate::error::Result<Option<Arc<dyn ReadOnlyStore>>> {
            Ok(Some(self.store.clone()))
        }
    }

    #[test]
    fn enabled_provider_contributes_a_store_per_ancestor() {
        let root = Context::root("org");
        let leaf = crate::context::Context::child(&root, "proj", ContextKind::Leaf);
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "p1".into(),
            store: store as Arc<dyn ReadOnlyStore>,
        }));
        let stores = registry.stores_of(
            &leaf,
            &Principal::System,
            crate::credential::CredentialType::SecretText,
        );
        assert_eq!(stores.len(), 2); // leaf + root
    }

    #[test]
    fn denied_provider_contributes_nothing() {
        let root = Context::root("org");
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "p1".into(),
            store: store as Arc<dyn ReadOnlyStore>,
        }));
        registry.set_policy(Policy::allow_all().with_deny("p1"));
        assert!(registry
            .stores_of(&root, &Principal::System, crate::credential::CredentialType::SecretText)
            .is_empty());
    }

    #[test]
    fn type_deny_blocks_a_specific_credential_type_only() {
        let root = Context::root("org");
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "p1".into(),
            store: store as Arc<dyn ReadOnlyStore>,
        }));
        registry.set_policy(
            Policy::allow_all().with_type_deny("p1", crate::credential::CredentialType::SshPrivateKey),
        );
        assert!(registry
            .stores_of(&root, &Principal::System, crate::credential::CredentialType::SshPrivateKey)
            .is_empty());
        assert_eq!(
            registry
                .stores_of(&root, &Principal::System, crate::credential::CredentialType::SecretText)
                .len(),
            1
        );
    }

    #[test]
    fn type_allow_restricts_to_the_listed_types() {
        let root = Context::root("org");
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "p1".into(),
            store: store as Arc<dyn ReadOnlyStore>,
        }));
        registry.set_policy(
            Policy::allow_all().with_type_allow("p1", crate::credential::CredentialType::SecretText),
        );
        assert_eq!(
            registry
                .stores_of(&root, &Principal::System, crate::credential::CredentialType::SecretText)
                .len(),
            1
        );
        assert!(registry
            .stores_of(&root, &Principal::System, crate::credential::CredentialType::Certificate)
            .is_empty());
    }

    #[test]
    fn use_item_at_root_reopens_the_path_past_a_foreign_user_node() {
        use crate::permission::AccessControl;

        struct GrantsUseItem;
        impl AccessControl for GrantsUseItem {
            fn has_permission(&self, _principal: &Principal, perm: crate::permission::Permission) -> bool {
                perm == crate::permission::Permission::UseItem
            }
        }

        let root = Context::root("org");
        let user = Context::child(&root, "alice", ContextKind::User);
        let leaf = Context::child(&user, "job", ContextKind::Leaf);

        struct EveryNodeProvider;
        impl Provider for EveryNodeProvider {
            fn name(&self) -> &str {
                "every-node"
            }
            fn store_for(
                &self,
                context: &Arc<Context>,
            ) -> crate::error::Result<Option<Arc<dyn ReadOnlyStore>>> {
                Ok(Some(InMemoryStore::new(
                    context.name().to_string(),
                    vec![Scope::Global],
                    Arc::new(GrantsUseItem),
                ) as Arc<dyn ReadOnlyStore>))
            }
        }

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EveryNodeProvider));
        let mallory = Principal::User("mallory".into());
        let stores = registry.stores_of(&leaf, &mallory, crate::credential::CredentialType::SecretText);
        // without the UseItem grant this would stop at "alice" (2 nodes);
        // with it, "org" is reachable too.
        assert_eq!(stores.len(), 3);
    }
}
