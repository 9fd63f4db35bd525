/*!

The resolution engine (§4.7): queries provider-supplied stores along a
context's ancestry, merges, filters, and deduplicates.

Grounded in the teacher's `keyring_core::Entry` as the "ask a registry of
backends for the thing with this name" shape, generalized from a single
flat registry to a context-walking, domain-matching, ACL-aware lookup.
*/
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::{Context, ContextKind};
use crate::credential::{Credential, CredentialType};
use crate::error::{Error, Result};
use crate::legacy::LegacyResolverRegistry;
use crate::matcher::Matcher;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::provider::ProviderRegistry;
use crate::requirement::Requirement;
use crate::scope::Scope;
use crate::store::ReadOnlyStore;

/// A cooperative cancellation flag, checked between provider iterations.
/// The core is synchronous, so this plays the role the ecosystem's
/// async cancellation tokens play elsewhere: a caller on another thread
/// flips it, the engine notices at the next checkpoint and discards
/// whatever partial results it had accumulated.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stateless: safe to share across threads and to invoke concurrently.
pub struct ResolutionEngine {
    providers: Arc<ProviderRegistry>,
    legacy: Arc<LegacyResolverRegistry>,
}

impl ResolutionEngine {
    pub fn new(providers: Arc<ProviderRegistry>, legacy: Arc<LegacyResolverRegistry>) -> Self {
        Self { providers, legacy }
    }

    /// Core lookup (§4.7). `matcher` is applied in addition to `type` and
    /// `requirements`; describable matchers are pushed into the per-store
    /// query rather than filtered afterward, so a remote-backed store has
    /// the chance to apply them server-side.
    pub fn lookup(
        &self,
        credential_type: CredentialType,
        context: &Arc<Context>,
        principal: &Principal,
        requirements: &[Requirement],
        matcher: &Matcher,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Credential>> {
        if let Some(resolver) = self.legacy.resolver_for(credential_type) {
            let sourced = self.lookup(
                resolver.from_type(),
                context,
                principal,
                requirements,
                matcher,
                cancellation,
            )?;
            return Ok(sourced.iter().filter_map(|c| resolver.project(c)).collect());
        }

        let effective = Matcher::and(vec![Matcher::ByType(credential_type), matcher.clone()]);
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for (node, store) in self.providers.stores_of(context, principal, credential_type) {
            if cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.collect_from_store(&node, &*store, principal, requirements, &effective, &mut results, &mut seen)?;

            let delegates_to_system = !principal.is_system()
                && (store.has_permission(principal, Permission::UseItem)
                    || store.has_permission(principal, Permission::UseOwn));
            if delegates_to_system {
                self.collect_from_store(
                    &node,
                    &*store,
                    &Principal::System,
                    requirements,
                    &effective,
                    &mut results,
                    &mut seen,
                )?;
            }
        }
        Ok(results)
    }

    fn collect_from_store(
        &self,
        node: &Arc<Context>,
        store: &dyn ReadOnlyStore,
        principal: &Principal,
        requirements: &[Requirement],
        matcher: &Matcher,
        results: &mut Vec<Credential>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        if !store.has_permission(principal, Permission::View) {
            return Ok(());
        }
        let mut domains = store.domains();
        if domains.iter().all(|d| !d.is_global()) {
            // the global domain always exists even when a store never
            // explicitly records it (see InMemoryStore::domain_by_name)
            if let Some(global) = store.domain_by_name(None) {
                domains.push(global);
            }
        }
        for domain in domains {
            if !domain.matches(requirements) {
                continue;
            }
            let domain_name = domain.name.as_deref();
            for credential in store.credentials(domain_name, matcher)? {
                if !Self::visible_here(&credential, node, principal) {
                    continue;
                }
                if seen.insert(credential.id().to_string()) {
                    results.push(credential);
                }
            }
        }
        Ok(())
    }

    /// §4.2's scope-visibility rule, independent of whatever ACL grant let
    /// the caller see this store at all: `SYSTEM` only at the root context,
    /// `USER` only to the context's own defining user, `GLOBAL` always.
    fn visible_here(credential: &Credential, node: &Arc<Context>, principal: &Principal) -> bool {
        match credential.scope {
            // Only the SYSTEM principal itself, querying the root context,
            // satisfies "the consumer's context is the root installation" —
            // a non-system principal only ever reaches this as `principal`
            // during the UseItem/UseOwn requery in `lookup`, never on its
            // own plain View grant.
            Scope::System => principal.is_system() && node.kind() == ContextKind::Root,
            Scope::Global => true,
            Scope::User => node.user_principal().as_ref() == Some(principal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::AesGcmCipherService;
    use crate::context::ContextKind;
    use crate::credential::CredentialPayload;
    use crate::permission::AccessControl;
    use crate::scope::Scope;
    use crate::secret::SecretString;
    use crate::store::InMemoryStore;

    struct AllowAll;
    impl AccessControl for AllowAll {
        fn has_permission(&self, _principal: &Principal, _perm: Permission) -> bool {
            true
        }
    }

    struct ViewOnly;
    impl AccessControl for ViewOnly {
        fn has_permission(&self, _principal: &Principal, perm: Permission) -> bool {
            perm == Permission::View
        }
    }

    struct StorePerContext {
        root_store: Arc<dyn ReadOnlyStore>,
    }

    impl crate::provider::Provider for StorePerContext {
        fn name(&self) -> &str {
            "root-provider"
        }
        fn store_for(&self, context: &Arc<Context>) -> Result<Option<Arc<dyn ReadOnlyStore>>> {
            if context.is_root() {
                Ok(Some(self.root_store.clone()))
            } else {
                Ok(None)
            }
        }
    }

    fn credential(id: &str, scope: Scope) -> Credential {
        let cipher = AesGcmCipherService::new([8u8; 32]);
        Credential::new(
            scope,
            id,
            "",
            CredentialPayload::SecretText {
                secret: SecretString::encrypt(&cipher, "x").unwrap(),
            },
            false,
            &cipher,
        )
        .unwrap()
    }

    fn engine_with_root_store(store: Arc<InMemoryStore>) -> (ResolutionEngine, Arc<Context>) {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StorePerContext {
            root_store: store as Arc<dyn ReadOnlyStore>,
        }));
        let root = Context::root("root");
        let folder = Context::child(&root, "team", ContextKind::Folder);
        let leaf = Context::child(&folder, "job", ContextKind::Leaf);
        let engine = ResolutionEngine::new(Arc::new(registry), Arc::new(LegacyResolverRegistry::new()));
        (engine, leaf)
    }

    #[test]
    fn basic_lookup_finds_global_credential_from_root_store() {
        let store = InMemoryStore::new("root-store", vec![Scope::Global], Arc::new(AllowAll));
        store
            .add_credential(&Principal::System, None, credential("deploy", Scope::Global))
            .unwrap();
        let (engine, leaf) = engine_with_root_store(store);
        let found = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::System,
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "deploy");
    }

    #[test]
    fn results_are_id_deduplicated() {
        let store = InMemoryStore::new("root-store", vec![Scope::Global], Arc::new(AllowAll));
        store
            .add_credential(&Principal::System, None, credential("deploy", Scope::Global))
            .unwrap();
        let (engine, leaf) = engine_with_root_store(store);
        // looking up as SYSTEM means the USE_ITEM/USE_OWN requery branch
        // never fires, so this also checks the normal single-pass path
        // doesn't somehow double the result.
        let found = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::System,
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        let ids: HashSet<_> = found.iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids.len(), found.len());
    }

    #[test]
    fn cancelled_token_aborts_lookup() {
        let store = InMemoryStore::new("root-store", vec![Scope::Global], Arc::new(AllowAll));
        let (engine, leaf) = engine_with_root_store(store);
        let token = CancellationToken::new();
        token.cancel();
        let result = engine.lookup(
            crate::credential::CredentialType::SecretText,
            &leaf,
            &Principal::System,
            &[],
            &Matcher::AlwaysMatch,
            &token,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn non_system_principal_with_use_item_also_sees_system_credentials() {
        let store = InMemoryStore::new("root-store", vec![Scope::System], Arc::new(AllowAll));
        store
            .add_credential(&Principal::System, None, credential("root-ca", Scope::System))
            .unwrap();
        let (engine, leaf) = engine_with_root_store(store);
        let found = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::User("alice".into()),
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        // AllowAll grants UseItem to everyone, so the SYSTEM requery fires
        // and alice sees the SYSTEM-scoped credential too.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "root-ca");
    }

    #[test]
    fn plain_view_alone_never_sees_a_system_scoped_credential() {
        let store = InMemoryStore::new("root-store", vec![Scope::System], Arc::new(ViewOnly));
        store
            .add_credential(&Principal::System, None, credential("root-ca", Scope::System))
            .unwrap();
        let (engine, leaf) = engine_with_root_store(store);
        let found = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::User("mallory".into()),
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        // ViewOnly grants neither UseItem nor UseOwn, so no SYSTEM requery
        // fires, and the direct pass must not leak the SYSTEM-scoped
        // credential just because mallory can View the store.
        assert!(found.is_empty());
    }

    struct StoreAtUserNode {
        store: Arc<dyn ReadOnlyStore>,
    }

    impl crate::provider::Provider for StoreAtUserNode {
        fn name(&self) -> &str {
            "user-provider"
        }
        fn store_for(&self, context: &Arc<Context>) -> Result<Option<Arc<dyn ReadOnlyStore>>> {
            if context.name() == "alice" {
                Ok(Some(self.store.clone()))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn user_scoped_credential_is_invisible_outside_its_defining_user_context() {
        let store = InMemoryStore::new("user-store", vec![Scope::User], Arc::new(AllowAll));
        store
            .add_credential(&Principal::System, None, credential("alices-key", Scope::User))
            .unwrap();
        let root = Context::root("org");
        let alice_ctx = Context::child(&root, "alice", ContextKind::User);
        let leaf = Context::child(&alice_ctx, "job", ContextKind::Leaf);

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StoreAtUserNode {
            store: store as Arc<dyn ReadOnlyStore>,
        }));
        let engine = ResolutionEngine::new(Arc::new(registry), Arc::new(LegacyResolverRegistry::new()));

        let as_alice = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::User("alice".into()),
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(as_alice.len(), 1);

        let as_mallory = engine
            .lookup(
                crate::credential::CredentialType::SecretText,
                &leaf,
                &Principal::User("mallory".into()),
                &[],
                &Matcher::AlwaysMatch,
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(as_mallory.is_empty());
    }
}
