/*!

An in-process, optionally file-backed store (§4.5), grounded in the
teacher's `sample::store::Store`: a `dashmap`-friendly shared map guarded by
a lock, persisted as `ron` when a backing path is configured.

Unlike the teacher's store, which keeps a flat `CredMap`, this one tracks
domains as first-class records since domain/specification matching (§4.3)
is central to lookup. Persistence upgrades a legacy flat credential list
(no domain records at all) into a single global domain on load, so stores
written before domains existed keep working.
*/
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bulk::{BulkChangeScope, BulkDepth, Saveable};
use crate::credential::Credential;
use crate::domain::{Domain, DomainData};
use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::permission::{AccessControl, Permission};
use crate::principal::Principal;
use crate::scope::Scope;

use super::{MutableDomainsStore, MutableStore, ReadOnlyStore};

#[derive(Default, Serialize, Deserialize)]
struct PersistedData {
    domains: Vec<DomainData>,
    /// `(domain name, credential)`; `None` is the global domain.
    credentials: Vec<(Option<String>, Credential)>,
}

/// `(domain, id)`: the same id may exist in more than one domain within a
/// store (§4.3's "id collisions across domains are permitted"), so the id
/// alone can't be the key.
type CredentialKey = (Option<String>, String);

struct StoreState {
    domains: HashMap<Option<String>, DomainData>,
    credentials: HashMap<CredentialKey, Credential>,
}

impl StoreState {
    fn empty() -> Self {
        Self {
            domains: HashMap::new(),
            credentials: HashMap::new(),
        }
    }

    fn to_persisted(&self) -> PersistedData {
        PersistedData {
            domains: self.domains.values().cloned().collect(),
            credentials: self
                .credentials
                .iter()
                .map(|((domain, _), credential)| (domain.clone(), credential.clone()))
                .collect(),
        }
    }

    fn from_persisted(data: PersistedData) -> Self {
        let mut domains = HashMap::new();
        for domain in data.domains {
            domains.insert(domain.name.clone(), domain);
        }
        let mut credentials = HashMap::new();
        for (domain_name, credential) in data.credentials {
            let key = (domain_name, credential.id().to_string());
            credentials.insert(key, credential);
        }
        Self {
            domains,
            credentials,
        }
    }
}

/// A store held entirely in memory, optionally persisted to a `ron` file.
pub struct InMemoryStore {
    id: String,
    scopes: Vec<Scope>,
    acl: Arc<dyn AccessControl>,
    state: RwLock<StoreState>,
    backing: Option<String>,
    persist_lock: std::sync::Mutex<()>,
    bulk_depth: Arc<BulkDepth>,
}

impl InMemoryStore {
    pub fn new(id: impl Into<String>, scopes: Vec<Scope>, acl: Arc<dyn AccessControl>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            scopes,
            acl,
            state: RwLock::new(StoreState::empty()),
            backing: None,
            persist_lock: std::sync::Mutex::new(()),
            bulk_depth: Arc::new(BulkDepth::new()),
        })
    }

    /// Open (or create) a store backed by `path`. If the file exists, it is
    /// loaded; a legacy flat `Vec<Credential>` is upgraded into a single
    /// global domain.
    pub fn open(
        id: impl Into<String>,
        scopes: Vec<Scope>,
        acl: Arc<dyn AccessControl>,
        path: impl Into<String>,
    ) -> Result<Arc<Self>> {
        let path = path.into();
        let state = Self::load(&path)?;
        Ok(Arc::new(Self {
            id: id.into(),
            scopes,
            acl,
            state: RwLock::new(state),
            backing: Some(path),
            persist_lock: std::sync::Mutex::new(()),
            bulk_depth: Arc::new(BulkDepth::new()),
        }))
    }

    fn load(path: &str) -> Result<StoreState> {
        if !std::path::Path::new(path).exists() {
            return Ok(StoreState::empty());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Io(Box::new(e)))?;
        if let Ok(data) = ron::de::from_str::<PersistedData>(&contents) {
            return Ok(StoreState::from_persisted(data));
        }
        // Legacy shape: a bare list of credentials, all implicitly global.
        let legacy: Vec<Credential> = ron::de::from_str(&contents)
            .map_err(|e| Error::Io(Box::new(e)))?;
        warn!("upgrading legacy flat credential list at {path} into the global domain");
        let mut credentials = HashMap::new();
        for credential in legacy {
            let key = (None, credential.id().to_string());
            credentials.insert(key, credential);
        }
        Ok(StoreState {
            domains: HashMap::new(),
            credentials,
        })
    }

    /// Open a bulk change scope over this store: saves are suppressed until
    /// the outermost returned guard is dropped.
    pub fn bulk_change_scope(self: &Arc<Self>) -> BulkChangeScope<InMemoryStore> {
        BulkChangeScope::new(self.clone(), self.bulk_depth.clone())
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.backing else {
            return Ok(());
        };
        if self.bulk_depth.is_suppressed() {
            return Ok(());
        }
        let _guard = self.persist_lock.lock().expect("persist lock poisoned");
        let data = {
            let state = self.state.read().expect("store state lock poisoned");
            state.to_persisted()
        };
        let content = ron::ser::to_string_pretty(&data, ron::ser::PrettyConfig::new())
            .map_err(|e| Error::Io(Box::new(e)))?;
        std::fs::write(path, content).map_err(|e| Error::Io(Box::new(e)))?;
        debug!("store {} persisted {} credential(s)", self.id, data.credentials.len());
        Ok(())
    }

    fn require(&self, principal: &Principal, perm: Permission) -> Result<()> {
        if self.acl.has_permission(principal, perm) {
            Ok(())
        } else {
            Err(Error::Unauthorised(perm))
        }
    }
}

impl Saveable for InMemoryStore {
    fn save(&self) -> Result<()> {
        self.persist()
    }
}

impl AccessControl for InMemoryStore {
    fn has_permission(&self, principal: &Principal, perm: Permission) -> bool {
        self.acl.has_permission(principal, perm)
    }
}

impl ReadOnlyStore for InMemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    fn domains(&self) -> Vec<Domain> {
        let state = self.state.read().expect("store state lock poisoned");
        state
            .domains
            .values()
            .filter_map(|data| Domain::compile(data.clone()).ok())
            .collect()
    }

    fn domain_by_name(&self, name: Option<&str>) -> Option<Domain> {
        let state = self.state.read().expect("store state lock poisoned");
        let key = name.map(str::to_string);
        if key.is_none() && !state.domains.contains_key(&None) {
            // the global domain always exists, even if never explicitly added
            return Some(Domain::global(""));
        }
        state
            .domains
            .get(&key)
            .and_then(|data| Domain::compile(data.clone()).ok())
    }

    fn credentials(&self, domain: Option<&str>, matcher: &Matcher) -> Result<Vec<Credential>> {
        let state = self.state.read().expect("store state lock poisoned");
        let key = domain.map(str::to_string);
        Ok(state
            .credentials
            .iter()
            .filter(|((domain_name, _), _)| *domain_name == key)
            .map(|(_, credential)| credential)
            .filter(|credential| matcher.matches(credential))
            .cloned()
            .collect())
    }

    fn as_mutable(&self) -> Option<&dyn MutableStore> {
        Some(self)
    }

    fn as_mutable_domains(&self) -> Option<&dyn MutableDomainsStore> {
        Some(self)
    }
}

impl MutableStore for InMemoryStore {
    fn add_credential(
        &self,
        principal: &Principal,
        domain: Option<&str>,
        credential: Credential,
    ) -> Result<()> {
        self.require(principal, Permission::Create)?;
        let key = (domain.map(str::to_string), credential.id().to_string());
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            if state.credentials.contains_key(&key) {
                return Err(Error::Conflict(format!(
                    "credential {} already exists in domain {:?}",
                    key.1, key.0
                )));
            }
            state.credentials.insert(key, credential);
        }
        self.persist()
    }

    fn remove_credential(&self, principal: &Principal, domain: Option<&str>, id: &str) -> Result<()> {
        self.require(principal, Permission::Delete)?;
        let key = (domain.map(str::to_string), id.to_string());
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            if state.credentials.remove(&key).is_none() {
                return Err(Error::NotFound(format!("credential {id}")));
            }
        }
        self.persist()
    }

    fn update_credential(
        &self,
        principal: &Principal,
        domain: Option<&str>,
        cur: Credential,
        replacement: Credential,
    ) -> Result<()> {
        self.require(principal, Permission::Update)?;
        let key = (domain.map(str::to_string), replacement.id().to_string());
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            match state.credentials.get(&key) {
                None => return Err(Error::NotFound(format!("credential {}", key.1))),
                Some(stored) if *stored != cur => {
                    return Err(Error::Concurrent(format!(
                        "credential {} changed since it was last read",
                        key.1
                    )));
                }
                Some(_) => {}
            }
            state.credentials.insert(key, replacement);
        }
        self.persist()
    }

    fn save(&self) -> Result<()> {
        self.persist()
    }
}

impl MutableDomainsStore for InMemoryStore {
    fn add_domain(&self, principal: &Principal, domain: Domain) -> Result<()> {
        self.require(principal, Permission::ManageDomains)?;
        let data = domain.data();
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            if state.domains.contains_key(&data.name) {
                return Err(Error::Conflict(format!(
                    "domain {:?} already exists",
                    data.name
                )));
            }
            state.domains.insert(data.name.clone(), data);
        }
        self.persist()
    }

    fn remove_domain(&self, principal: &Principal, name: &str) -> Result<()> {
        self.require(principal, Permission::ManageDomains)?;
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            if state.domains.remove(&Some(name.to_string())).is_none() {
                return Err(Error::NotFound(format!("domain {name}")));
            }
        }
        self.persist()
    }

    fn update_domain(&self, principal: &Principal, domain: Domain) -> Result<()> {
        self.require(principal, Permission::ManageDomains)?;
        let data = domain.data();
        {
            let mut state = self.state.write().expect("store state lock poisoned");
            if !state.domains.contains_key(&data.name) {
                return Err(Error::NotFound(format!("domain {:?}", data.name)));
            }
            state.domains.insert(data.name.clone(), data);
        }
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::AesGcmCipherService;
    use crate::credential::CredentialPayload;
    use crate::secret::SecretString;

    struct AllowAll;
    impl AccessControl for AllowAll {
        fn has_permission(&self, _principal: &Principal, _perm: Permission) -> bool {
            true
        }
    }

    struct DenyAll;
    impl AccessControl for DenyAll {
        fn has_permission(&self, _principal: &Principal, _perm: Permission) -> bool {
            false
        }
    }

    fn credential(id: &str) -> Credential {
        let cipher = AesGcmCipherService::new([4u8; 32]);
        Credential::new(
            Scope::Global,
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

    #[test]
    fn add_then_read_back_credential() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let principal = Principal::System;
        store
            .add_credential(&principal, None, credential("k1"))
            .unwrap();
        let found = store.credentials(None, &Matcher::AlwaysMatch).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "k1");
    }

    #[test]
    fn duplicate_id_is_conflict() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let principal = Principal::System;
        store
            .add_credential(&principal, None, credential("k1"))
            .unwrap();
        let result = store.add_credential(&principal, None, credential("k1"));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn same_id_in_different_domains_does_not_conflict() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let principal = Principal::System;
        store
            .add_credential(&principal, None, credential("k1"))
            .unwrap();
        store
            .add_credential(&principal, Some("team-a"), credential("k1"))
            .unwrap();
        assert_eq!(store.credentials(None, &Matcher::AlwaysMatch).unwrap().len(), 1);
        assert_eq!(
            store.credentials(Some("team-a"), &Matcher::AlwaysMatch).unwrap().len(),
            1
        );
    }

    #[test]
    fn removing_missing_credential_is_not_found() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let result = store.remove_credential(&Principal::System, None, "nope");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn update_with_stale_cur_is_concurrent_error() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let principal = Principal::System;
        store
            .add_credential(&principal, None, credential("k1"))
            .unwrap();
        let stale = credential("k1");
        let replacement = credential("k1");
        // `credential("k1")` re-encrypts "x" under a fresh nonce each call,
        // so even same-plaintext ciphertext differs — this is already a
        // "stale" read relative to what add_credential stored.
        let result = store.update_credential(&principal, None, stale, replacement);
        assert!(matches!(result, Err(Error::Concurrent(_))));
    }

    #[test]
    fn update_with_matching_cur_succeeds() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let principal = Principal::System;
        let original = credential("k1");
        store.add_credential(&principal, None, original.clone()).unwrap();
        let replacement = credential("k1");
        store
            .update_credential(&principal, None, original, replacement)
            .unwrap();
    }

    #[test]
    fn denied_principal_is_unauthorised() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(DenyAll));
        let result = store.add_credential(&Principal::System, None, credential("k1"));
        assert!(matches!(result, Err(Error::Unauthorised(Permission::Create))));
    }

    #[test]
    fn global_domain_exists_even_when_never_added() {
        let store = InMemoryStore::new("s1", vec![Scope::Global], Arc::new(AllowAll));
        let domain = store.domain_by_name(None).expect("global domain");
        assert!(domain.is_global());
    }

    #[test]
    fn persists_and_reloads_through_a_backing_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("credentials-core-test-{}.ron", credential_test_suffix()));
        let path_str = path.to_string_lossy().to_string();
        {
            let store =
                InMemoryStore::open("s1", vec![Scope::Global], Arc::new(AllowAll), &path_str)
                    .unwrap();
            store
                .add_credential(&Principal::System, None, credential("persisted"))
                .unwrap();
        }
        let reopened =
            InMemoryStore::open("s1", vec![Scope::Global], Arc::new(AllowAll), &path_str).unwrap();
        let found = reopened
            .credentials(None, &Matcher::AlwaysMatch)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "persisted");
        let _ = std::fs::remove_file(&path_str);
    }

    fn credential_test_suffix() -> String {
        format!("{:?}", std::thread::current().id()).replace(['(', ')'], "")
    }
}
