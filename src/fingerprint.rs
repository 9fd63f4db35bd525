/*!

Fingerprinting and use-tracking (§4.9): a stable content hash per credential,
plus an append-only ledger of where it has been used.

The default hash is MD5 over a deterministic redacted serialisation of the
credential (id, scope, type tag, description) — MD5 here is a content
fingerprint, not a security boundary, so its well-known collision weakness
is immaterial; it's used purely because it's cheap, fixed-width, and stable
across the ecosystem. A `Fingerprint::sha256` constructor is kept alongside
it for deployments that would rather not have MD5 appear in their
dependency tree at all.
 */
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::credential::Credential;

/// A stable content hash for a credential, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The default constructor: MD5 over the credential's stable fields.
    pub fn of(credential: &Credential) -> Self {
        let mut hasher = Md5::new();
        hasher.update(fingerprint_input(credential));
        Self(hex::encode(hasher.finalize()))
    }

    /// An alternate constructor for deployments avoiding MD5 entirely.
    pub fn sha256(credential: &Credential) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint_input(credential));
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fingerprint_input(credential: &Credential) -> String {
    format!(
        "{}|{}|{}|{}",
        credential.scope,
        credential.id(),
        credential.credential_type().tag(),
        credential.description
    )
}

/// Where a credential was consumed: a parameter-bound run, a directly-looked-up
/// item, or a node in a context hierarchy walk (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Facet {
    Run {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
    Item {
        item_name: String,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
    Node {
        node_name: String,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
}

impl Facet {
    fn item_key(&self) -> Option<&str> {
        match self {
            Facet::Item { item_name, .. } => Some(item_name),
            _ => None,
        }
    }

    fn node_key(&self) -> Option<&str> {
        match self {
            Facet::Node { node_name, .. } => Some(node_name),
            _ => None,
        }
    }
}

/// The append-only ledger entry for one fingerprint: every facet it has
/// been used under, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingerprintEntry {
    facets: Vec<Facet>,
}

impl FingerprintEntry {
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }
}

/// The use-tracking ledger: one entry per fingerprint, appended to on every
/// credential consumption. Never pruned; a credential's history persists
/// across rotations and re-saves of the owning store.
pub struct UseTracker {
    ledger: DashMap<Fingerprint, FingerprintEntry>,
    enabled: bool,
}

impl Default for UseTracker {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UseTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            ledger: DashMap::new(),
            enabled,
        }
    }

    /// Record a run's use of `credential`. Tracking is a no-op when the
    /// `fingerprintEnabled` toggle (§4.9, [`crate::config::Config`]) is off.
    pub fn track_run(&self, credential: &Credential, run_id: &str) -> Fingerprint {
        let fingerprint = Fingerprint::of(credential);
        if self.enabled {
            self.ledger.entry(fingerprint.clone()).or_default().facets.push(Facet::Run {
                run_id: run_id.to_string(),
                timestamp: Utc::now(),
            });
        }
        fingerprint
    }

    /// Record an item's use of `credential`, collapsing any prior facet for
    /// the same item so its timeline stays a single entry with a carried-
    /// over `first_seen` (§4.9). `still_exists` is consulted to drop facets
    /// for items that have since been removed.
    pub fn track_item(
        &self,
        credential: &Credential,
        item_name: &str,
        still_exists: impl Fn(&str) -> bool,
    ) -> Fingerprint {
        let fingerprint = Fingerprint::of(credential);
        if self.enabled {
            // per-entry collapsing (retain-then-push) happens under the
            // DashMap shard lock acquired by `entry()`, so concurrent
            // trackers of the same fingerprint never interleave.
            let now = Utc::now();
            let mut entry = self.ledger.entry(fingerprint.clone()).or_default();
            let first_seen = entry
                .facets
                .iter()
                .find(|f| f.item_key() == Some(item_name))
                .and_then(|f| match f {
                    Facet::Item { first_seen, .. } => Some(*first_seen),
                    _ => None,
                })
                .unwrap_or(now);
            entry.facets.retain(|f| match f.item_key() {
                Some(name) => name != item_name && still_exists(name),
                None => true,
            });
            entry.facets.push(Facet::Item {
                item_name: item_name.to_string(),
                first_seen,
                last_seen: now,
            });
        }
        fingerprint
    }

    /// The node analogue of [`UseTracker::track_item`].
    pub fn track_node(
        &self,
        credential: &Credential,
        node_name: &str,
        still_exists: impl Fn(&str) -> bool,
    ) -> Fingerprint {
        let fingerprint = Fingerprint::of(credential);
        if self.enabled {
            // per-entry collapsing (retain-then-push) happens under the
            // DashMap shard lock acquired by `entry()`, so concurrent
            // trackers of the same fingerprint never interleave.
            let now = Utc::now();
            let mut entry = self.ledger.entry(fingerprint.clone()).or_default();
            let first_seen = entry
                .facets
                .iter()
                .find(|f| f.node_key() == Some(node_name))
                .and_then(|f| match f {
                    Facet::Node { first_seen, .. } => Some(*first_seen),
                    _ => None,
                })
                .unwrap_or(now);
            entry.facets.retain(|f| match f.node_key() {
                Some(name) => name != node_name && still_exists(name),
                None => true,
            });
            entry.facets.push(Facet::Node {
                node_name: node_name.to_string(),
                first_seen,
                last_seen: now,
            });
        }
        fingerprint
    }

    /// The recorded uses of `credential`, oldest first. Empty if it has
    /// never been tracked.
    pub fn uses_of(&self, credential: &Credential) -> Vec<Facet> {
        let fingerprint = Fingerprint::of(credential);
        self.ledger
            .get(&fingerprint)
            .map(|entry| entry.facets.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }
}
