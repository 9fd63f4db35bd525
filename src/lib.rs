#![cfg_attr(docsrs, feature(doc_cfg))]
/*!

# credentials-core

A typed, scoped, access-controlled store for secret material: passwords,
tokens, SSH keys, certificates, and opaque blobs.

## Design

The crate is organised around four components:

- **[`store`]** — the credential store abstraction. A store holds
  [`domain::Domain`]s and [`credential::Credential`]s and exposes capability
  through the [`store::ReadOnlyStore`]/[`store::MutableStore`]/
  [`store::MutableDomainsStore`] trait split rather than reflection: a
  store that can't mutate its domain list simply returns `None` from
  [`store::ReadOnlyStore::as_mutable_domains`].
- **[`resolution`]** — the resolution engine, which walks a [`context::Context`]'s
  ancestry through the [`provider::ProviderRegistry`], queries each store
  it finds, and merges and deduplicates the results.
- **[`domain`]**/[`specification`] — the domain/specification matcher,
  deciding which domain a set of caller-supplied [`requirement::Requirement`]s
  falls into.
- **[`credential`]**/[`secret`] — the credential types themselves, each
  carrying one or more [`secret::SecretString`]/[`secret::SecretBytes`]
  fields that are never held as plaintext outside a
  [`secret::SecretString::reveal`] closure.

Supporting these are a [`cipher`] service (AES-256-GCM with key rotation),
a [`matcher`] algebra for filtering credentials, a [`fingerprint`] and
use-tracking ledger, a [`bulk`] change scope for suppressing redundant
saves, and a [`redaction`] helper for scrubbing ciphertext-shaped values out
of free text.

## Thread Safety

Every public type that's meant to be shared across threads is `Send + Sync`;
the resolution engine itself is stateless and safe to invoke concurrently.
Each store serialises its own in-memory mutations behind a single
writer/many-reader lock and persists outside that lock under a separate
mutex, so one slow flush never blocks readers.
*/

pub mod binding;
pub mod bulk;
pub mod cipher;
pub mod cli;
pub mod config;
pub mod context;
pub mod credential;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod legacy;
pub mod matcher;
pub mod permission;
pub mod principal;
pub mod provider;
pub mod redaction;
pub mod requirement;
pub mod resolution;
pub mod scope;
pub mod secret;
pub mod specification;
pub mod store;

pub use cipher::{AesGcmCipherService, CipherService};
pub use config::Config;
pub use context::{Context, ContextKind, ContextResolver, ContextResolverRegistry};
pub use credential::{Credential, CredentialPayload, CredentialType};
pub use domain::{Domain, DomainData};
pub use error::{Error, Result};
pub use matcher::Matcher;
pub use permission::{AccessControl, Permission};
pub use principal::Principal;
pub use provider::{Policy, Provider, ProviderRegistry};
pub use requirement::{Requirement, RequirementKind};
pub use resolution::{CancellationToken, ResolutionEngine};
pub use scope::Scope;
pub use secret::{SecretBytes, SecretString};
pub use specification::{SpecData, Specification};
pub use store::{InMemoryStore, MutableDomainsStore, MutableStore, ReadOnlyStore};
