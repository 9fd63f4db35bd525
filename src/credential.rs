/*!

Credentials (§3, component D): immutable, typed records bearing one or more
encrypted secret fields.

Five built-in variants, matching §1's "minimal set": username/password,
secret text, secret file, certificate, SSH private key. Per the Non-goals,
this is the complete set the core ships — concrete credential type
implementations beyond it are an external collaborator's job.
 */
use serde::{Deserialize, Serialize};

use crate::cipher::CipherService;
use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::secret::{SecretBytes, SecretString};

const FIPS_MIN_PASSWORD_LEN: usize = 14;

/// The credential type tag (§3 "type tag").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    UsernamePassword,
    SecretText,
    SecretFile,
    Certificate,
    SshPrivateKey,
}

impl CredentialType {
    pub fn tag(&self) -> &'static str {
        match self {
            CredentialType::UsernamePassword => "usernamePassword",
            CredentialType::SecretText => "secretText",
            CredentialType::SecretFile => "secretFile",
            CredentialType::Certificate => "certificate",
            CredentialType::SshPrivateKey => "sshPrivateKey",
        }
    }
}

/// The type-specific encrypted payload (§3 "secret payload").
#[derive(Clone, Serialize, Deserialize)]
pub enum CredentialPayload {
    UsernamePassword {
        username: String,
        password: SecretString,
        /// When set, the username itself is sensitive and should be
        /// redacted alongside the password (§3 "Optional flags per type").
        username_is_secret: bool,
    },
    SecretText {
        secret: SecretString,
    },
    SecretFile {
        file_name: String,
        contents: SecretBytes,
    },
    Certificate {
        key_store: SecretBytes,
        passphrase: SecretString,
    },
    SshPrivateKey {
        username: String,
        private_key: SecretBytes,
        passphrase: Option<SecretString>,
    },
}

impl CredentialPayload {
    pub fn credential_type(&self) -> CredentialType {
        match self {
            CredentialPayload::UsernamePassword { .. } => CredentialType::UsernamePassword,
            CredentialPayload::SecretText { .. } => CredentialType::SecretText,
            CredentialPayload::SecretFile { .. } => CredentialType::SecretFile,
            CredentialPayload::Certificate { .. } => CredentialType::Certificate,
            CredentialPayload::SshPrivateKey { .. } => CredentialType::SshPrivateKey,
        }
    }
}

/// An immutable credential record (§3).
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub scope: Scope,
    id: String,
    pub description: String,
    pub payload: CredentialPayload,
}

impl Credential {
    /// Construct a credential, enforcing the non-empty-id invariant and,
    /// when `fips` is set, the minimum password length for
    /// `UsernamePassword` credentials.
    pub fn new(
        scope: Scope,
        id: impl Into<String>,
        description: impl Into<String>,
        payload: CredentialPayload,
        fips: bool,
        cipher: &dyn CipherService,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidArgument("id".into(), "must not be empty".into()));
        }
        if fips {
            if let CredentialPayload::UsernamePassword { password, .. } = &payload {
                let len = password.reveal(cipher, |p| p.chars().count())?;
                if len < FIPS_MIN_PASSWORD_LEN {
                    return Err(Error::InvalidArgument(
                        "password".into(),
                        format!("must be at least {FIPS_MIN_PASSWORD_LEN} characters under FIPS"),
                    ));
                }
            }
        }
        Ok(Self {
            scope,
            id,
            description: description.into(),
            payload,
        })
    }

    /// Construct a credential without running validation, for internal use
    /// by code that is itself deriving the credential from an
    /// already-validated one (legacy projections, store deserialisation).
    pub(crate) fn unchecked(
        scope: Scope,
        id: impl Into<String>,
        description: impl Into<String>,
        payload: CredentialPayload,
    ) -> Self {
        Self {
            scope,
            id: id.into(),
            description: description.into(),
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn credential_type(&self) -> CredentialType {
        self.payload.credential_type()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.scope == other.scope
            && self.id == other.id
            && self.description == other.description
            && self.payload.credential_type() == other.payload.credential_type()
            && payload_ciphertexts_eq(&self.payload, &other.payload)
    }
}

fn payload_ciphertexts_eq(a: &CredentialPayload, b: &CredentialPayload) -> bool {
    use CredentialPayload::*;
    match (a, b) {
        (
            UsernamePassword {
                username: u1,
                password: p1,
                username_is_secret: s1,
            },
            UsernamePassword {
                username: u2,
                password: p2,
                username_is_secret: s2,
            },
        ) => u1 == u2 && p1 == p2 && s1 == s2,
        (SecretText { secret: s1 }, SecretText { secret: s2 }) => s1 == s2,
        (
            SecretFile {
                file_name: f1,
                contents: c1,
            },
            SecretFile {
                file_name: f2,
                contents: c2,
            },
        ) => f1 == f2 && c1 == c2,
        (
            Certificate {
                key_store: k1,
                passphrase: p1,
            },
            Certificate {
                key_store: k2,
                passphrase: p2,
            },
        ) => k1 == k2 && p1 == p2,
        (
            SshPrivateKey {
                username: u1,
                private_key: k1,
                passphrase: p1,
            },
            SshPrivateKey {
                username: u2,
                private_key: k2,
                passphrase: p2,
            },
        ) => u1 == u2 && k1 == k2 && p1 == p2,
        _ => false,
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scope", &self.scope)
            .field("id", &self.id)
            .field("description", &self.description)
            .field("type", &self.credential_type().tag())
            .finish()
    }
}
