/*!

Secret primitives (§3, component B): opaque ciphertext wrappers with scoped
plaintext exposure.

Grounded in `neuron-secret::SecretValue` (scoped `with_bytes` exposure, no
`Clone`/`Display`/`Serialize`, zeroized on drop) composed with the teacher's
ciphertext-token shape from [`crate::cipher`]. Unlike `SecretValue`, these
types never hold plaintext at rest — only ciphertext plus a format version
— so `Clone`/`PartialEq`/`Serialize` are safe: they operate purely on the
opaque token.
 */
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher::CipherService;
use crate::error::Result;

/// The literal token substituted for secret material whenever a consumer
/// asks for redaction (§4.10, §7).
pub const REDACTED: &str = "********";

/// An encrypted UTF-8 string: a password, token, or passphrase.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretString {
    ciphertext: String,
}

impl SecretString {
    /// Encrypt `plaintext` into a new `SecretString`.
    pub fn encrypt(cipher: &dyn CipherService, plaintext: &str) -> Result<Self> {
        Ok(Self {
            ciphertext: cipher.encrypt(plaintext.as_bytes())?,
        })
    }

    /// Wrap an already-encrypted token verbatim (used when deserializing a
    /// persisted store, where the ciphertext was produced earlier).
    pub fn from_ciphertext(ciphertext: String) -> Self {
        Self { ciphertext }
    }

    /// The opaque ciphertext token, suitable for persistence.
    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    /// Expose the plaintext only inside the closure; the decrypted buffer
    /// is zeroized on return. This is the only way to read the value.
    pub fn reveal<R>(&self, cipher: &dyn CipherService, f: impl FnOnce(&str) -> R) -> Result<R> {
        let bytes = Zeroizing::new(cipher.decrypt(&self.ciphertext)?);
        let s = std::str::from_utf8(&bytes)
            .map_err(|_| crate::error::Error::PlatformFailure("secret is not valid UTF-8".into()))?;
        Ok(f(s))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// An encrypted byte blob: key material, file contents, certificate bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBytes {
    ciphertext: String,
}

impl SecretBytes {
    pub fn encrypt(cipher: &dyn CipherService, plaintext: &[u8]) -> Result<Self> {
        Ok(Self {
            ciphertext: cipher.encrypt(plaintext)?,
        })
    }

    pub fn from_ciphertext(ciphertext: String) -> Self {
        Self { ciphertext }
    }

    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    pub fn reveal<R>(&self, cipher: &dyn CipherService, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let bytes = Zeroizing::new(cipher.decrypt(&self.ciphertext)?);
        Ok(f(&bytes))
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::AesGcmCipherService;

    fn cipher() -> AesGcmCipherService {
        AesGcmCipherService::new([3u8; 32])
    }

    #[test]
    fn secret_string_roundtrips_through_reveal() {
        let cipher = cipher();
        let secret = SecretString::encrypt(&cipher, "hunter2").unwrap();
        secret
            .reveal(&cipher, |s| assert_eq!(s, "hunter2"))
            .unwrap();
    }

    #[test]
    fn secret_string_debug_is_redacted() {
        let cipher = cipher();
        let secret = SecretString::encrypt(&cipher, "hunter2").unwrap();
        let debug = format!("{secret:?}");
        assert_eq!(debug, REDACTED);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn secret_bytes_roundtrips_through_reveal() {
        let cipher = cipher();
        let secret = SecretBytes::encrypt(&cipher, b"\x00\x01binary").unwrap();
        secret
            .reveal(&cipher, |b| assert_eq!(b, b"\x00\x01binary"))
            .unwrap();
    }

    #[test]
    fn equal_plaintexts_from_same_ciphertext_are_equal() {
        let cipher = cipher();
        let secret = SecretString::encrypt(&cipher, "same").unwrap();
        let reloaded = SecretString::from_ciphertext(secret.ciphertext().to_string());
        assert_eq!(secret, reloaded);
    }
}
