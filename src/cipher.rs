/*!

The cipher service (§4.1, component A).

Grounded in `helix-security::encryption::AesGcmCredentialEncrypterDecrypter`:
AES-256-GCM, random 96-bit nonce prepended to the ciphertext, base64-encoded
for storage. This module makes two changes to that shape to satisfy the
spec: the trait is synchronous (stores are synchronous, §4.5), and the
token carries an explicit leading version byte so multiple keys can be held
at once for rotation — `encrypt` always uses the newest key, `decrypt`
dispatches on the version byte.
 */
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{Error, Result};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// `encrypt`/`decrypt`/`is_encrypted` over opaque byte payloads (§4.1).
///
/// Implementations must be deterministic-for-equality: two encryptions of
/// equal plaintexts must compare equal once normalised (here, simply:
/// decrypting either side and comparing plaintext), even though the
/// encodings themselves need not be bitwise identical (a fresh nonce is
/// drawn on every `encrypt` call).
pub trait CipherService: Send + Sync {
    /// Encrypt plaintext into a self-describing, version-prefixed token.
    fn encrypt(&self, plaintext: &[u8]) -> Result<String>;
    /// Decrypt a token produced by `encrypt`.
    fn decrypt(&self, token: &str) -> Result<Vec<u8>>;
    /// Cheaply recognize the token shape without decrypting it. Used by the
    /// redactor (§4.10) to find ciphertext-shaped substrings.
    fn is_encrypted(&self, token: &str) -> bool;
}

/// AES-256-GCM implementation with key-rotation support.
///
/// Token format: `base64(version_byte || nonce[12] || ciphertext || tag)`.
/// `version_byte` indexes into `keys`; index 0 is never reused once a key
/// has been appended, so old ciphertexts keep decrypting after rotation.
pub struct AesGcmCipherService {
    keys: Vec<[u8; KEY_LEN]>,
}

impl AesGcmCipherService {
    /// Construct a service with a single 32-byte key (version 0).
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { keys: vec![key] }
    }

    /// Construct a service from a hex-encoded 32-byte key, matching the
    /// teacher's `HELIX_ENCRYPTION_KEY` convention.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| Error::InvalidArgument("key".into(), format!("not valid hex: {e}")))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("key".into(), "must be 32 bytes".into()))?;
        Ok(Self::new(key))
    }

    /// Construct a service from the named environment variable, holding a
    /// hex-encoded 32-byte key.
    pub fn from_env(var: &str) -> Result<Self> {
        let hex_key = std::env::var(var).map_err(|e| {
            Error::InvalidArgument("key".into(), format!("env var {var} not set: {e}"))
        })?;
        Self::from_hex(&hex_key)
    }

    /// Append a new key; it becomes the key used for subsequent `encrypt`
    /// calls, while the old key(s) remain usable for `decrypt`.
    pub fn rotate_in(&mut self, key: [u8; KEY_LEN]) {
        self.keys.push(key);
    }

    fn cipher_for(&self, version: u8) -> Result<Aes256Gcm> {
        let key_bytes = self
            .keys
            .get(version as usize)
            .ok_or_else(|| Error::PlatformFailure(format!("unknown key version {version}").into()))?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes)))
    }
}

impl CipherService for AesGcmCipherService {
    fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let version = (self.keys.len() - 1) as u8;
        let cipher = self.cipher_for(version)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::PlatformFailure(format!("encryption failed: {e}").into()))?;
        let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        out.push(version);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    fn decrypt(&self, token: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(token)
            .map_err(|e| Error::InvalidArgument("token".into(), format!("not valid base64: {e}")))?;
        if raw.len() < 1 + NONCE_LEN {
            return Err(Error::InvalidArgument(
                "token".into(),
                "too short to contain a version byte and nonce".into(),
            ));
        }
        let version = raw[0];
        let (nonce_bytes, ciphertext) = raw[1..].split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = self.cipher_for(version)?;
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::PlatformFailure(format!("decryption failed: {e}").into()))
    }

    fn is_encrypted(&self, token: &str) -> bool {
        match BASE64.decode(token) {
            Ok(raw) => raw.len() >= 1 + NONCE_LEN && (raw[0] as usize) < self.keys.len(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AesGcmCipherService {
        AesGcmCipherService::new([7u8; KEY_LEN])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let svc = service();
        let token = svc.encrypt(b"hunter2").unwrap();
        assert_ne!(token.as_bytes(), b"hunter2");
        assert_eq!(svc.decrypt(&token).unwrap(), b"hunter2");
    }

    #[test]
    fn is_encrypted_recognizes_own_tokens() {
        let svc = service();
        let token = svc.encrypt(b"payload").unwrap();
        assert!(svc.is_encrypted(&token));
        assert!(!svc.is_encrypted("not-a-token"));
        assert!(!svc.is_encrypted("plain text password"));
    }

    #[test]
    fn rotation_keeps_old_ciphertext_decryptable() {
        let mut svc = service();
        let old_token = svc.encrypt(b"before rotation").unwrap();
        svc.rotate_in([9u8; KEY_LEN]);
        let new_token = svc.encrypt(b"after rotation").unwrap();

        assert_eq!(svc.decrypt(&old_token).unwrap(), b"before rotation");
        assert_eq!(svc.decrypt(&new_token).unwrap(), b"after rotation");
        // the new token used the rotated-in key, the version byte differs
        let old_raw = BASE64.decode(&old_token).unwrap();
        let new_raw = BASE64.decode(&new_token).unwrap();
        assert_eq!(old_raw[0], 0);
        assert_eq!(new_raw[0], 1);
    }

    #[test]
    fn tampered_token_fails_to_decrypt() {
        let svc = service();
        let mut token = svc.encrypt(b"secret").unwrap();
        token.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        assert!(svc.decrypt(&token).is_err());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(AesGcmCipherService::from_hex("00112233").is_err());
    }
}
