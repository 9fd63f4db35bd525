/*!

Redaction (§4.10): turning secret-bearing values into their `REDACTED` form
for logging, diagnostics, and UI display.

A document is run through a pluggable list of [`Redactor`]s, each matching a
different shape a secret might take in free text. The built-in pair covers
the two forms this crate ever hands a caller: the encrypted token shape from
[`crate::cipher`] (covers both [`crate::secret::SecretString`] and
[`crate::secret::SecretBytes`], which share the same token format), and a
handful of conventionally-named fields that might carry a secret in the
clear before it's ever wrapped in one of those types.
 */
use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::secret::REDACTED;

/// Something that scans a document for one shape of secret-bearing text and
/// replaces it with [`crate::secret::REDACTED`]. A deployment with its own
/// sensitive-field conventions can add one of its own to the list passed to
/// [`redact_with`].
pub trait Redactor: Send + Sync {
    fn redact<'a>(&self, document: &'a str) -> Cow<'a, str>;
}

/// A base64 run long enough to plausibly be a cipher token (version byte +
/// 12-byte nonce + at least one byte of ciphertext + 16-byte GCM tag,
/// base64-expanded): conservatively, 24+ base64 characters.
static CIPHERTEXT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]{24,}={0,2}").expect("static pattern is valid"));

/// Matches any base64 run shaped like an encrypted token, wherever it
/// appears. Covers both `SecretString` and `SecretBytes` output, since both
/// are produced by the same [`crate::cipher::CipherService::encrypt`].
pub struct CiphertextShapeRedactor;

impl Redactor for CiphertextShapeRedactor {
    fn redact<'a>(&self, document: &'a str) -> Cow<'a, str> {
        CIPHERTEXT_SHAPE.replace_all(document, REDACTED)
    }
}

/// Scalar secret fields (`password=`, `secret=`, `token=`, `passphrase=`)
/// and blob secret fields (`contents=`, `key_store=`, `private_key=`),
/// matched by name regardless of whether the value looks like ciphertext.
static NAMED_FIELD_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(password|secret|token|passphrase|contents|key_store|private_key)=\S+")
        .expect("static pattern is valid")
});

/// Matches a conventionally-named secret field and replaces only its value,
/// keeping the field name for context.
pub struct NamedFieldRedactor;

impl Redactor for NamedFieldRedactor {
    fn redact<'a>(&self, document: &'a str) -> Cow<'a, str> {
        NAMED_FIELD_SHAPE.replace_all(document, |caps: &Captures| format!("{}={}", &caps[1], REDACTED))
    }
}

/// The built-in redactor pair, in the order `redact_document` applies them.
pub fn default_redactors() -> Vec<Box<dyn Redactor>> {
    vec![Box::new(NamedFieldRedactor), Box::new(CiphertextShapeRedactor)]
}

/// Run `document` through `redactors` in order, each seeing the previous
/// one's output.
pub fn redact_with(document: &str, redactors: &[Box<dyn Redactor>]) -> String {
    let mut current = Cow::Borrowed(document);
    for redactor in redactors {
        let next = redactor.redact(&current).into_owned();
        current = Cow::Owned(next);
    }
    current.into_owned()
}

/// Replace every secret-shaped run of text in `document` with
/// [`crate::secret::REDACTED`], using the built-in redactor pair. Used for
/// redacting free-form log lines or error messages that might otherwise
/// echo a token verbatim.
pub fn redact_document(document: &str) -> String {
    redact_with(document, &default_redactors())
}

/// A named value a caller wants rendered for display: either the literal
/// value, or its redacted stand-in when the field is sensitive.
pub enum Rendered<'a> {
    Plain(&'a str),
    Secret,
}

impl std::fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rendered::Plain(s) => f.write_str(s),
            Rendered::Secret => f.write_str(REDACTED),
        }
    }
}
