/*!

Platform-independent error model.

The taxonomy mirrors the one a store or resolution-engine caller needs to
branch on: authorisation failures, unsupported operations, id/name
collisions, missing targets, malformed input, cancellation, persistence
failure, and the "a provider could not be loaded" case that the resolution
engine logs and skips rather than propagating.
 */

use crate::permission::Permission;

pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
/// Each variant of the `Error` enum summarizes the error. More details, if
/// relevant, are contained in the associated value.
///
/// This enum is non-exhaustive so that more values can be added to it
/// without a SemVer break. Clients should always have default handling
/// for variants they don't understand.
#[non_exhaustive]
pub enum Error {
    /// The principal lacks the named permission on the store operation it
    /// attempted.
    Unauthorised(Permission),
    /// The store implementation does not support this operation at all
    /// (e.g. a domains-immutable store asked to add a domain).
    UnsupportedOp(String),
    /// A name or id collision on insert.
    Conflict(String),
    /// The target domain or credential does not exist.
    NotFound(String),
    /// A compare-and-swap update's `cur` argument no longer matches what's
    /// stored: a lost update under concurrent modification. Distinct from
    /// [`Error::Conflict`], which is only for id collisions at creation time.
    Concurrent(String),
    /// A malformed id, domain name, or specification parameter. The first
    /// value names the argument, the second describes the problem.
    InvalidArgument(String, String),
    /// The caller's cancellation token fired before the operation finished.
    Cancelled,
    /// Persistence failed; the attached platform error has the details.
    Io(PlatformError),
    /// A provider could not be loaded. Logged and skipped while multiple
    /// providers are enumerated during resolution; never returned to a
    /// caller of a single store directly.
    OptionalDependencyMissing(String),
    /// The cipher service, or another platform-specific primitive, failed.
    PlatformFailure(PlatformError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Unauthorised(perm) => write!(f, "missing permission: {perm}"),
            Error::UnsupportedOp(op) => write!(f, "operation not supported: {op}"),
            Error::Conflict(what) => write!(f, "conflict: {what}"),
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::Concurrent(what) => write!(f, "concurrent modification: {what}"),
            Error::InvalidArgument(arg, reason) => write!(f, "invalid {arg}: {reason}"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::Io(err) => write!(f, "persistence failure: {err}"),
            Error::OptionalDependencyMissing(what) => {
                write!(f, "provider could not be loaded: {what}")
            }
            Error::PlatformFailure(err) => write!(f, "platform failure: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err.as_ref()),
            Error::PlatformFailure(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
