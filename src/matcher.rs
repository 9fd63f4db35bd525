/*!

The matcher algebra (§4.4): composable predicates over credentials.

`describe()` produces the short predicate-language string used for remote
store offloading; it returns `None` the moment any sub-matcher is
non-describable (a `Custom` matcher with no description), since the whole
expression can then no longer be pushed down — the caller falls back to
loading full candidate lists and filtering locally.
 */
use std::fmt;
use std::sync::Arc;

use crate::credential::{Credential, CredentialType};
use crate::scope::Scope;

/// A composable predicate over credentials.
#[derive(Clone)]
pub enum Matcher {
    AlwaysMatch,
    NeverMatch,
    ById(String),
    ByScope(Scope),
    ByType(CredentialType),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
    Custom {
        predicate: Arc<dyn Fn(&Credential) -> bool + Send + Sync>,
        description: Option<String>,
    },
}

impl Matcher {
    /// `and([])` is `alwaysMatch`.
    pub fn and(matchers: Vec<Matcher>) -> Matcher {
        if matchers.is_empty() {
            Matcher::AlwaysMatch
        } else {
            Matcher::And(matchers)
        }
    }

    /// `or([])` is `neverMatch`.
    pub fn or(matchers: Vec<Matcher>) -> Matcher {
        if matchers.is_empty() {
            Matcher::NeverMatch
        } else {
            Matcher::Or(matchers)
        }
    }

    pub fn not(matcher: Matcher) -> Matcher {
        Matcher::Not(Box::new(matcher))
    }

    pub fn custom(
        predicate: impl Fn(&Credential) -> bool + Send + Sync + 'static,
        description: Option<String>,
    ) -> Matcher {
        Matcher::Custom {
            predicate: Arc::new(predicate),
            description,
        }
    }

    pub fn matches(&self, credential: &Credential) -> bool {
        match self {
            Matcher::AlwaysMatch => true,
            Matcher::NeverMatch => false,
            Matcher::ById(id) => credential.id() == id,
            Matcher::ByScope(scope) => credential.scope == *scope,
            Matcher::ByType(ty) => credential.credential_type() == *ty,
            Matcher::And(ms) => ms.iter().all(|m| m.matches(credential)),
            Matcher::Or(ms) => ms.iter().any(|m| m.matches(credential)),
            Matcher::Not(m) => !m.matches(credential),
            Matcher::Custom { predicate, .. } => predicate(credential),
        }
    }

    /// The short predicate-language form, or `None` if any part of the
    /// expression is not describable.
    pub fn describe(&self) -> Option<String> {
        match self {
            Matcher::AlwaysMatch => Some("true".to_string()),
            Matcher::NeverMatch => Some("false".to_string()),
            Matcher::ById(id) => Some(format!("id == \"{id}\"")),
            Matcher::ByScope(scope) => Some(format!("scope == {scope}")),
            Matcher::ByType(ty) => Some(format!("type == \"{}\"", ty.tag())),
            Matcher::And(ms) => {
                let parts: Option<Vec<String>> = ms.iter().map(Matcher::describe).collect();
                parts.map(|p| p.join(" && "))
            }
            Matcher::Or(ms) => {
                let parts: Option<Vec<String>> = ms.iter().map(Matcher::describe).collect();
                parts.map(|p| format!("({})", p.join(" || ")))
            }
            Matcher::Not(m) => m.describe().map(|d| format!("!({d})")),
            Matcher::Custom { description, .. } => description.clone(),
        }
    }

    pub fn is_describable(&self) -> bool {
        self.describe().is_some()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(d) => write!(f, "Matcher({d})"),
            None => write!(f, "Matcher(<not describable>)"),
        }
    }
}
