/*!

Domain specifications (§4.3): predicates over one `RequirementKind`.

Specifications are persisted as plain data (`SpecData`) and compiled into a
runtime `Specification` (holding any `regex::Regex` the variant needs) on
load — `Regex` itself isn't `Serialize`, so the persisted form and the
matching form are kept separate, the same split the teacher's sample store
draws between `CredValue` (persisted) and the live `Credential` wrapper.
 */
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::requirement::{Requirement, RequirementKind};

/// The plain-data form of a specification, suitable for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecData {
    /// One pattern per dot-separated hostname label, outermost first
    /// (`["*", "github", "com"]` matches any host ending in `.github.com`).
    /// `*` matches a whole label; anything else is a case-insensitive regex
    /// anchored to the whole label. `port`, if set, must match exactly.
    Hostname {
        labels: Vec<String>,
        port: Option<u16>,
    },
    /// Case-insensitive one-of list, e.g. `["https", "ssh"]`.
    Scheme { schemes: Vec<String> },
    /// Case-sensitive prefix list.
    Path { prefixes: Vec<String> },
    /// Case-insensitive glob list (`*` and `?` wildcards) matched against
    /// the whole URI.
    Uri { globs: Vec<String> },
}

/// A compiled, matchable specification.
#[derive(Debug)]
pub enum Specification {
    Hostname {
        labels: Vec<Option<Regex>>, // None means "*" (match anything)
        port: Option<u16>,
        data: SpecData,
    },
    Scheme {
        schemes: Vec<String>,
        data: SpecData,
    },
    Path {
        prefixes: Vec<String>,
        data: SpecData,
    },
    Uri {
        globs: Vec<Regex>,
        data: SpecData,
    },
}

impl Specification {
    /// Compile a persisted spec, validating its patterns.
    ///
    /// Returns `Error::InvalidArgument` ("specification", ...) for a
    /// malformed pattern — the spec's `InvalidSpecification` failure.
    pub fn compile(data: SpecData) -> Result<Self> {
        match &data {
            SpecData::Hostname { labels, port } => {
                let compiled = labels
                    .iter()
                    .map(|label| {
                        if label == "*" {
                            Ok(None)
                        } else {
                            anchored_regex(label).map(Some)
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Specification::Hostname {
                    labels: compiled,
                    port: *port,
                    data,
                })
            }
            SpecData::Scheme { schemes } => Ok(Specification::Scheme {
                schemes: schemes.iter().map(|s| s.to_ascii_lowercase()).collect(),
                data,
            }),
            SpecData::Path { prefixes } => Ok(Specification::Path {
                prefixes: prefixes.clone(),
                data,
            }),
            SpecData::Uri { globs } => {
                let compiled = globs
                    .iter()
                    .map(|g| glob_to_regex(g))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Specification::Uri {
                    globs: compiled,
                    data,
                })
            }
        }
    }

    pub fn kind(&self) -> RequirementKind {
        match self {
            Specification::Hostname { .. } => RequirementKind::Hostname,
            Specification::Scheme { .. } => RequirementKind::Scheme,
            Specification::Path { .. } => RequirementKind::Path,
            Specification::Uri { .. } => RequirementKind::Uri,
        }
    }

    /// The persisted form, for round-tripping through a store.
    pub fn data(&self) -> &SpecData {
        match self {
            Specification::Hostname { data, .. }
            | Specification::Scheme { data, .. }
            | Specification::Path { data, .. }
            | Specification::Uri { data, .. } => data,
        }
    }

    /// Whether `requirement` satisfies this specification. The caller
    /// (`Domain::matches`) is responsible for only calling this with a
    /// requirement whose kind matches `self.kind()`.
    pub fn matches(&self, requirement: &Requirement) -> bool {
        match self {
            Specification::Hostname { labels, port, .. } => {
                match_hostname(labels, *port, &requirement.value)
            }
            Specification::Scheme { schemes, .. } => {
                let value = requirement.value.to_ascii_lowercase();
                schemes.iter().any(|s| s == &value)
            }
            Specification::Path { prefixes, .. } => {
                prefixes.iter().any(|p| requirement.value.starts_with(p))
            }
            Specification::Uri { globs, .. } => {
                let value = requirement.value.to_ascii_lowercase();
                globs.iter().any(|g| g.is_match(&value))
            }
        }
    }
}

fn match_hostname(labels: &[Option<Regex>], port: Option<u16>, value: &str) -> bool {
    let (host_part, port_part) = match value.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => {
            (h, p.parse::<u16>().ok())
        }
        _ => (value, None),
    };
    if let Some(expected) = port {
        if port_part != Some(expected) {
            return false;
        }
    }
    let host_labels: Vec<&str> = host_part.split('.').collect();
    if host_labels.len() != labels.len() {
        return false;
    }
    host_labels
        .iter()
        .zip(labels)
        .all(|(actual, pattern)| match pattern {
            None => true,
            Some(re) => re.is_match(actual),
        })
}

fn anchored_regex(pattern: &str) -> Result<Regex> {
    let anchored = format!("(?i)^{pattern}$");
    Regex::new(&anchored)
        .map_err(|e| Error::InvalidArgument("specification".into(), format!("bad pattern: {e}")))
}

const REGEX_META: &[char] = &[
    '.', '+', '(', ')', '|', '[', ']', '{', '}', '^', '$', '\\',
];

fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("(?i)^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c if REGEX_META.contains(&c) => {
                pattern.push('\\');
                pattern.push(c);
            }
            c => pattern.push(c),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|e| Error::InvalidArgument("specification".into(), format!("bad glob: {e}")))
}
