/*!

Environment / policy flags (§6 "Environment / policy").

Grounded in the `helix-security::encryption` pattern of reading tunables
from the process environment (`env::var`), generalized to a small `Config`
struct so callers aren't forced through env vars in tests.
 */
use std::env;

/// Process-wide policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Toggles the use-tracker (§4.9). Default `true`.
    pub fingerprint_enabled: bool,
    /// When set, `UseOwn` requires administrator rights. Default `false`.
    pub use_own_implies_administer: bool,
    /// Enforces the minimum 14-character password length for FIPS-constrained
    /// deployments (§3). Default `false`.
    pub fips_algorithms: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fingerprint_enabled: true,
            use_own_implies_administer: false,
            fips_algorithms: false,
        }
    }
}

impl Config {
    /// Reads the three flags from the environment, falling back to the
    /// documented defaults when a variable is absent or unparsable.
    pub fn from_env() -> Self {
        Self {
            fingerprint_enabled: read_bool("CREDENTIALS_FINGERPRINT_ENABLED", true),
            use_own_implies_administer: read_bool("CREDENTIALS_USE_OWN_IMPLIES_ADMINISTER", false),
            fips_algorithms: read_bool("CREDENTIALS_FIPS_ALGORITHMS", false),
        }
    }
}

fn read_bool(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!(cfg.fingerprint_enabled);
        assert!(!cfg.use_own_implies_administer);
        assert!(!cfg.fips_algorithms);
    }

    #[test]
    fn from_env_falls_back_when_unset() {
        // SAFETY: test-only mutation of a process-global var no other test reads.
        unsafe {
            env::remove_var("CREDENTIALS_FIPS_ALGORITHMS");
        }
        let cfg = Config::from_env();
        assert!(!cfg.fips_algorithms);
    }

    #[test]
    fn from_env_parses_truthy_values() {
        unsafe {
            env::set_var("CREDENTIALS_FIPS_ALGORITHMS", "true");
        }
        assert!(Config::from_env().fips_algorithms);
        unsafe {
            env::set_var("CREDENTIALS_FIPS_ALGORITHMS", "0");
        }
        assert!(!Config::from_env().fips_algorithms);
        unsafe {
            env::remove_var("CREDENTIALS_FIPS_ALGORITHMS");
        }
    }
}
