/*!

Parameter binding (§4.8): resolving a named parameter on a run to a
concrete credential, honouring explicit user overrides and `USE_OWN`/
`USE_ITEM` delegation.
*/
use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::credential::{Credential, CredentialType};
use crate::error::Result;
use crate::fingerprint::UseTracker;
use crate::matcher::Matcher;
use crate::permission::Permission;
use crate::principal::Principal;
use crate::requirement::Requirement;
use crate::resolution::{CancellationToken, ResolutionEngine};

/// A single parameter-to-credential binding (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    pub name: String,
    pub credential_id: String,
    pub is_default: bool,
}

/// The run a parameter binding is resolved against. Implemented by whatever
/// job/task abstraction a deployment has; the core only needs the four
/// facts below.
pub trait Run: Send + Sync {
    fn id(&self) -> &str;

    fn context(&self) -> &Arc<Context>;

    /// The run's declared authentication principal — `SYSTEM` unless the
    /// task was scheduled to run as someone else.
    fn run_auth(&self) -> Principal;

    /// The principal that triggered this run (walking upstream causes, if
    /// any — e.g. a webhook trigger attributes to the user who registered
    /// it).
    fn triggering_principal(&self) -> Principal;

    /// An explicitly recorded input user, if the trigger carried one.
    fn explicit_input_user(&self) -> Option<Principal>;

    /// Whether `principal` has been granted `perm` on this run.
    fn grants(&self, principal: &Principal, perm: Permission) -> bool;

    /// The recorded binding for `name`, if any.
    fn binding_for(&self, name: &str) -> Option<ParameterBinding>;

    /// Whether the run is still executing — gates fingerprint tracking
    /// (§4.9: only in-progress runs get their usage recorded).
    fn is_in_progress(&self) -> bool;
}

/// Strip a `${name}` wrapper, returning the inner name; otherwise the whole
/// id is used as a fallback parameter name (§4.8 step 1).
fn normalize(id: &str) -> &str {
    id.strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(id)
}

/// Resolve `id` against `run`'s parameter bindings, returning the first
/// matching credential of `credential_type` (§4.8).
pub fn resolve_by_id(
    engine: &ResolutionEngine,
    run: &dyn Run,
    tracker: Option<&UseTracker>,
    config: &Config,
    id: &str,
    credential_type: CredentialType,
    requirements: &[Requirement],
) -> Result<Option<Credential>> {
    let name = normalize(id);
    let binding = run.binding_for(name);
    let token = CancellationToken::new();

    let (bound_id, found) = match &binding {
        None => {
            let bound_id = id.to_string();
            let found = lookup_as_run_auth(engine, run, requirements, credential_type, &token)?;
            (bound_id, found)
        }
        Some(b) if b.is_default => {
            let bound_id = b.credential_id.clone();
            let found = lookup_as_run_auth(engine, run, requirements, credential_type, &token)?;
            (bound_id, found)
        }
        Some(b) => {
            let bound_id = b.credential_id.clone();
            let found =
                lookup_as_triggering_principal(engine, run, config, requirements, credential_type, &token)?;
            (bound_id, found)
        }
    };

    let resolved = found.into_iter().find(|c| c.id() == bound_id);

    if let Some(credential) = &resolved {
        if matches!(binding, Some(ref b) if !b.is_default) && run.is_in_progress() {
            if let Some(tracker) = tracker {
                tracker.track_run(credential, run.id());
            }
        }
    }

    Ok(resolved.and_then(|c| for_run(c, credential_type)))
}

fn lookup_as_run_auth(
    engine: &ResolutionEngine,
    run: &dyn Run,
    requirements: &[Requirement],
    credential_type: CredentialType,
    token: &CancellationToken,
) -> Result<Vec<Credential>> {
    let run_auth = run.run_auth();
    let mut found = engine.lookup(
        credential_type,
        run.context(),
        &run_auth,
        requirements,
        &Matcher::AlwaysMatch,
        token,
    )?;
    if !run_auth.is_system() && run.grants(&run_auth, Permission::UseItem) {
        found.extend(engine.lookup(
            credential_type,
            run.context(),
            &Principal::System,
            requirements,
            &Matcher::AlwaysMatch,
            token,
        )?);
    }
    Ok(found)
}

fn lookup_as_triggering_principal(
    engine: &ResolutionEngine,
    run: &dyn Run,
    config: &Config,
    requirements: &[Requirement],
    credential_type: CredentialType,
    token: &CancellationToken,
) -> Result<Vec<Credential>> {
    let triggering = run.triggering_principal();
    let mut found = Vec::new();

    if grants_use_own(run, &triggering, config) {
        found.extend(engine.lookup(
            credential_type,
            run.context(),
            &triggering,
            requirements,
            &Matcher::AlwaysMatch,
            token,
        )?);
    }
    if let Some(explicit_user) = run.explicit_input_user() {
        if grants_use_own(run, &explicit_user, config) {
            found.extend(engine.lookup(
                credential_type,
                run.context(),
                &explicit_user,
                requirements,
                &Matcher::AlwaysMatch,
                token,
            )?);
        }
    }
    if run.grants(&triggering, Permission::UseItem) {
        let run_auth = run.run_auth();
        found.extend(engine.lookup(
            credential_type,
            run.context(),
            &run_auth,
            requirements,
            &Matcher::AlwaysMatch,
            token,
        )?);
        found.extend(engine.lookup(
            credential_type,
            run.context(),
            &Principal::System,
            requirements,
            &Matcher::AlwaysMatch,
            token,
        )?);
    }
    Ok(found)
}

/// `UseOwn` on its own, unless `config.use_own_implies_administer` is set,
/// in which case `principal` must also hold `Administer` on this run.
fn grants_use_own(run: &dyn Run, principal: &Principal, config: &Config) -> bool {
    run.grants(principal, Permission::UseOwn)
        && (!config.use_own_implies_administer || run.grants(principal, Permission::Administer))
}

/// Step 5: contextualise the resolved credential for this run. The core has
/// no type-specific materialisation to perform, so this is the identity
/// transform with the type-mismatch guard the algorithm requires; a
/// deployment wanting to materialise e.g. a key file to disk does so here.
fn for_run(credential: Credential, expected: CredentialType) -> Option<Credential> {
    if credential.credential_type() != expected {
        log::warn!(
            "discarding credential {} after for_run: type mismatch",
            credential.id()
        );
        return None;
    }
    Some(credential)
}
