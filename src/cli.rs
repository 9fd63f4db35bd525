/*!

Store token parsing (§6): `<providerName>::<resolverName>::<token>`,
resolving to a concrete store by way of a [`ContextResolver`] and a
[`Provider`].
*/
use std::sync::Arc;

use crate::context::ContextResolverRegistry;
use crate::error::{Error, Result};
use crate::provider::{Provider, ProviderRegistry};
use crate::store::ReadOnlyStore;

/// Parse and resolve a store token against the given registries.
///
/// Errors name exactly which segment failed: malformed shape, no such
/// provider, no such resolver, no such context (the resolver rejected its
/// token), or no store for that context (the provider had none to offer).
pub fn resolve_store_token(
    token: &str,
    providers: &ProviderRegistry,
    resolvers: &ContextResolverRegistry,
) -> Result<Arc<dyn ReadOnlyStore>> {
    let mut parts = token.splitn(3, "::");
    let (provider_name, resolver_name, context_token) =
        match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(r), Some(c)) if !p.is_empty() && !r.is_empty() => (p, r, c),
            _ => {
                return Err(Error::InvalidArgument(
                    "store token".into(),
                    format!("expected <provider>::<resolver>::<token>, got {token:?}"),
                ))
            }
        };

    let provider = providers
        .provider_named(provider_name)
        .ok_or_else(|| Error::NotFound(format!("provider {provider_name}")))?;

    let resolver = resolvers
        .resolver(resolver_name)
        .ok_or_else(|| Error::NotFound(format!("context resolver {resolver_name}")))?;

    let context = resolver
        .token_to_context(context_token)
        .ok_or_else(|| Error::InvalidArgument("store token".into(), format!("no such context: {context_token:?}")))?;

    provider
        .store_for(&context)?
        .ok_or_else(|| Error::NotFound(format!("store for context {}", context.name())))
}
