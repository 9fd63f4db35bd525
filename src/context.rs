/*!

Contexts (§4.6, §4.7): the hierarchy a lookup runs in, used to decide which
stores are in scope and to re-query as `SYSTEM` on `USE_ITEM`/`USE_OWN`.

The core doesn't know about any particular deployment's notion of
"project"/"folder"/"workspace" — it only needs a name, a parent link, and
whether a node is the root. Real hierarchies are registered through
[`ContextResolver`], matching §6's "resolver" half of a store token.
*/
use std::sync::Arc;

use crate::principal::Principal;

/// A node in the context hierarchy a lookup is performed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    name: String,
    kind: ContextKind,
    parent: Option<Arc<Context>>,
}

/// What a context node represents (§4.6's "Root"/"Folder"/"Leaf"/"User").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Root,
    Folder,
    Leaf,
    User,
}

impl Context {
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: ContextKind::Root,
            parent: None,
        })
    }

    pub fn child(
        parent: &Arc<Context>,
        name: impl Into<String>,
        kind: ContextKind,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind,
            parent: Some(parent.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ContextKind::Root)
    }

    /// Walk from this node up to (and including) the root, nearest first,
    /// stopping just past a `User` node that isn't `principal`'s own (§9
    /// Open Question 1): a user's personal context, and everything above
    /// it, is invisible to a different principal walking through. The node
    /// itself is still included — only its parent chain is cut off.
    ///
    /// [`crate::provider::ProviderRegistry::stores_of`] falls back to
    /// [`Context::full_ancestry`] when `principal` holds `UseItem` at the
    /// root, per the same Open Question's exception.
    pub fn ancestry(self: &Arc<Self>, principal: &Principal) -> Vec<Arc<Context>> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        loop {
            if let Some(owner) = current.user_principal() {
                if owner != *principal {
                    break;
                }
            }
            let Some(parent) = current.parent.clone() else {
                break;
            };
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// The unconditional walk to root, ignoring any `User` boundary. Used
    /// internally by [`crate::provider::ProviderRegistry::stores_of`] to
    /// evaluate the root-`UseItem` exception to [`Context::ancestry`]'s
    /// truncation.
    pub(crate) fn full_ancestry(self: &Arc<Self>) -> Vec<Arc<Context>> {
        let mut chain = vec![self.clone()];
        let mut current = self.clone();
        while let Some(parent) = current.parent.clone() {
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// The `Principal` this context runs as, for `User` nodes; `None`
    /// otherwise (the triggering principal comes from elsewhere).
    pub fn user_principal(&self) -> Option<Principal> {
        match self.kind {
            ContextKind::User => Some(Principal::User(self.name.clone())),
            _ => None,
        }
    }
}

/// Translates between a live [`Context`] and the opaque token embedded in a
/// store token (§6: `<providerName>::<resolverName>::<token>`).
pub trait ContextResolver: Send + Sync {
    /// The name this resolver is registered under, the `<resolverName>`
    /// segment of a store token.
    fn name(&self) -> &str;

    fn context_to_token(&self, context: &Arc<Context>) -> String;

    fn token_to_context(&self, token: &str) -> Option<Arc<Context>>;
}

/// A registry of named [`ContextResolver`]s, looked up by the
/// `<resolverName>` segment of a store token.
#[derive(Default)]
pub struct ContextResolverRegistry {
    resolvers: Vec<Arc<dyn ContextResolver>>,
}

impl ContextResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Arc<dyn ContextResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolver(&self, name: &str) -> Option<Arc<dyn ContextResolver>> {
        self.resolvers.iter().find(|r| r.name() == name).cloned()
    }
}
