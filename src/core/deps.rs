//! CR-002: Per-node dependency resolution.
//!
//! One pass over the intent list yields, for every graph node:
//! - the execution role name, if an identity-access intent names it as principal
//! - environment entries, one per config intent targeting it

use crate::core::types::{Intent, PropValue};
use crate::lowerers::config::resolve_value_source;
use crate::lowerers::identity::exec_role_name;
use crate::lowerers::LoweringContext;
use std::collections::BTreeMap;

/// What the intents say about one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDeps {
    pub role_name: Option<String>,
    pub env_vars: BTreeMap<String, PropValue>,
    pub security_groups: Vec<String>,
}

/// Resolve deps for every graph node, keyed by node id.
///
/// Nodes no intent mentions get an empty record. The first config intent for a
/// given key wins.
pub fn resolve_deps(ctx: &LoweringContext) -> BTreeMap<String, ResolvedDeps> {
    let mut deps: BTreeMap<String, ResolvedDeps> = ctx
        .graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), ResolvedDeps::default()))
        .collect();

    for intent in ctx.intents {
        match intent {
            Intent::IdentityAccess(ia) => {
                if let Some(d) = deps.get_mut(&ia.principal) {
                    d.role_name
                        .get_or_insert_with(|| exec_role_name(&ia.principal));
                }
            }
            Intent::Config(ci) => {
                if let Some(d) = deps.get_mut(&ci.target) {
                    d.env_vars
                        .entry(ci.key.clone())
                        .or_insert_with(|| resolve_value_source(&ci.value_source, ctx));
                }
            }
            Intent::Network(_) | Intent::Telemetry(_) | Intent::Unknown(_) => {}
        }
    }
    deps
}
