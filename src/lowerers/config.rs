//! CR-013: Config intent lowerer — parameter-store entries.
//!
//! A config intent becomes one parameter named `/{service}/{target}/{key}`.
//! Its value source is resolved into:
//! - literal → plain string
//! - reference → `{ref}` to the referenced node's primary resource
//! - secret → a `{"secret": name}` indirection marker
//!
//! Keys that slug to the same parameter name (`QUEUE_URL`, `queue-url`) are
//! rejected by the orchestrator for every intent after the first.

use super::{
    platform_output, resource_name, types, IntentLowerer, LoweringContext, TAG_NODE,
};
use crate::core::types::{
    short_name, ConfigIntent, Intent, IntentKind, LoweredResource, PropValue, ValueSource,
};
use indexmap::IndexMap;

/// Field used when a reference names neither a field nor a known platform.
pub const FALLBACK_FIELD: &str = "id";

pub struct ConfigLowerer;

impl IntentLowerer for ConfigLowerer {
    fn kind(&self) -> IntentKind {
        IntentKind::Config
    }

    fn name(&self) -> &'static str {
        "config"
    }

    fn lower(&self, intent: &Intent, ctx: &LoweringContext) -> Result<Vec<LoweredResource>, String> {
        match intent {
            Intent::Config(ci) => Ok(vec![lower_config(ci, ctx)?]),
            other => Err(format!("config lowerer cannot lower {} intent", other.kind())),
        }
    }
}

fn lower_config(ci: &ConfigIntent, ctx: &LoweringContext) -> Result<LoweredResource, String> {
    if ci.key.trim().is_empty() {
        return Err(format!("config intent {} has an empty key", ci.source_edge_id));
    }
    let target_short = short_name(&ci.target);
    let name = resource_name(target_short, &format!("{}-param", key_slug(&ci.key)));
    let value = resolve_value_source(&ci.value_source, ctx);
    let param_type = match ci.value_source {
        ValueSource::Secret { .. } => "SecureString",
        _ => "String",
    };

    let mut tags = IndexMap::new();
    tags.insert(TAG_NODE.to_string(), PropValue::str(ci.target.clone()));

    let mut resource = LoweredResource::new(name, types::PARAMETER, &ci.source_edge_id)
        .prop(
            "name",
            format!("/{}/{}/{}", ctx.config.service_name, target_short, ci.key),
        )
        .prop("type", param_type)
        .prop("value", value)
        .prop("tags", PropValue::Map(tags));

    if let Some(r) = resource
        .properties
        .get("value")
        .and_then(PropValue::as_ref_target)
    {
        let dep = r.resource().to_string();
        resource.depends_on.push(dep);
    }
    Ok(resource)
}

/// Resolve a value source to a literal, a symbolic reference, or a secret marker.
///
/// Unknown nodes or platforms produce the raw `"{nodeRef}.{field}"` reference
/// so a broken reference surfaces at link time instead of being guessed.
pub fn resolve_value_source(source: &ValueSource, ctx: &LoweringContext) -> PropValue {
    match source {
        ValueSource::Literal { value } => PropValue::str(value.clone()),
        ValueSource::Secret { name } => {
            let mut marker = IndexMap::new();
            marker.insert("secret".to_string(), PropValue::str(name.clone()));
            PropValue::Map(marker)
        }
        ValueSource::Reference { node, field } => {
            match ctx.platform_of(node).and_then(platform_output) {
                Some(out) => {
                    let field = field.as_deref().unwrap_or(out.default_field);
                    PropValue::reference(format!(
                        "{}.{}",
                        resource_name(short_name(node), out.resource_suffix),
                        field
                    ))
                }
                None => {
                    let field = field.as_deref().unwrap_or(FALLBACK_FIELD);
                    // Raw node-id ref; fails at link time unless a resource carries that name.
                    tracing::warn!(node = %node, field, "config value references a node with no known output");
                    PropValue::reference(format!("{}.{}", node, field))
                }
            }
        }
    }
}

/// Lowercase, dash-separated form of a config key.
fn key_slug(key: &str) -> String {
    let mut slug = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
