//! CR-016: Key-value table node lowerer.
//!
//! Key schema comes from the `keySchema` node property:
//! `{hashKey: {name, type}, rangeKey?: {name, type}}`. Without one the table
//! is keyed by a single string attribute `id`.

use super::{node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_TABLE};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource, PropValue};
use indexmap::IndexMap;

pub const DEFAULT_HASH_KEY: &str = "id";
pub const DEFAULT_KEY_TYPE: &str = "S";
pub const DEFAULT_BILLING_MODE: &str = "PAY_PER_REQUEST";

pub struct TableLowerer;

#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyAttr {
    name: String,
    attr_type: String,
}

impl NodeLowerer for TableLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_TABLE
    }

    fn lower(
        &self,
        node: &GraphNode,
        _ctx: &LoweringContext,
        _deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let schema = node.properties.get("keySchema");
        let hash = match schema.and_then(|s| s.get("hashKey")) {
            Some(v) => key_attr(v).ok_or_else(|| {
                format!("node '{}' has a malformed keySchema.hashKey", node.id)
            })?,
            None => KeyAttr {
                name: DEFAULT_HASH_KEY.to_string(),
                attr_type: DEFAULT_KEY_TYPE.to_string(),
            },
        };
        let range = match schema.and_then(|s| s.get("rangeKey")) {
            Some(v) => Some(key_attr(v).ok_or_else(|| {
                format!("node '{}' has a malformed keySchema.rangeKey", node.id)
            })?),
            None => None,
        };

        let mut attributes = vec![attribute(&hash)];
        if let Some(r) = &range {
            attributes.push(attribute(r));
        }

        let mut table = LoweredResource::new(
            resource_name(node.short_name(), "table"),
            types::TABLE,
            &node.id,
        )
        .prop(
            "billingMode",
            node.str_prop("billingMode").unwrap_or(DEFAULT_BILLING_MODE),
        )
        .prop("hashKey", hash.name.clone());
        if let Some(r) = &range {
            table = table.prop("rangeKey", r.name.clone());
        }
        table = table.prop("attributes", PropValue::List(attributes));
        if node.bool_prop("stream") == Some(true) {
            table = table
                .prop("streamEnabled", true)
                .prop("streamViewType", "NEW_AND_OLD_IMAGES");
        }
        Ok(vec![table.prop("tags", node_tags(node, PLATFORM_TABLE))])
    }
}

fn key_attr(value: &serde_json::Value) -> Option<KeyAttr> {
    let name = value.get("name")?.as_str()?;
    let attr_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or(DEFAULT_KEY_TYPE);
    Some(KeyAttr {
        name: name.to_string(),
        attr_type: attr_type.to_string(),
    })
}

fn attribute(key: &KeyAttr) -> PropValue {
    let mut attr = IndexMap::new();
    attr.insert("name".to_string(), PropValue::str(key.name.clone()));
    attr.insert("type".to_string(), PropValue::str(key.attr_type.clone()));
    PropValue::Map(attr)
}
