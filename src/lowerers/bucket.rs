//! CR-017: Object-store node lowerer.

use super::{
    node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_OBJECT_STORE,
};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource, PropValue};
use indexmap::IndexMap;

pub struct BucketLowerer;

impl NodeLowerer for BucketLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_OBJECT_STORE
    }

    fn lower(
        &self,
        node: &GraphNode,
        _ctx: &LoweringContext,
        _deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let name = resource_name(node.short_name(), "bucket");
        let mut bucket = LoweredResource::new(name.clone(), types::BUCKET, &node.id);
        if let Some(force) = node.bool_prop("forceDestroy") {
            bucket = bucket.prop("forceDestroy", force);
        }
        let mut out = vec![bucket.prop("tags", node_tags(node, PLATFORM_OBJECT_STORE))];

        // Only an explicit `true` turns versioning on.
        if node.bool_prop("versioning") == Some(true) {
            let mut config = IndexMap::new();
            config.insert("status".to_string(), PropValue::str("Enabled"));
            out.push(
                LoweredResource::new(
                    resource_name(&name, "versioning"),
                    types::BUCKET_VERSIONING,
                    &node.id,
                )
                .prop("bucket", PropValue::reference(name.clone()))
                .prop("versioningConfiguration", PropValue::Map(config))
                .depends(&[name.as_str()]),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowerers::fixtures;

    fn lower_node(node: &GraphNode) -> Vec<LoweredResource> {
        let config = fixtures::config();
        let graph = fixtures::sample_graph();
        let ctx = LoweringContext::new(&config, &[], &graph);
        BucketLowerer.lower(node, &ctx, &ResolvedDeps::default()).unwrap()
    }

    #[test]
    fn test_cr017_bucket_without_versioning() {
        let out = lower_node(&fixtures::node("platform:uploads", PLATFORM_OBJECT_STORE));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "uploads-bucket");
        assert_eq!(out[0].resource_type, types::BUCKET);
    }

    #[test]
    fn test_cr017_versioning_true_adds_dependent_resource() {
        let node = fixtures::node_with(
            "platform:uploads",
            PLATFORM_OBJECT_STORE,
            serde_json::json!({"versioning": true}),
        );
        let out = lower_node(&node);
        assert_eq!(out.len(), 2);
        let v = &out[1];
        assert_eq!(v.name, "uploads-bucket-versioning");
        assert_eq!(v.resource_type, types::BUCKET_VERSIONING);
        assert_eq!(v.properties["bucket"], PropValue::reference("uploads-bucket"));
        assert_eq!(v.depends_on, vec!["uploads-bucket"]);
    }

    #[test]
    fn test_cr017_versioning_must_be_literal_true() {
        for value in [serde_json::json!(false), serde_json::json!("true"), serde_json::json!(1)] {
            let node = fixtures::node_with(
                "platform:uploads",
                PLATFORM_OBJECT_STORE,
                serde_json::json!({ "versioning": value }),
            );
            assert_eq!(lower_node(&node).len(), 1);
        }
    }
}
