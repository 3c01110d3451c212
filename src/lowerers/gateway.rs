//! CR-018: HTTP gateway node lowerer — an API plus its auto-deploying default stage.

use super::{node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_GATEWAY};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource, PropValue};

pub const DEFAULT_STAGE: &str = "$default";

pub struct GatewayLowerer;

impl NodeLowerer for GatewayLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_GATEWAY
    }

    fn lower(
        &self,
        node: &GraphNode,
        ctx: &LoweringContext,
        _deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let short = node.short_name();
        let api = resource_name(short, "api");
        let mut api_res = LoweredResource::new(api.clone(), types::API, &node.id)
            .prop("name", format!("{}-{}", ctx.config.service_name, short))
            .prop("protocolType", "HTTP");
        if let Some(cors) = node.properties.get("cors") {
            api_res = api_res.prop("corsConfiguration", PropValue::from_json(cors));
        }

        let stage = LoweredResource::new(resource_name(short, "stage"), types::STAGE, &node.id)
            .prop("apiId", PropValue::reference(api.clone()))
            .prop("name", DEFAULT_STAGE)
            .prop("autoDeploy", true)
            .prop("tags", node_tags(node, PLATFORM_GATEWAY))
            .depends(&[api.as_str()]);

        Ok(vec![
            api_res.prop("tags", node_tags(node, PLATFORM_GATEWAY)),
            stage,
        ])
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
        GatewayLowerer.lower(node, &ctx, &ResolvedDeps::default()).unwrap()
    }

    #[test]
    fn test_cr018_always_two_resources() {
        let out = lower_node(&fixtures::node("platform:api-gw", PLATFORM_GATEWAY));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "api-gw-api");
        assert_eq!(out[0].resource_type, types::API);
        assert_eq!(out[0].properties["protocolType"], PropValue::str("HTTP"));
        assert_eq!(out[0].properties["name"], PropValue::str("orders-api-gw"));
        assert_eq!(out[1].name, "api-gw-stage");
        assert_eq!(out[1].resource_type, types::STAGE);
    }

    #[test]
    fn test_cr018_stage_depends_on_api() {
        let out = lower_node(&fixtures::node("platform:api-gw", PLATFORM_GATEWAY));
        let stage = &out[1];
        assert_eq!(stage.depends_on, vec!["api-gw-api"]);
        assert_eq!(stage.properties["apiId"], PropValue::reference("api-gw-api"));
        assert_eq!(stage.properties["name"], PropValue::str("$default"));
        assert_eq!(stage.properties["autoDeploy"], PropValue::Bool(true));
    }

    #[test]
    fn test_cr018_cors_passthrough() {
        let node = fixtures::node_with(
            "platform:api-gw",
            PLATFORM_GATEWAY,
            serde_json::json!({"cors": {"allowOrigins": ["*"]}}),
        );
        let out = lower_node(&node);
        assert!(out[0].properties.contains_key("corsConfiguration"));
        assert_eq!(out.len(), 2);
    }
}
