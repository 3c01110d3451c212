//! CR-020: Relationship synthesis — resources that exist between two nodes.
//!
//! - `bindsTo` compute → queue: an event-source mapping
//! - `triggers` gateway → compute: integration, route, invoke permission
//!
//! Edges whose endpoints are missing or carry other platforms are skipped.

use super::{
    resource_name, types, LoweringContext, PLATFORM_COMPUTE, PLATFORM_GATEWAY, PLATFORM_QUEUE,
    TAG_EDGE,
};
use crate::core::types::{short_name, EdgeType, GraphEdge, LoweredResource, PropValue};
use indexmap::IndexMap;

pub const EVENT_BATCH_SIZE: u64 = 10;
pub const DEFAULT_ROUTE_KEY: &str = "$default";
pub const GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Edges of one type whose endpoints carry the given platforms, in graph order.
fn matching_edges<'a>(
    ctx: &LoweringContext<'a>,
    edge_type: EdgeType,
    source_platform: &str,
    target_platform: &str,
) -> Vec<&'a GraphEdge> {
    ctx.graph
        .edges
        .iter()
        .filter(|e| {
            e.edge_type == edge_type
                && ctx.platform_of(&e.source) == Some(source_platform)
                && ctx.platform_of(&e.target) == Some(target_platform)
        })
        .collect()
}

/// One event-source mapping per compute `bindsTo` queue edge.
pub fn event_mappings(ctx: &LoweringContext) -> Vec<LoweredResource> {
    matching_edges(ctx, EdgeType::BindsTo, PLATFORM_COMPUTE, PLATFORM_QUEUE)
        .into_iter()
        .map(|edge| {
            let source = short_name(&edge.source);
            let target = short_name(&edge.target);
            let function = resource_name(source, "function");
            let queue = resource_name(target, "queue");
            LoweredResource::new(
                format!("{}-{}-event-mapping", source, target),
                types::EVENT_SOURCE_MAPPING,
                &edge.id,
            )
            .prop("eventSourceArn", PropValue::reference(queue.clone()))
            .prop("functionName", PropValue::reference(function.clone()))
            .prop("batchSize", PropValue::int(EVENT_BATCH_SIZE))
            .prop("enabled", true)
            .depends(&[function.as_str(), queue.as_str()])
        })
        .collect()
}

/// Integration, route and invoke permission per gateway `triggers` compute edge.
pub fn gateway_integrations(ctx: &LoweringContext) -> Vec<LoweredResource> {
    let mut out = Vec::new();
    for edge in matching_edges(ctx, EdgeType::Triggers, PLATFORM_GATEWAY, PLATFORM_COMPUTE) {
        let gw = short_name(&edge.source);
        let func = short_name(&edge.target);
        let api = resource_name(gw, "api");
        let function = resource_name(func, "function");
        let prefix = format!("{}-{}", gw, func);
        let integration = format!("{}-integration", prefix);

        out.push(
            LoweredResource::new(integration.clone(), types::INTEGRATION, &edge.id)
                .prop("apiId", PropValue::reference(api.clone()))
                .prop("integrationType", "AWS_PROXY")
                .prop("integrationUri", PropValue::reference(function.clone()))
                .prop("integrationMethod", "POST")
                .prop("payloadFormatVersion", "2.0")
                .prop("tags", edge_tags(edge))
                .depends(&[api.as_str(), function.as_str()]),
        );
        out.push(
            LoweredResource::new(format!("{}-route", prefix), types::ROUTE, &edge.id)
                .prop("apiId", PropValue::reference(api.clone()))
                .prop("routeKey", route_key(edge))
                .prop("target", PropValue::reference(integration.clone()))
                .prop("tags", edge_tags(edge))
                .depends(&[api.as_str(), integration.as_str()]),
        );
        out.push(
            LoweredResource::new(
                format!("{}-invoke-permission", prefix),
                types::PERMISSION,
                &edge.id,
            )
            .prop("action", "lambda:InvokeFunction")
            .prop("function", PropValue::reference(function.clone()))
            .prop("principal", GATEWAY_PRINCIPAL)
            .prop("sourceArn", PropValue::reference(api.clone()))
            .prop("tags", edge_tags(edge))
            .depends(&[function.as_str(), api.as_str()]),
        );
    }
    out
}

/// `"{METHOD} {path}"` when the binding names both, else `$default`.
pub fn route_key(edge: &GraphEdge) -> String {
    let binding = |key: &str| {
        edge.binding_config
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    match (binding("method"), binding("route")) {
        (Some(method), Some(path)) => format!("{} {}", method.to_uppercase(), path),
        _ => DEFAULT_ROUTE_KEY.to_string(),
    }
}

fn edge_tags(edge: &GraphEdge) -> PropValue {
    let mut tags = IndexMap::new();
    tags.insert(TAG_EDGE.to_string(), PropValue::str(edge.id.clone()));
    PropValue::Map(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Graph;
    use crate::lowerers::fixtures;

    fn graph_with(edges: Vec<GraphEdge>) -> Graph {
        let mut graph = fixtures::sample_graph();
        graph.edges = edges;
        graph
    }

    #[test]
    fn test_cr020_event_mapping_scenario() {
        let graph = graph_with(vec![fixtures::edge(
            "e1",
            EdgeType::BindsTo,
            "component:api-handler",
            "platform:work-queue",
        )]);
        let config = fixtures::config();
        let ctx = LoweringContext::new(&config, &[], &graph);
        let out = event_mappings(&ctx);
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.name, "api-handler-work-queue-event-mapping");
        assert_eq!(m.resource_type, types::EVENT_SOURCE_MAPPING);
        assert!(m.depends_on.contains(&"api-handler-function".to_string()));
        assert!(m.depends_on.contains(&"work-queue-queue".to_string()));
        assert_eq!(m.properties["batchSize"], PropValue::int(10));
        assert_eq!(m.properties["enabled"], PropValue::Bool(true));
        assert_eq!(m.source_id, "e1");
    }

    #[test]
    fn test_cr020_binds_to_other_platforms_ignored() {
        let graph = graph_with(vec![
            fixtures::edge("e1", EdgeType::BindsTo, "component:api-handler", "platform:orders"),
            fixtures::edge("e2", EdgeType::Triggers, "component:api-handler", "platform:work-queue"),
            fixtures::edge("e3", EdgeType::BindsTo, "component:ghost", "platform:work-queue"),
        ]);
        let config = fixtures::config();
        let ctx = LoweringContext::new(&config, &[], &graph);
        assert!(event_mappings(&ctx).is_empty());
        assert!(gateway_integrations(&ctx).is_empty());
    }

    #[test]
    fn test_cr020_gateway_trio() {
        let mut edge = fixtures::edge("e9", EdgeType::Triggers, "platform:api-gw", "component:api-handler");
        edge.binding_config
            .insert("route".to_string(), serde_json::json!("/items"));
        edge.binding_config
            .insert("method".to_string(), serde_json::json!("GET"));
        let graph = graph_with(vec![edge]);
        let config = fixtures::config();
        let ctx = LoweringContext::new(&config, &[], &graph);
        let out = gateway_integrations(&ctx);
        let names: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "api-gw-api-handler-integration",
                "api-gw-api-handler-route",
                "api-gw-api-handler-invoke-permission",
            ]
        );
        assert!(out.iter().all(|r| r.source_id == "e9"));
        assert_eq!(out[1].properties["routeKey"], PropValue::str("GET /items"));
        assert_eq!(
            out[0].depends_on,
            vec!["api-gw-api", "api-handler-function"]
        );
        assert_eq!(
            out[1].depends_on,
            vec!["api-gw-api", "api-gw-api-handler-integration"]
        );
        assert_eq!(
            out[2].depends_on,
            vec!["api-handler-function", "api-gw-api"]
        );
        for r in &out {
            let PropValue::Map(tags) = &r.properties["tags"] else {
                panic!("tags missing on {}", r.name);
            };
            assert_eq!(tags[TAG_EDGE], PropValue::str("e9"));
        }
    }

    #[test]
    fn test_cr020_route_key_default() {
        let edge = fixtures::edge("e9", EdgeType::Triggers, "platform:api-gw", "component:api-handler");
        assert_eq!(route_key(&edge), "$default");

        let mut only_path = edge.clone();
        only_path
            .binding_config
            .insert("route".to_string(), serde_json::json!("/items"));
        assert_eq!(route_key(&only_path), "$default");

        let mut lower = only_path.clone();
        lower
            .binding_config
            .insert("method".to_string(), serde_json::json!("post"));
        assert_eq!(route_key(&lower), "POST /items");
    }
}
