//! CR-015: Queue node lowerer.

use super::{node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_QUEUE};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource, PropValue};

pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;
/// Four days.
pub const DEFAULT_MESSAGE_RETENTION_SECS: u64 = 345_600;

pub struct QueueLowerer;

impl NodeLowerer for QueueLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_QUEUE
    }

    fn lower(
        &self,
        node: &GraphNode,
        _ctx: &LoweringContext,
        _deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let mut queue = LoweredResource::new(
            resource_name(node.short_name(), "queue"),
            types::QUEUE,
            &node.id,
        )
        .prop(
            "visibilityTimeoutSeconds",
            PropValue::int(
                node.u64_prop("visibilityTimeout")
                    .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            ),
        )
        .prop(
            "messageRetentionSeconds",
            PropValue::int(
                node.u64_prop("messageRetention")
                    .unwrap_or(DEFAULT_MESSAGE_RETENTION_SECS),
            ),
        );
        if node.bool_prop("fifo") == Some(true) {
            queue = queue.prop("fifoQueue", true);
        }
        if let Some(delay) = node.u64_prop("delaySeconds") {
            queue = queue.prop("delaySeconds", PropValue::int(delay));
        }
        Ok(vec![queue.prop("tags", node_tags(node, PLATFORM_QUEUE))])
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
        QueueLowerer.lower(node, &ctx, &ResolvedDeps::default()).unwrap()
    }

    #[test]
    fn test_cr015_queue_defaults() {
        let out = lower_node(&fixtures::node("platform:work-queue", PLATFORM_QUEUE));
        assert_eq!(out.len(), 1);
        let q = &out[0];
        assert_eq!(q.name, "work-queue-queue");
        assert_eq!(q.resource_type, types::QUEUE);
        assert_eq!(q.source_id, "platform:work-queue");
        assert_eq!(q.properties["visibilityTimeoutSeconds"], PropValue::int(30));
        assert_eq!(q.properties["messageRetentionSeconds"], PropValue::int(345_600));
        assert!(!q.properties.contains_key("fifoQueue"));
        assert!(q.depends_on.is_empty());
    }

    #[test]
    fn test_cr015_queue_overrides() {
        let node = fixtures::node_with(
            "platform:jobs",
            PLATFORM_QUEUE,
            serde_json::json!({"visibilityTimeout": 120, "messageRetention": 60, "fifo": true, "delaySeconds": 5}),
        );
        let q = &lower_node(&node)[0];
        assert_eq!(q.properties["visibilityTimeoutSeconds"], PropValue::int(120));
        assert_eq!(q.properties["messageRetentionSeconds"], PropValue::int(60));
        assert_eq!(q.properties["fifoQueue"], PropValue::Bool(true));
        assert_eq!(q.properties["delaySeconds"], PropValue::int(5));
    }
}
