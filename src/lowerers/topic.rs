//! CR-019: Pub/sub topic node lowerer.

use super::{node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_TOPIC};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource};

pub struct TopicLowerer;

impl NodeLowerer for TopicLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_TOPIC
    }

    fn lower(
        &self,
        node: &GraphNode,
        _ctx: &LoweringContext,
        _deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let mut topic = LoweredResource::new(
            resource_name(node.short_name(), "topic"),
            types::TOPIC,
            &node.id,
        );
        if node.bool_prop("fifo") == Some(true) {
            topic = topic
                .prop("fifoTopic", true)
                .prop("contentBasedDeduplication", true);
        }
        if let Some(display) = node.str_prop("displayName") {
            topic = topic.prop("displayName", display);
        }
        Ok(vec![topic.prop("tags", node_tags(node, PLATFORM_TOPIC))])
    }
}
