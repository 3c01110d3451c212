//! Lowerers — turn intents and platform-tagged graph nodes into resource descriptors.
//!
//! Every lowerer is a pure function of its input:
//! 1. Intent lowerers map one intent to zero or more resources
//! 2. Node lowerers map one graph node (plus its resolved deps) to resources
//! 3. Relationship synthesis covers resources that only exist between two nodes

pub mod bucket;
pub mod compute;
pub mod config;
pub mod gateway;
pub mod identity;
pub mod network;
pub mod queue;
pub mod relationships;
pub mod table;
pub mod topic;

use crate::core::deps::ResolvedDeps;
use crate::core::types::{
    AdapterConfig, Graph, GraphNode, Intent, IntentKind, LoweredResource, PropValue,
};
use indexmap::IndexMap;

// ============================================================================
// Platforms and resource types
// ============================================================================

pub const PLATFORM_COMPUTE: &str = "compute-function";
pub const PLATFORM_QUEUE: &str = "queue";
pub const PLATFORM_TABLE: &str = "key-value-table";
pub const PLATFORM_OBJECT_STORE: &str = "object-store";
pub const PLATFORM_GATEWAY: &str = "http-gateway";
pub const PLATFORM_TOPIC: &str = "pubsub-topic";

/// Provider-qualified resource type tokens.
pub mod types {
    pub const ROLE: &str = "aws:iam/role:Role";
    pub const POLICY: &str = "aws:iam/policy:Policy";
    pub const ROLE_POLICY_ATTACHMENT: &str = "aws:iam/rolePolicyAttachment:RolePolicyAttachment";
    pub const POLICY_ATTACHMENT: &str = "aws:iam/policyAttachment:PolicyAttachment";
    pub const FUNCTION: &str = "aws:lambda/function:Function";
    pub const EVENT_SOURCE_MAPPING: &str = "aws:lambda/eventSourceMapping:EventSourceMapping";
    pub const PERMISSION: &str = "aws:lambda/permission:Permission";
    pub const QUEUE: &str = "aws:sqs/queue:Queue";
    pub const PARAMETER: &str = "aws:ssm/parameter:Parameter";
    pub const SECURITY_GROUP_RULE: &str = "aws:ec2/securityGroupRule:SecurityGroupRule";
    pub const TABLE: &str = "aws:dynamodb/table:Table";
    pub const BUCKET: &str = "aws:s3/bucketV2:BucketV2";
    pub const BUCKET_VERSIONING: &str = "aws:s3/bucketVersioningV2:BucketVersioningV2";
    pub const API: &str = "aws:apigatewayv2/api:Api";
    pub const STAGE: &str = "aws:apigatewayv2/stage:Stage";
    pub const INTEGRATION: &str = "aws:apigatewayv2/integration:Integration";
    pub const ROUTE: &str = "aws:apigatewayv2/route:Route";
    pub const TOPIC: &str = "aws:sns/topic:Topic";

    /// Every type the lowerers can produce.
    pub const ALL: &[&str] = &[
        ROLE,
        POLICY,
        ROLE_POLICY_ATTACHMENT,
        POLICY_ATTACHMENT,
        FUNCTION,
        EVENT_SOURCE_MAPPING,
        PERMISSION,
        QUEUE,
        PARAMETER,
        SECURITY_GROUP_RULE,
        TABLE,
        BUCKET,
        BUCKET_VERSIONING,
        API,
        STAGE,
        INTEGRATION,
        ROUTE,
        TOPIC,
    ];
}

/// The only provider handle a lowerer may emit as a literal.
pub const LAMBDA_BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Tag keys stamped on every node-derived resource.
pub const TAG_NODE: &str = "cirrus:node";
pub const TAG_PLATFORM: &str = "cirrus:platform";
pub const TAG_EDGE: &str = "cirrus:edge";

// ============================================================================
// Lowering context and traits
// ============================================================================

/// Read-only inputs shared by every lowerer in one compilation pass.
#[derive(Debug, Clone, Copy)]
pub struct LoweringContext<'a> {
    pub config: &'a AdapterConfig,
    pub intents: &'a [Intent],
    pub graph: &'a Graph,
}

impl<'a> LoweringContext<'a> {
    pub fn new(config: &'a AdapterConfig, intents: &'a [Intent], graph: &'a Graph) -> Self {
        Self {
            config,
            intents,
            graph,
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a GraphNode> {
        self.graph.node(id)
    }

    /// Platform of a node, if the node exists and carries one.
    pub fn platform_of(&self, id: &str) -> Option<&'a str> {
        self.node(id).and_then(|n| n.platform())
    }
}

/// Lowers one kind of intent.
pub trait IntentLowerer: Send + Sync {
    fn kind(&self) -> IntentKind;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    fn lower(&self, intent: &Intent, ctx: &LoweringContext) -> Result<Vec<LoweredResource>, String>;
}

/// Lowers graph nodes of one platform.
pub trait NodeLowerer: Send + Sync {
    fn platform(&self) -> &'static str;

    fn lower(
        &self,
        node: &GraphNode,
        ctx: &LoweringContext,
        deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String>;
}

/// Built-in intent lowerers, in registration order.
pub fn builtin_intent_lowerers() -> Vec<Box<dyn IntentLowerer>> {
    vec![
        Box::new(identity::IdentityAccessLowerer),
        Box::new(network::NetworkLowerer),
        Box::new(config::ConfigLowerer),
    ]
}

// ============================================================================
// Shared helpers
// ============================================================================

/// `"{shortName}-{kind}"`.
pub fn resource_name(short: &str, kind: &str) -> String {
    format!("{}-{}", short, kind)
}

/// Traceability tags for a node-derived resource.
pub fn node_tags(node: &GraphNode, platform: &str) -> PropValue {
    let mut tags = IndexMap::new();
    tags.insert(TAG_NODE.to_string(), PropValue::str(node.id.clone()));
    tags.insert(TAG_PLATFORM.to_string(), PropValue::str(platform));
    PropValue::Map(tags)
}

/// Per-platform resource suffix and the output field a bare reference means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformOutput {
    pub resource_suffix: &'static str,
    pub default_field: &'static str,
}

const PLATFORM_OUTPUTS: &[(&str, PlatformOutput)] = &[
    (
        PLATFORM_COMPUTE,
        PlatformOutput {
            resource_suffix: "function",
            default_field: "arn",
        },
    ),
    (
        PLATFORM_QUEUE,
        PlatformOutput {
            resource_suffix: "queue",
            default_field: "url",
        },
    ),
    (
        PLATFORM_TABLE,
        PlatformOutput {
            resource_suffix: "table",
            default_field: "name",
        },
    ),
    (
        PLATFORM_OBJECT_STORE,
        PlatformOutput {
            resource_suffix: "bucket",
            default_field: "bucket",
        },
    ),
    (
        PLATFORM_GATEWAY,
        PlatformOutput {
            resource_suffix: "api",
            default_field: "apiEndpoint",
        },
    ),
    (
        PLATFORM_TOPIC,
        PlatformOutput {
            resource_suffix: "topic",
            default_field: "arn",
        },
    ),
];

/// Look up the output mapping of a platform.
pub fn platform_output(platform: &str) -> Option<PlatformOutput> {
    PLATFORM_OUTPUTS
        .iter()
        .find(|(p, _)| *p == platform)
        .map(|(_, out)| *out)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cr010_resource_name() {
        assert_eq!(resource_name("work-queue", "queue"), "work-queue-queue");
        assert_eq!(resource_name("api-gw", "api"), "api-gw-api");
    }

    #[test]
    fn test_cr010_node_tags() {
        let node = fixtures::node("platform:work-queue", PLATFORM_QUEUE);
        match node_tags(&node, PLATFORM_QUEUE) {
            PropValue::Map(m) => {
                assert_eq!(m[TAG_NODE], PropValue::str("platform:work-queue"));
                assert_eq!(m[TAG_PLATFORM], PropValue::str("queue"));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_cr010_platform_output_table() {
        let q = platform_output(PLATFORM_QUEUE).unwrap();
        assert_eq!(q.resource_suffix, "queue");
        assert_eq!(q.default_field, "url");
        assert!(platform_output("mainframe").is_none());
    }

    #[test]
    fn test_cr010_builtin_intent_lowerers() {
        let kinds: Vec<_> = builtin_intent_lowerers().iter().map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            vec![IntentKind::IdentityAccess, IntentKind::Network, IntentKind::Config]
        );
    }

    #[test]
    fn test_cr010_all_types_unique() {
        let mut seen = std::collections::HashSet::new();
        for t in types::ALL {
            assert!(seen.insert(*t), "duplicate type {}", t);
        }
        assert_eq!(types::ALL.len(), 18);
    }
}
