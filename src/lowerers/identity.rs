//! CR-011: Identity/access intent lowerer — roles, policies, attachments.
//!
//! For principal `p` accessing resource `r` the lowerer emits:
//! - `p-exec-role` (assumable by the compute service)
//! - `p-exec-role-basic` (attachment of the managed basic execution policy)
//! - `p-r-policy` (generated policy with the requested actions)
//! - `p-r-policy-attachment` (attaches the generated policy to the role)
//!
//! The role pair is identical for every intent of the same principal; the
//! orchestrator keeps the first occurrence.

use super::{
    platform_output, resource_name, types, IntentLowerer, LoweringContext,
    LAMBDA_BASIC_EXECUTION_POLICY, PLATFORM_COMPUTE, PLATFORM_GATEWAY, PLATFORM_OBJECT_STORE,
    PLATFORM_QUEUE, PLATFORM_TABLE, PLATFORM_TOPIC,
};
use crate::core::types::{
    short_name, AccessLevel, AccessScope, IdentityAccessIntent, Intent, IntentKind,
    LoweredResource, PropValue,
};
use indexmap::IndexMap;

pub struct IdentityAccessLowerer;

impl IntentLowerer for IdentityAccessLowerer {
    fn kind(&self) -> IntentKind {
        IntentKind::IdentityAccess
    }

    fn name(&self) -> &'static str {
        "identity-access"
    }

    fn lower(&self, intent: &Intent, ctx: &LoweringContext) -> Result<Vec<LoweredResource>, String> {
        match intent {
            Intent::IdentityAccess(ia) => lower_access(ia, ctx),
            other => Err(format!(
                "identity-access lowerer cannot lower {} intent",
                other.kind()
            )),
        }
    }
}

/// Role name derived for a principal node.
pub fn exec_role_name(principal: &str) -> String {
    resource_name(short_name(principal), "exec-role")
}

fn lower_access(
    ia: &IdentityAccessIntent,
    ctx: &LoweringContext,
) -> Result<Vec<LoweredResource>, String> {
    if ia.actions.is_empty() {
        return Err(format!(
            "identity-access intent {} requests no actions",
            ia.source_edge_id
        ));
    }

    let platform = ctx.platform_of(&ia.resource);
    let actions = match platform {
        Some(p) => provider_actions(p, &ia.actions)?,
        None => {
            return Err(format!(
                "resource node '{}' not found for identity-access intent {}",
                ia.resource, ia.source_edge_id
            ))
        }
    };
    let resource_field = resolve_scope(ia, platform)?;

    let role = exec_role_name(&ia.principal);
    let principal_short = short_name(&ia.principal);
    let resource_short = short_name(&ia.resource);
    let policy = resource_name(principal_short, &format!("{}-policy", resource_short));
    let attachment = format!("{}-attachment", policy);
    let source = ia.source_edge_id.as_str();

    let mut out = exec_role(&ia.principal, source);

    let mut statement = IndexMap::new();
    statement.insert("Effect".to_string(), PropValue::str("Allow"));
    statement.insert(
        "Action".to_string(),
        PropValue::List(actions.into_iter().map(PropValue::String).collect()),
    );
    statement.insert("Resource".to_string(), resource_field);
    let mut document = IndexMap::new();
    document.insert("Version".to_string(), PropValue::str("2012-10-17"));
    document.insert(
        "Statement".to_string(),
        PropValue::List(vec![PropValue::Map(statement)]),
    );

    let mut policy_res = LoweredResource::new(policy.clone(), types::POLICY, source)
        .prop("description", format!("{} access to {}", principal_short, resource_short))
        .prop("policy", PropValue::Map(document));
    if let Some(p) = platform {
        if let Some(mapping) = platform_output(p) {
            policy_res
                .depends_on
                .push(resource_name(resource_short, mapping.resource_suffix));
        }
    }
    out.push(policy_res);

    out.push(
        LoweredResource::new(attachment, types::ROLE_POLICY_ATTACHMENT, source)
            .prop("role", PropValue::reference(role.clone()))
            .prop("policyArn", PropValue::reference(format!("{}.arn", policy)))
            .depends(&[role.as_str(), policy.as_str()]),
    );
    Ok(out)
}

/// Execution role plus its basic-execution attachment for a principal node.
pub fn exec_role(principal: &str, source_id: &str) -> Vec<LoweredResource> {
    let role = exec_role_name(principal);
    vec![
        LoweredResource::new(role.clone(), types::ROLE, source_id)
            .prop("assumeRolePolicy", assume_role_policy("lambda.amazonaws.com")),
        LoweredResource::new(format!("{}-basic", role), types::ROLE_POLICY_ATTACHMENT, source_id)
            .prop("role", PropValue::reference(role.clone()))
            .prop("policyArn", LAMBDA_BASIC_EXECUTION_POLICY)
            .depends(&[role.as_str()]),
    ]
}

fn assume_role_policy(service: &str) -> PropValue {
    let mut principal = IndexMap::new();
    principal.insert("Service".to_string(), PropValue::str(service));
    let mut statement = IndexMap::new();
    statement.insert("Effect".to_string(), PropValue::str("Allow"));
    statement.insert("Principal".to_string(), PropValue::Map(principal));
    statement.insert("Action".to_string(), PropValue::str("sts:AssumeRole"));
    let mut doc = IndexMap::new();
    doc.insert("Version".to_string(), PropValue::str("2012-10-17"));
    doc.insert(
        "Statement".to_string(),
        PropValue::List(vec![PropValue::Map(statement)]),
    );
    PropValue::Map(doc)
}

/// Resolve the policy `Resource` field from the intent scope.
fn resolve_scope(ia: &IdentityAccessIntent, platform: Option<&str>) -> Result<PropValue, String> {
    match &ia.scope {
        Some(AccessScope::Pattern { pattern }) => match pattern.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(PropValue::str(p)),
            _ => Err(format!(
                "identity-access intent {} has pattern scope but no pattern",
                ia.source_edge_id
            )),
        },
        Some(AccessScope::Specific) | None => {
            let platform = platform.ok_or_else(|| {
                format!("resource node '{}' has no platform", ia.resource)
            })?;
            let out = platform_output(platform).ok_or_else(|| {
                format!(
                    "no provider output mapping for platform '{}' (node '{}')",
                    platform, ia.resource
                )
            })?;
            let name = resource_name(short_name(&ia.resource), out.resource_suffix);
            Ok(PropValue::reference(format!("{}.{}", name, arn_field(platform))))
        }
    }
}

/// Output field carrying the ARN-shaped identifier of a platform's resource.
fn arn_field(platform: &str) -> &'static str {
    match platform {
        PLATFORM_GATEWAY => "executionArn",
        _ => "arn",
    }
}

/// Map access levels to provider actions, deduplicated in first-seen order.
pub fn provider_actions(platform: &str, levels: &[AccessLevel]) -> Result<Vec<String>, String> {
    let mut actions: Vec<String> = Vec::new();
    for level in levels {
        let mapped = actions_for(platform, *level).ok_or_else(|| {
            format!("no {} actions defined for platform '{}'", level, platform)
        })?;
        for action in mapped {
            if !actions.iter().any(|a| a == action) {
                actions.push(action.to_string());
            }
        }
    }
    Ok(actions)
}

fn actions_for(platform: &str, level: AccessLevel) -> Option<&'static [&'static str]> {
    use AccessLevel::*;
    let actions: &'static [&'static str] = match (platform, level) {
        (PLATFORM_QUEUE, Read) => &[
            "sqs:ReceiveMessage",
            "sqs:DeleteMessage",
            "sqs:GetQueueAttributes",
        ],
        (PLATFORM_QUEUE, Write) => &["sqs:SendMessage", "sqs:GetQueueAttributes"],
        (PLATFORM_QUEUE, Admin) => &["sqs:*"],
        (PLATFORM_TABLE, Read) => &[
            "dynamodb:GetItem",
            "dynamodb:Query",
            "dynamodb:Scan",
            "dynamodb:BatchGetItem",
            "dynamodb:DescribeTable",
        ],
        (PLATFORM_TABLE, Write) => &[
            "dynamodb:PutItem",
            "dynamodb:UpdateItem",
            "dynamodb:DeleteItem",
            "dynamodb:BatchWriteItem",
            "dynamodb:DescribeTable",
        ],
        (PLATFORM_TABLE, Admin) => &["dynamodb:*"],
        (PLATFORM_OBJECT_STORE, Read) => &["s3:GetObject", "s3:ListBucket"],
        (PLATFORM_OBJECT_STORE, Write) => &["s3:PutObject", "s3:DeleteObject", "s3:ListBucket"],
        (PLATFORM_OBJECT_STORE, Admin) => &["s3:*"],
        (PLATFORM_TOPIC, Read) => &["sns:GetTopicAttributes"],
        (PLATFORM_TOPIC, Write) => &["sns:Publish", "sns:GetTopicAttributes"],
        (PLATFORM_TOPIC, Admin) => &["sns:*"],
        (PLATFORM_COMPUTE, Read) => &["lambda:GetFunction"],
        (PLATFORM_COMPUTE, Write) => &["lambda:InvokeFunction"],
        (PLATFORM_COMPUTE, Admin) => &["lambda:*"],
        (PLATFORM_GATEWAY, Read) | (PLATFORM_GATEWAY, Write) => &["execute-api:Invoke"],
        (PLATFORM_GATEWAY, Admin) => &["execute-api:*"],
        _ => return None,
    };
    Some(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Graph;
    use crate::lowerers::fixtures;

    fn intent(actions: Vec<AccessLevel>, scope: Option<AccessScope>) -> Intent {
        Intent::IdentityAccess(IdentityAccessIntent {
            source_edge_id: "edge-iam".to_string(),
            principal: "component:api-handler".to_string(),
            resource: "platform:work-queue".to_string(),
            actions,
            scope,
        })
    }

    fn lower(intent: &Intent, graph: &Graph) -> Result<Vec<LoweredResource>, String> {
        let config = fixtures::config();
        let ctx = LoweringContext::new(&config, &[], graph);
        IdentityAccessLowerer.lower(intent, &ctx)
    }

    fn statement(policy: &LoweredResource) -> IndexMap<String, PropValue> {
        let PropValue::Map(doc) = &policy.properties["policy"] else {
            panic!("policy document missing");
        };
        let PropValue::List(stmts) = &doc["Statement"] else {
            panic!("statements missing");
        };
        let PropValue::Map(s) = &stmts[0] else {
            panic!("statement not a map");
        };
        s.clone()
    }

    #[test]
    fn test_cr011_emits_role_policy_attachments() {
        let out = lower(&intent(vec![AccessLevel::Read], None), &fixtures::sample_graph()).unwrap();
        let names: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "api-handler-exec-role",
                "api-handler-exec-role-basic",
                "api-handler-work-queue-policy",
                "api-handler-work-queue-policy-attachment",
            ]
        );
        assert!(out.iter().all(|r| r.source_id == "edge-iam"));
        assert_eq!(out[0].resource_type, types::ROLE);
        assert_eq!(out[2].resource_type, types::POLICY);
        assert_eq!(out[3].resource_type, types::ROLE_POLICY_ATTACHMENT);
    }

    #[test]
    fn test_cr011_actions_deduplicated_first_seen() {
        let actions =
            provider_actions(PLATFORM_QUEUE, &[AccessLevel::Read, AccessLevel::Write]).unwrap();
        assert_eq!(
            actions,
            vec![
                "sqs:ReceiveMessage",
                "sqs:DeleteMessage",
                "sqs:GetQueueAttributes",
                "sqs:SendMessage",
            ]
        );
        let twice =
            provider_actions(PLATFORM_QUEUE, &[AccessLevel::Write, AccessLevel::Write]).unwrap();
        assert_eq!(twice, vec!["sqs:SendMessage", "sqs:GetQueueAttributes"]);
    }

    #[test]
    fn test_cr011_specific_scope_references_arn() {
        let out = lower(
            &intent(vec![AccessLevel::Write], Some(AccessScope::Specific)),
            &fixtures::sample_graph(),
        )
        .unwrap();
        let s = statement(&out[2]);
        assert_eq!(s["Resource"], PropValue::reference("work-queue-queue.arn"));
        assert!(out[2].depends_on.contains(&"work-queue-queue".to_string()));
    }

    #[test]
    fn test_cr011_absent_scope_behaves_like_specific() {
        let out = lower(&intent(vec![AccessLevel::Write], None), &fixtures::sample_graph()).unwrap();
        assert_eq!(statement(&out[2])["Resource"], PropValue::reference("work-queue-queue.arn"));
    }

    #[test]
    fn test_cr011_pattern_scope_verbatim() {
        let out = lower(
            &intent(
                vec![AccessLevel::Read],
                Some(AccessScope::Pattern {
                    pattern: Some("*".to_string()),
                }),
            ),
            &fixtures::sample_graph(),
        )
        .unwrap();
        assert_eq!(statement(&out[2])["Resource"], PropValue::str("*"));
    }

    #[test]
    fn test_cr011_pattern_scope_missing_pattern_fails() {
        let err = lower(
            &intent(
                vec![AccessLevel::Read],
                Some(AccessScope::Pattern { pattern: None }),
            ),
            &fixtures::sample_graph(),
        )
        .unwrap_err();
        assert!(err.contains("no pattern"));
    }

    #[test]
    fn test_cr011_unresolvable_node_is_fatal_not_wildcard() {
        let err = lower(&intent(vec![AccessLevel::Read], None), &Graph::default()).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_cr011_unknown_platform_is_fatal() {
        let graph = Graph {
            nodes: vec![fixtures::node("platform:work-queue", "mainframe")],
            edges: vec![],
        };
        let err = lower(&intent(vec![AccessLevel::Read], None), &graph).unwrap_err();
        assert!(err.contains("mainframe"));
    }

    #[test]
    fn test_cr011_no_actions_rejected() {
        let err = lower(&intent(vec![], None), &fixtures::sample_graph()).unwrap_err();
        assert!(err.contains("no actions"));
    }

    #[test]
    fn test_cr011_basic_policy_is_whitelisted_literal() {
        let out = lower(&intent(vec![AccessLevel::Read], None), &fixtures::sample_graph()).unwrap();
        let basic = &out[1];
        assert_eq!(basic.properties["policyArn"], PropValue::str(LAMBDA_BASIC_EXECUTION_POLICY));
        assert_eq!(basic.properties["role"], PropValue::reference("api-handler-exec-role"));
        assert_eq!(basic.depends_on, vec!["api-handler-exec-role"]);
    }

    #[test]
    fn test_cr011_attachment_references_policy_arn() {
        let out = lower(&intent(vec![AccessLevel::Read], None), &fixtures::sample_graph()).unwrap();
        let att = &out[3];
        assert_eq!(
            att.properties["policyArn"],
            PropValue::reference("api-handler-work-queue-policy.arn")
        );
        assert_eq!(
            att.depends_on,
            vec!["api-handler-exec-role", "api-handler-work-queue-policy"]
        );
    }

    #[test]
    fn test_cr011_gateway_uses_execution_arn() {
        let intent = Intent::IdentityAccess(IdentityAccessIntent {
            source_edge_id: "e".to_string(),
            principal: "component:api-handler".to_string(),
            resource: "platform:api-gw".to_string(),
            actions: vec![AccessLevel::Write],
            scope: None,
        });
        let out = lower(&intent, &fixtures::sample_graph()).unwrap();
        assert_eq!(statement(&out[2])["Resource"], PropValue::reference("api-gw-api.executionArn"));
    }
}
