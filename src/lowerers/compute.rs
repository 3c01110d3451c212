//! CR-014: Compute-function node lowerer.

use super::identity::exec_role;
use super::{node_tags, resource_name, types, LoweringContext, NodeLowerer, PLATFORM_COMPUTE};
use crate::core::deps::ResolvedDeps;
use crate::core::types::{GraphNode, LoweredResource, PropValue};
use indexmap::IndexMap;

pub const DEFAULT_RUNTIME: &str = "nodejs20.x";
pub const DEFAULT_HANDLER: &str = "index.handler";
pub const DEFAULT_MEMORY_MB: u64 = 128;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct ComputeLowerer;

impl NodeLowerer for ComputeLowerer {
    fn platform(&self) -> &'static str {
        PLATFORM_COMPUTE
    }

    fn lower(
        &self,
        node: &GraphNode,
        ctx: &LoweringContext,
        deps: &ResolvedDeps,
    ) -> Result<Vec<LoweredResource>, String> {
        let short = node.short_name();
        let name = resource_name(short, "function");
        let mut out = Vec::new();

        // Nodes without an identity-access intent still need an execution role.
        let role = match &deps.role_name {
            Some(role) => role.clone(),
            None => {
                let generated = exec_role(&node.id, &node.id);
                let role = generated[0].name.clone();
                out.extend(generated);
                role
            }
        };

        let mut function = LoweredResource::new(name, types::FUNCTION, &node.id)
            .prop("role", PropValue::reference(role.clone()))
            .prop(
                "runtime",
                node.str_prop("runtime").unwrap_or(DEFAULT_RUNTIME),
            )
            .prop(
                "handler",
                node.str_prop("handler").unwrap_or(DEFAULT_HANDLER),
            )
            .prop(
                "memorySize",
                PropValue::int(node.u64_prop("memory").unwrap_or(DEFAULT_MEMORY_MB)),
            )
            .prop(
                "timeout",
                PropValue::int(node.u64_prop("timeout").unwrap_or(DEFAULT_TIMEOUT_SECS)),
            );

        if let Some(s3) = &ctx.config.code_s3 {
            function = function
                .prop("s3Bucket", s3.bucket.clone())
                .prop("s3Key", s3.key.clone());
        } else if let Some(path) = &ctx.config.code_path {
            let mut code = IndexMap::new();
            code.insert("archive".to_string(), PropValue::str(path.clone()));
            function = function.prop("code", PropValue::Map(code));
        }

        if !deps.env_vars.is_empty() {
            let variables: IndexMap<String, PropValue> = deps
                .env_vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut environment = IndexMap::new();
            environment.insert("variables".to_string(), PropValue::Map(variables));
            function = function.prop("environment", PropValue::Map(environment));
        }

        if !deps.security_groups.is_empty() {
            let mut vpc = IndexMap::new();
            vpc.insert(
                "securityGroupIds".to_string(),
                PropValue::List(
                    deps.security_groups
                        .iter()
                        .map(|g| PropValue::str(g.clone()))
                        .collect(),
                ),
            );
            function = function.prop("vpcConfig", PropValue::Map(vpc));
        }

        function = function
            .prop("tags", node_tags(node, PLATFORM_COMPUTE))
            .depends(&[role.as_str()]);
        // Referenced resources must exist before the function reads them.
        for value in deps.env_vars.values() {
            if let Some(r) = value.as_ref_target() {
                let dep = r.resource().to_string();
                if !function.depends_on.contains(&dep) {
                    function.depends_on.push(dep);
                }
            }
        }

        out.push(function);
        Ok(out)
    }
}
