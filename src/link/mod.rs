//! Program linker/executor — turns a plan into live objects.
//!
//! Resources are constructed strictly one after another in plan order. Each
//! `{ref}` is resolved against the objects constructed so far; a ref to a
//! resource that does not exist yet is a plan bug and aborts execution.

pub mod memory;
pub mod provider;
pub mod resolve;

pub use memory::MemoryProvider;
pub use provider::{CreateRequest, LiveObject, ResourceProvider};

use crate::core::types::{AdapterConfig, ResourcePlan};
use indexmap::IndexMap;
use resolve::{parse_template, resolve_value, RefSite};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// A `{ref}` names a resource that was never constructed.
    #[error("Unresolved ref \"{target}\" in {resource}.{property}")]
    UnresolvedRef {
        target: String,
        resource: String,
        property: String,
    },

    /// The referenced object exists but lacks the requested field.
    #[error("Unresolved ref \"{target}\" in {resource}: no field '{field}'")]
    UnresolvedField {
        target: String,
        resource: String,
        field: String,
    },

    #[error("Unresolved output \"{key}\": {resource}.{field} is not available")]
    UnresolvedOutput {
        key: String,
        resource: String,
        field: String,
    },

    #[error("invalid output template for \"{key}\": {template}")]
    InvalidTemplate { key: String, template: String },

    #[error("failed to construct {resource} ({resource_type}): {message}")]
    Construction {
        resource: String,
        resource_type: String,
        message: String,
    },
}

/// Result of one program execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedOutputs {
    /// Resolved output templates
    pub outputs: IndexMap<String, serde_json::Value>,
    /// Constructed objects, in construction order
    pub objects: Vec<LiveObject>,
    /// Resources skipped for lack of a constructor
    pub skipped: Vec<String>,
}

/// A plan bound to a provider, ready to execute.
#[derive(Clone)]
pub struct Program {
    plan: ResourcePlan,
    config: AdapterConfig,
    provider: Arc<dyn ResourceProvider>,
}

/// Bind a plan to the provider that will construct it.
pub fn create_program(
    plan: ResourcePlan,
    config: AdapterConfig,
    provider: Arc<dyn ResourceProvider>,
) -> Program {
    Program {
        plan,
        config,
        provider,
    }
}

impl Program {
    pub fn plan(&self) -> &ResourcePlan {
        &self.plan
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The same plan bound to another provider.
    pub fn with_provider(&self, provider: Arc<dyn ResourceProvider>) -> Program {
        Program {
            plan: self.plan.clone(),
            config: self.config.clone(),
            provider,
        }
    }

    /// Construct every planned resource, then resolve the output templates.
    ///
    /// The object registry lives only for this call.
    pub async fn execute(&self) -> Result<LinkedOutputs, LinkError> {
        let mut registry: HashMap<String, LiveObject> = HashMap::new();
        let mut linked = LinkedOutputs::default();

        tracing::info!(
            service = %self.config.service_name,
            provider = self.provider.name(),
            resources = self.plan.resources.len(),
            "executing program"
        );

        for planned in &self.plan.resources {
            if !self.provider.supports(&planned.resource_type) {
                tracing::warn!(
                    resource = %planned.name,
                    resource_type = %planned.resource_type,
                    "no constructor for resource type; skipped"
                );
                linked.skipped.push(planned.name.clone());
                continue;
            }

            let mut inputs = IndexMap::with_capacity(planned.properties.len());
            for (key, value) in &planned.properties {
                let site = RefSite {
                    resource: &planned.name,
                    resource_type: &planned.resource_type,
                    property: key,
                };
                inputs.insert(key.clone(), resolve_value(value, site, &registry)?);
            }

            let depends_on: Vec<&LiveObject> = planned
                .depends_on
                .iter()
                .filter_map(|d| registry.get(d))
                .collect();

            let object = self
                .provider
                .create(CreateRequest {
                    name: &planned.name,
                    resource_type: &planned.resource_type,
                    inputs: &inputs,
                    depends_on: &depends_on,
                })
                .await
                .map_err(|message| LinkError::Construction {
                    resource: planned.name.clone(),
                    resource_type: planned.resource_type.clone(),
                    message,
                })?;
            tracing::debug!(resource = %planned.name, "constructed");
            registry.insert(planned.name.clone(), object.clone());
            linked.objects.push(object);
        }

        for (key, template) in &self.plan.outputs {
            let (name, field) =
                parse_template(template).ok_or_else(|| LinkError::InvalidTemplate {
                    key: key.clone(),
                    template: template.clone(),
                })?;
            let value = registry
                .get(name)
                .and_then(|o| o.field(field))
                .ok_or_else(|| LinkError::UnresolvedOutput {
                    key: key.clone(),
                    resource: name.to_string(),
                    field: field.to_string(),
                })?;
            linked.outputs.insert(key.clone(), value.clone());
        }
        Ok(linked)
    }
}
