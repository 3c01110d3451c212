//! CR-030: Resource provider seam and live objects.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A constructed resource as seen by later constructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveObject {
    pub name: String,
    pub resource_type: String,
    /// Resolved inputs plus provider-assigned outputs
    pub fields: IndexMap<String, serde_json::Value>,
}

impl LiveObject {
    pub fn field(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }
}

/// One construction call.
#[derive(Debug)]
pub struct CreateRequest<'a> {
    pub name: &'a str,
    pub resource_type: &'a str,
    /// Properties with every `{ref}` already replaced by a live value
    pub inputs: &'a IndexMap<String, serde_json::Value>,
    /// Already-constructed objects named in `depends_on`
    pub depends_on: &'a [&'a LiveObject],
}

/// Constructs live resources. Calls are issued strictly one at a time.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Whether this provider has a constructor for `resource_type`.
    fn supports(&self, resource_type: &str) -> bool;

    async fn create(&self, request: CreateRequest<'_>) -> Result<LiveObject, String>;
}
