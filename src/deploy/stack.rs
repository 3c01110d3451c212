//! CR-042: Stack backend seam and the local in-process workspace.
//!
//! A `Workspace` creates or selects a named stack bound to a linked program.
//! `LocalWorkspace` runs `up` against its provider and `preview` against a
//! throwaway `MemoryProvider`, so previews never construct real resources.

use crate::link::{LinkError, LinkedOutputs, MemoryProvider, Program, ResourceProvider};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Config key carrying the target region.
pub const REGION_CONFIG_KEY: &str = "aws:region";

#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Operation timed out after {millis}ms")]
    Timeout { millis: u128 },

    #[error("stack '{stack}' is already being updated")]
    Conflict { stack: String },

    #[error("invalid stack config {key}: {message}")]
    Config { key: String, message: String },

    #[error("{0}")]
    Backend(String),

    /// The backend rejected with a bare value rather than an error.
    #[error("{0}")]
    Value(String),
}

/// A stack output as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: serde_json::Value,
    #[serde(default)]
    pub secret: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpResult {
    pub outputs: IndexMap<String, OutputValue>,
    /// Operation → resource count
    pub resource_changes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewSummary {
    /// Operation → resource count
    pub change_summary: BTreeMap<String, u64>,
}

#[async_trait]
pub trait Stack: Send + Sync {
    fn name(&self) -> &str;

    async fn set_config(&mut self, key: &str, value: &str) -> Result<(), StackError>;

    async fn up(&mut self) -> Result<UpResult, StackError>;

    async fn preview(&mut self) -> Result<PreviewSummary, StackError>;
}

#[async_trait]
pub trait Workspace: Send + Sync {
    async fn create_or_select_stack(
        &self,
        project: &str,
        stack: &str,
        program: Program,
    ) -> Result<Box<dyn Stack>, StackError>;
}

/// Workspace whose stacks apply through a resource provider in this process.
pub struct LocalWorkspace {
    provider: Arc<dyn ResourceProvider>,
    busy: Arc<Mutex<HashSet<String>>>,
}

impl LocalWorkspace {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn create_or_select_stack(
        &self,
        project: &str,
        stack: &str,
        program: Program,
    ) -> Result<Box<dyn Stack>, StackError> {
        tracing::debug!(project, stack, "selecting local stack");
        Ok(Box::new(LocalStack {
            name: stack.to_string(),
            program: program.with_provider(self.provider.clone()),
            config: BTreeMap::new(),
            busy: self.busy.clone(),
        }))
    }
}

struct LocalStack {
    name: String,
    program: Program,
    config: BTreeMap<String, String>,
    busy: Arc<Mutex<HashSet<String>>>,
}

/// Marks a stack busy for the lifetime of one operation.
struct BusyGuard {
    name: String,
    busy: Arc<Mutex<HashSet<String>>>,
}

impl BusyGuard {
    fn acquire(name: &str, busy: &Arc<Mutex<HashSet<String>>>) -> Result<Self, StackError> {
        let mut set = busy
            .lock()
            .map_err(|_| StackError::Backend("stack lock poisoned".to_string()))?;
        if !set.insert(name.to_string()) {
            return Err(StackError::Conflict {
                stack: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            busy: busy.clone(),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.busy.lock() {
            set.remove(&self.name);
        }
    }
}

fn change_counts(linked: &LinkedOutputs) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    counts.insert("create".to_string(), linked.objects.len() as u64);
    if !linked.skipped.is_empty() {
        counts.insert("skip".to_string(), linked.skipped.len() as u64);
    }
    counts
}

impl LocalStack {
    fn region(&self) -> String {
        self.config
            .get(REGION_CONFIG_KEY)
            .cloned()
            .unwrap_or_else(|| self.program.config().region.clone())
    }
}

#[async_trait]
impl Stack for LocalStack {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_config(&mut self, key: &str, value: &str) -> Result<(), StackError> {
        if value.trim().is_empty() {
            return Err(StackError::Config {
                key: key.to_string(),
                message: "value must not be empty".to_string(),
            });
        }
        self.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn up(&mut self) -> Result<UpResult, StackError> {
        let _guard = BusyGuard::acquire(&self.name, &self.busy)?;
        let linked = self.program.execute().await?;
        let outputs = linked
            .outputs
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    OutputValue {
                        value: v.clone(),
                        secret: false,
                    },
                )
            })
            .collect();
        Ok(UpResult {
            outputs,
            resource_changes: change_counts(&linked),
        })
    }

    async fn preview(&mut self) -> Result<PreviewSummary, StackError> {
        let _guard = BusyGuard::acquire(&self.name, &self.busy)?;
        let dry_run = self
            .program
            .with_provider(Arc::new(MemoryProvider::new(&self.region())));
        let linked = dry_run.execute().await?;
        Ok(PreviewSummary {
            change_summary: change_counts(&linked),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourcePlan;
    use crate::link::create_program;
    use crate::lowerers::fixtures;

    fn empty_program() -> Program {
        create_program(
            ResourcePlan::default(),
            fixtures::config(),
            Arc::new(MemoryProvider::new("us-east-1")),
        )
    }

    #[tokio::test]
    async fn test_cr042_set_config_rejects_empty() {
        let ws = LocalWorkspace::new(Arc::new(MemoryProvider::new("us-east-1")));
        let mut stack = ws
            .create_or_select_stack("orders", "orders-dev", empty_program())
            .await
            .unwrap();
        assert_eq!(stack.name(), "orders-dev");
        assert!(stack.set_config(REGION_CONFIG_KEY, " ").await.is_err());
        stack.set_config(REGION_CONFIG_KEY, "eu-west-1").await.unwrap();
    }

    #[test]
    fn test_cr042_busy_guard_conflict() {
        let busy = Arc::new(Mutex::new(HashSet::new()));
        let first = BusyGuard::acquire("s", &busy).unwrap();
        let err = BusyGuard::acquire("s", &busy).err().unwrap();
        assert!(matches!(err, StackError::Conflict { .. }));
        assert!(err.to_string().contains("already being updated"));
        drop(first);
        assert!(BusyGuard::acquire("s", &busy).is_ok());
    }

    #[test]
    fn test_cr042_timeout_message() {
        let err = StackError::Timeout { millis: 250 };
        assert_eq!(err.to_string(), "Operation timed out after 250ms");
    }
}
