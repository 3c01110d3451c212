//! CR-003: Node lowerer registry — platform name → lowerer.
//!
//! Registration fails on an already-registered platform unless `overwrite` is
//! set. Enumeration is sorted by platform name.

use crate::lowerers::bucket::BucketLowerer;
use crate::lowerers::compute::ComputeLowerer;
use crate::lowerers::gateway::GatewayLowerer;
use crate::lowerers::queue::QueueLowerer;
use crate::lowerers::table::TableLowerer;
use crate::lowerers::topic::TopicLowerer;
use crate::lowerers::NodeLowerer;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct LowererRegistry {
    lowerers: BTreeMap<String, Box<dyn NodeLowerer>>,
}

impl LowererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in node lowerer.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for lowerer in legacy_node_lowerers() {
            let registered = registry.register(lowerer, false);
            debug_assert!(registered.is_ok(), "built-in lowerers collide: {:?}", registered);
        }
        registry
    }

    pub fn register(&mut self, lowerer: Box<dyn NodeLowerer>, overwrite: bool) -> Result<(), String> {
        let platform = lowerer.platform();
        if !overwrite && self.lowerers.contains_key(platform) {
            return Err(format!(
                "lowerer for platform '{}' is already registered",
                platform
            ));
        }
        self.lowerers.insert(platform.to_string(), lowerer);
        Ok(())
    }

    pub fn get(&self, platform: &str) -> Option<&dyn NodeLowerer> {
        self.lowerers.get(platform).map(|l| l.as_ref())
    }

    /// All registered lowerers, sorted by platform.
    pub fn list(&self) -> Vec<(&str, &dyn NodeLowerer)> {
        self.lowerers
            .iter()
            .map(|(p, l)| (p.as_str(), l.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lowerers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lowerers.is_empty()
    }
}

/// Static lowerer array used by `LookupMode::Legacy`.
pub fn legacy_node_lowerers() -> Vec<Box<dyn NodeLowerer>> {
    vec![
        Box::new(ComputeLowerer),
        Box::new(QueueLowerer),
        Box::new(TableLowerer),
        Box::new(BucketLowerer),
        Box::new(GatewayLowerer),
        Box::new(TopicLowerer),
    ]
}

/// Linear lookup over the legacy array.
pub fn legacy_lookup<'a>(
    lowerers: &'a [Box<dyn NodeLowerer>],
    platform: &str,
) -> Option<&'a dyn NodeLowerer> {
    lowerers
        .iter()
        .find(|l| l.platform() == platform)
        .map(|l| l.as_ref())
}
