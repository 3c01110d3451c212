//! CR-012: Network intent lowerer.
//!
//! Network wiring is recognized but not lowered yet. The lowerer always
//! returns no resources; the orchestrator reports the warning.

use super::{IntentLowerer, LoweringContext};
use crate::core::types::{Intent, IntentKind, LoweredResource};

pub struct NetworkLowerer;

impl IntentLowerer for NetworkLowerer {
    fn kind(&self) -> IntentKind {
        IntentKind::Network
    }

    fn name(&self) -> &'static str {
        "network"
    }

    fn lower(&self, _intent: &Intent, _ctx: &LoweringContext) -> Result<Vec<LoweredResource>, String> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NetworkIntent;
    use crate::lowerers::fixtures;

    #[test]
    fn test_cr012_network_emits_nothing() {
        let config = fixtures::config();
        let graph = fixtures::sample_graph();
        let ctx = LoweringContext::new(&config, &[], &graph);
        let intent = Intent::Network(NetworkIntent {
            source_edge_id: "net-1".to_string(),
            source: "component:api-handler".to_string(),
            target: "platform:orders".to_string(),
            port: Some(443),
            protocol: Some("tcp".to_string()),
        });
        assert!(NetworkLowerer.lower(&intent, &ctx).unwrap().is_empty());
        assert_eq!(NetworkLowerer.kind(), IntentKind::Network);
    }
}
