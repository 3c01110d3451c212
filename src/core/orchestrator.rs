//! CR-004: Adapter orchestrator — runs every lowerer and merges the output.
//!
//! Phases, in order:
//! 1. Intents (network → warning, unknown non-telemetry → warning,
//!    config keys colliding on one parameter → error)
//! 2. Per-node dependency resolution
//! 3. Nodes (lookup through the registry or the legacy array)
//! 4. Event mappings from `bindsTo` edges
//! 5. Gateway integrations from `triggers` edges
//! 6. Dedup (first wins), sort by name, success flag
//!
//! A failing lowerer becomes an error diagnostic; the remaining lowerers still run.

use super::deps::{resolve_deps, ResolvedDeps};
use super::registry::{legacy_lookup, legacy_node_lowerers, LowererRegistry};
use super::types::{AdapterResult, Diagnostic, IntentKind, LookupMode, LoweredResource, Severity};
use crate::lowerers::{
    builtin_intent_lowerers, relationships, IntentLowerer, LoweringContext, NodeLowerer,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Phase-completion notifications from [`Adapter::lower_async`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoweringPhase {
    Intents,
    Nodes,
    EventMappings,
    Integrations,
    Complete,
}

impl std::fmt::Display for LoweringPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intents => write!(f, "intents"),
            Self::Nodes => write!(f, "nodes"),
            Self::EventMappings => write!(f, "event-mappings"),
            Self::Integrations => write!(f, "integrations"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

pub struct Adapter {
    mode: LookupMode,
    intent_lowerers: Vec<Box<dyn IntentLowerer>>,
    registry: LowererRegistry,
    legacy: Vec<Box<dyn NodeLowerer>>,
}

/// Accumulated output of one lowering pass.
#[derive(Default)]
struct Pass {
    resources: Vec<LoweredResource>,
    resource_map: BTreeMap<String, Vec<String>>,
    diagnostics: Vec<Diagnostic>,
    /// Parameter name → intent that generated it.
    parameters: HashMap<String, String>,
}

impl Pass {
    /// Claim the parameter names a config intent produced.
    ///
    /// Two keys that normalize to the same parameter name would otherwise be
    /// merged by dedup with the second value lost.
    fn claim_parameters(&mut self, source_id: &str, resources: &[LoweredResource]) -> Result<(), String> {
        for r in resources {
            if let Some(owner) = self.parameters.get(&r.name) {
                return Err(format!(
                    "parameter '{}' is already generated by intent '{}'",
                    r.name, owner
                ));
            }
        }
        for r in resources {
            self.parameters.insert(r.name.clone(), source_id.to_string());
        }
        Ok(())
    }

    fn record(&mut self, source_id: &str, resources: Vec<LoweredResource>) {
        let names = self.resource_map.entry(source_id.to_string()).or_default();
        for r in &resources {
            if !names.contains(&r.name) {
                names.push(r.name.clone());
            }
        }
        self.resources.extend(resources);
    }

    fn finish(self) -> AdapterResult {
        let mut seen = HashSet::new();
        let mut resources: Vec<LoweredResource> = Vec::with_capacity(self.resources.len());
        for r in self.resources {
            if seen.insert(r.name.clone()) {
                resources.push(r);
            } else {
                tracing::debug!(name = %r.name, source = %r.source_id, "dropping duplicate resource");
            }
        }
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        let success = !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error);
        AdapterResult {
            resources,
            resource_map: self.resource_map,
            diagnostics: self.diagnostics,
            success,
        }
    }
}

impl Adapter {
    /// Adapter with the built-in intent and node lowerers.
    pub fn new(mode: LookupMode) -> Self {
        Self::with_registry(mode, LowererRegistry::with_builtins())
    }

    /// Adapter whose registry path uses a caller-built registry.
    pub fn with_registry(mode: LookupMode, registry: LowererRegistry) -> Self {
        Self {
            mode,
            intent_lowerers: builtin_intent_lowerers(),
            registry,
            legacy: legacy_node_lowerers(),
        }
    }

    /// Adapter with the built-in node lowerers and a caller-chosen intent set.
    ///
    /// Intents whose kind has no entry in `intent_lowerers` are reported as
    /// warnings (telemetry excepted).
    pub fn with_intent_lowerers(mode: LookupMode, intent_lowerers: Vec<Box<dyn IntentLowerer>>) -> Self {
        Self {
            intent_lowerers,
            ..Self::new(mode)
        }
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    /// Lower intents and graph into a deduplicated, sorted resource set.
    pub fn lower(&self, ctx: &LoweringContext) -> AdapterResult {
        let mut pass = Pass::default();
        self.lower_intents(ctx, &mut pass);
        self.lower_nodes(ctx, &mut pass);
        synthesize_event_mappings(ctx, &mut pass);
        synthesize_integrations(ctx, &mut pass);
        pass.finish()
    }

    /// Same algorithm as [`Adapter::lower`], reporting each finished phase.
    pub async fn lower_async<F>(&self, ctx: &LoweringContext<'_>, mut on_phase: F) -> AdapterResult
    where
        F: FnMut(LoweringPhase),
    {
        let mut pass = Pass::default();
        self.lower_intents(ctx, &mut pass);
        on_phase(LoweringPhase::Intents);
        tokio::task::yield_now().await;
        self.lower_nodes(ctx, &mut pass);
        on_phase(LoweringPhase::Nodes);
        tokio::task::yield_now().await;
        synthesize_event_mappings(ctx, &mut pass);
        on_phase(LoweringPhase::EventMappings);
        synthesize_integrations(ctx, &mut pass);
        on_phase(LoweringPhase::Integrations);
        let result = pass.finish();
        on_phase(LoweringPhase::Complete);
        result
    }

    fn intent_lowerer(&self, kind: IntentKind) -> Option<&dyn IntentLowerer> {
        self.intent_lowerers
            .iter()
            .find(|l| l.kind() == kind)
            .map(|l| l.as_ref())
    }

    fn node_lowerer(&self, platform: &str) -> Option<&dyn NodeLowerer> {
        match self.mode {
            LookupMode::Registry => self.registry.get(platform),
            LookupMode::Legacy => legacy_lookup(&self.legacy, platform),
        }
    }

    fn lower_intents(&self, ctx: &LoweringContext, pass: &mut Pass) {
        for intent in ctx.intents {
            let source = intent.source_edge_id();
            let kind = intent.kind();
            if kind == IntentKind::Network {
                pass.diagnostics.push(Diagnostic::warning(
                    source,
                    "network intents are not supported by this adapter; skipped",
                ));
                continue;
            }
            let Some(lowerer) = self.intent_lowerer(kind) else {
                if kind != IntentKind::Telemetry {
                    pass.diagnostics.push(Diagnostic::warning(
                        source,
                        format!("no lowerer registered for intent type '{}'", intent.type_name()),
                    ));
                }
                continue;
            };
            let lowered = lowerer.lower(intent, ctx).and_then(|resources| {
                if kind == IntentKind::Config {
                    pass.claim_parameters(source, &resources)?;
                }
                Ok(resources)
            });
            match lowered {
                Ok(resources) => pass.record(source, resources),
                Err(e) => {
                    tracing::warn!(intent = source, lowerer = lowerer.name(), error = %e, "intent lowering failed");
                    pass.diagnostics
                        .push(Diagnostic::error(source, lowerer.name(), e));
                }
            }
        }
    }

    fn lower_nodes(&self, ctx: &LoweringContext, pass: &mut Pass) {
        let deps = resolve_deps(ctx);
        let empty = ResolvedDeps::default();
        for node in &ctx.graph.nodes {
            let Some(platform) = node.platform() else {
                continue;
            };
            let Some(lowerer) = self.node_lowerer(platform) else {
                pass.diagnostics.push(Diagnostic::warning(
                    &node.id,
                    format!("no lowerer registered for platform '{}'", platform),
                ));
                continue;
            };
            let node_deps = deps.get(&node.id).unwrap_or(&empty);
            match lowerer.lower(node, ctx, node_deps) {
                Ok(resources) => pass.record(&node.id, resources),
                Err(e) => {
                    tracing::warn!(node = %node.id, platform, error = %e, "node lowering failed");
                    pass.diagnostics
                        .push(Diagnostic::error(&node.id, platform, e));
                }
            }
        }
    }
}

fn synthesize_event_mappings(ctx: &LoweringContext, pass: &mut Pass) {
    for mapping in relationships::event_mappings(ctx) {
        let source = mapping.source_id.clone();
        pass.record(&source, vec![mapping]);
    }
}

fn synthesize_integrations(ctx: &LoweringContext, pass: &mut Pass) {
    for resource in relationships::gateway_integrations(ctx) {
        let source = resource.source_id.clone();
        pass.record(&source, vec![resource]);
    }
}
