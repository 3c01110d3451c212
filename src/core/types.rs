//! CR-001: Pipeline types — intents, graph, lowered resources, plans, diagnostics.
//!
//! Everything that moves between the lowering, planning, and linking stages is
//! defined here. All types derive Serialize/Deserialize so input documents and
//! plans roundtrip through YAML and JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Adapter configuration
// ============================================================================

/// Target account settings shared by every lowering and deploy call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Cloud region (e.g. "us-east-1")
    pub region: String,

    /// Service name, used for stack naming and parameter paths
    pub service_name: String,

    /// Local path to the function code bundle
    #[serde(default)]
    pub code_path: Option<String>,

    /// Pre-uploaded function code bundle
    #[serde(default)]
    pub code_s3: Option<CodeS3>,
}

/// Object-store location of a function code bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeS3 {
    pub bucket: String,
    pub key: String,
}

/// Node lowerer lookup strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Platform-keyed registry (default)
    #[default]
    Registry,
    /// Static lowerer array, kept as a rollback path
    Legacy,
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

// ============================================================================
// Intents
// ============================================================================

/// A backend-neutral wiring requirement produced upstream.
///
/// Intents are tagged by `type`. A tag this adapter has no model for parses
/// into [`Intent::Unknown`] so lowering can report it instead of rejecting
/// the whole document.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    IdentityAccess(IdentityAccessIntent),
    Network(NetworkIntent),
    Config(ConfigIntent),
    Telemetry(TelemetryIntent),
    Unknown(UnknownIntent),
}

impl Intent {
    /// Provenance edge id.
    pub fn source_edge_id(&self) -> &str {
        match self {
            Self::IdentityAccess(i) => &i.source_edge_id,
            Self::Network(i) => &i.source_edge_id,
            Self::Config(i) => &i.source_edge_id,
            Self::Telemetry(i) => &i.source_edge_id,
            Self::Unknown(i) => &i.source_edge_id,
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Self::IdentityAccess(_) => IntentKind::IdentityAccess,
            Self::Network(_) => IntentKind::Network,
            Self::Config(_) => IntentKind::Config,
            Self::Telemetry(_) => IntentKind::Telemetry,
            Self::Unknown(_) => IntentKind::Unknown,
        }
    }

    /// The `type` tag as written in the input.
    pub fn type_name(&self) -> String {
        match self {
            Self::Unknown(i) => i.intent_type.clone(),
            other => other.kind().to_string(),
        }
    }
}

/// Wire form of the modelled intents.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum TaggedRef<'a> {
    IdentityAccess(&'a IdentityAccessIntent),
    Network(&'a NetworkIntent),
    Config(&'a ConfigIntent),
    Telemetry(&'a TelemetryIntent),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Tagged {
    IdentityAccess(IdentityAccessIntent),
    Network(NetworkIntent),
    Config(ConfigIntent),
    Telemetry(TelemetryIntent),
}

impl From<Tagged> for Intent {
    fn from(t: Tagged) -> Self {
        match t {
            Tagged::IdentityAccess(i) => Self::IdentityAccess(i),
            Tagged::Network(i) => Self::Network(i),
            Tagged::Config(i) => Self::Config(i),
            Tagged::Telemetry(i) => Self::Telemetry(i),
        }
    }
}

impl Serialize for Intent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::IdentityAccess(i) => TaggedRef::IdentityAccess(i).serialize(serializer),
            Self::Network(i) => TaggedRef::Network(i).serialize(serializer),
            Self::Config(i) => TaggedRef::Config(i).serialize(serializer),
            Self::Telemetry(i) => TaggedRef::Telemetry(i).serialize(serializer),
            Self::Unknown(i) => i.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = match value.get("type") {
            Some(serde_json::Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "intent type must be a string, got {}",
                    other
                )))
            }
            None => return Err(D::Error::missing_field("type")),
        };
        match tag.as_str() {
            "identity-access" | "network" | "config" | "telemetry" => {
                serde_json::from_value::<Tagged>(value)
                    .map(Intent::from)
                    .map_err(D::Error::custom)
            }
            _ => serde_json::from_value::<UnknownIntent>(value)
                .map(Intent::Unknown)
                .map_err(D::Error::custom),
        }
    }
}

/// Intent type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    IdentityAccess,
    Network,
    Config,
    Telemetry,
    Unknown,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityAccess => write!(f, "identity-access"),
            Self::Network => write!(f, "network"),
            Self::Config => write!(f, "config"),
            Self::Telemetry => write!(f, "telemetry"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An intent whose `type` has no model here. Remaining fields are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownIntent {
    #[serde(rename = "type")]
    pub intent_type: String,

    #[serde(default)]
    pub source_edge_id: String,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Principal node needs some level of access to a resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAccessIntent {
    pub source_edge_id: String,

    /// Graph node id of the acting principal
    pub principal: String,

    /// Graph node id of the accessed resource
    pub resource: String,

    /// Requested access levels
    pub actions: Vec<AccessLevel>,

    /// How the policy `Resource` field is scoped
    #[serde(default)]
    pub scope: Option<AccessScope>,
}

/// Requested access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Resource scoping for an identity-access intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessScope {
    /// Exactly the target resource
    Specific,
    /// An explicit resource pattern
    Pattern {
        #[serde(default)]
        pattern: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIntent {
    pub source_edge_id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// A configuration value must be made available to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIntent {
    pub source_edge_id: String,

    /// Graph node id receiving the value
    pub target: String,

    /// Configuration key (environment variable name)
    pub key: String,

    pub value_source: ValueSource,
}

/// Where a configuration value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSource {
    Literal {
        value: String,
    },
    Reference {
        node: String,
        #[serde(default)]
        field: Option<String>,
    },
    Secret {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryIntent {
    pub source_edge_id: String,
    #[serde(default)]
    pub target: Option<String>,
}

// ============================================================================
// Graph
// ============================================================================

/// Graph snapshot produced by the compilation kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    /// Find a node by its composite id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A graph node, identified by `"{kind}:{shortName}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
}

impl GraphNode {
    /// The id segment after the first colon (the whole id if there is none).
    pub fn short_name(&self) -> &str {
        short_name(&self.id)
    }

    /// Non-empty `platform` property.
    pub fn platform(&self) -> Option<&str> {
        self.str_prop("platform").filter(|p| !p.is_empty())
    }

    pub fn str_prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn u64_prop(&self, key: &str) -> Option<u64> {
        self.properties.get(key).and_then(|v| v.as_u64())
    }

    pub fn bool_prop(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_bool())
    }
}

/// Short name of a composite node id.
pub fn short_name(id: &str) -> &str {
    match id.split_once(':') {
        Some((_, rest)) => rest,
        None => id,
    }
}

/// A typed edge between two graph nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub binding_config: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeType {
    BindsTo,
    Triggers,
    DependsOn,
    Contains,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindsTo => write!(f, "bindsTo"),
            Self::Triggers => write!(f, "triggers"),
            Self::DependsOn => write!(f, "dependsOn"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

// ============================================================================
// Property values
// ============================================================================

/// Free-form ordered property map.
pub type Properties = IndexMap<String, PropValue>;

/// A resource property value. `Ref` is resolved only at link time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Ref(SymbolicRef),
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<PropValue>),
    Map(IndexMap<String, PropValue>),
    Null,
}

impl PropValue {
    /// Reference another planned resource, optionally `"name.field"`.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::Ref(SymbolicRef::new(target))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn int(n: u64) -> Self {
        Self::Number(serde_json::Number::from(n))
    }

    pub fn as_ref_target(&self) -> Option<&SymbolicRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value. Objects of the exact `{ref}` shape become `Ref`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.clone()),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(target)) = map.get("ref") {
                        return Self::reference(target.clone());
                    }
                }
                Self::Map(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Self::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A `{ref: "name"}` or `{ref: "name.field"}` marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolicRef {
    #[serde(rename = "ref")]
    pub target: String,
}

impl SymbolicRef {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Referenced resource name (before the first dot).
    pub fn resource(&self) -> &str {
        match self.target.split_once('.') {
            Some((name, _)) => name,
            None => &self.target,
        }
    }

    /// Explicit field (after the first dot), if any.
    pub fn field(&self) -> Option<&str> {
        self.target
            .split_once('.')
            .map(|(_, field)| field)
            .filter(|f| !f.is_empty())
    }
}

impl fmt::Display for SymbolicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

// ============================================================================
// Lowered resources and plans
// ============================================================================

/// Canonical resource descriptor moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredResource {
    /// Unique resource name
    pub name: String,

    /// Provider-qualified type token
    pub resource_type: String,

    #[serde(default)]
    pub properties: Properties,

    /// Intent edge id or node id this resource came from
    pub source_id: String,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl LoweredResource {
    pub fn new(name: impl Into<String>, resource_type: &str, source_id: &str) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.to_string(),
            properties: Properties::new(),
            source_id: source_id.to_string(),
            depends_on: Vec::new(),
        }
    }

    /// Builder-style property setter.
    pub fn prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn depends(mut self, names: &[&str]) -> Self {
        self.depends_on.extend(names.iter().map(|n| n.to_string()));
        self
    }
}

/// A lowered resource without provenance, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedResource {
    pub name: String,
    pub resource_type: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl From<&LoweredResource> for PlannedResource {
    fn from(r: &LoweredResource) -> Self {
        Self {
            name: r.name.clone(),
            resource_type: r.resource_type.clone(),
            properties: r.properties.clone(),
            depends_on: r.depends_on.clone(),
        }
    }
}

/// Topologically ordered plan plus stack-output templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub resources: Vec<PlannedResource>,
    /// Output key → `"${name.field}"`
    #[serde(default)]
    pub outputs: IndexMap<String, String>,
}

// ============================================================================
// Diagnostics and adapter result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A non-fatal lowering problem attached to an intent or node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source_id: String,
    #[serde(default)]
    pub lowerer: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(source_id: &str, lowerer: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            source_id: source_id.to_string(),
            lowerer: Some(lowerer.to_string()),
            message: message.into(),
        }
    }

    pub fn warning(source_id: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            source_id: source_id.to_string(),
            lowerer: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lowerer {
            Some(l) => write!(f, "[{}] {} ({}): {}", self.severity, self.source_id, l, self.message),
            None => write!(f, "[{}] {}: {}", self.severity, self.source_id, self.message),
        }
    }
}

/// Orchestrator output: deduplicated, name-sorted resources plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterResult {
    pub resources: Vec<LoweredResource>,
    /// Source id → generated resource names
    pub resource_map: BTreeMap<String, Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
}

impl AdapterResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn resource(&self, name: &str) -> Option<&LoweredResource> {
        self.resources.iter().find(|r| r.name == name)
    }
}
