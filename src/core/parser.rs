//! CR-006: Input document parsing and validation.
//!
//! An input document bundles everything one lowering needs:
//! - `config`: region, service name, code location
//! - `intents`: the upstream wiring requirements
//! - `graph`: nodes and edges
//!
//! JSON is accepted as well, being a subset of YAML.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One lowering input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub config: AdapterConfig,
    #[serde(default)]
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub graph: Graph,
}

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a document file from disk.
pub fn parse_document_file(path: &Path) -> Result<Document, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_document(&content)
}

/// Parse a document from a string.
pub fn parse_document(yaml: &str) -> Result<Document, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed document. Returns a list of errors (empty = valid).
pub fn validate_document(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if doc.config.region.trim().is_empty() {
        errors.push(ValidationError {
            message: "config.region must not be empty".to_string(),
        });
    }
    if doc.config.service_name.trim().is_empty() {
        errors.push(ValidationError {
            message: "config.service_name must not be empty".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for node in &doc.graph.nodes {
        if !node.id.contains(':') {
            errors.push(ValidationError {
                message: format!("node id '{}' must be of the form kind:name", node.id),
            });
        }
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError {
                message: format!("duplicate node id '{}'", node.id),
            });
        }
    }

    for edge in &doc.graph.edges {
        for (end, id) in [("source", &edge.source), ("target", &edge.target)] {
            if !seen.contains(id.as_str()) {
                errors.push(ValidationError {
                    message: format!("edge '{}' {} references unknown node '{}'", edge.id, end, id),
                });
            }
        }
    }

    errors
}
