//! CR-005: Plan generation — topological order plus stack outputs.
//!
//! Iterative depth-first visit over `depends_on`, seeded in alphabetical name order so
//! unrelated resources always land in the same relative position. Unknown
//! dependency names are skipped. A back edge (cycle) is dropped and logged.

use super::types::{AdapterConfig, AdapterResult, PlannedResource, ResourcePlan};
use crate::lowerers::types;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Stack outputs a resource type exposes: `(suffix, field)`.
pub fn output_fields(resource_type: &str) -> &'static [(&'static str, &'static str)] {
    match resource_type {
        types::FUNCTION => &[("arn", "arn")],
        types::QUEUE => &[("url", "url"), ("arn", "arn")],
        types::API => &[("id", "id"), ("url", "apiEndpoint")],
        types::TABLE => &[("name", "name"), ("arn", "arn")],
        types::BUCKET => &[("name", "bucket"), ("arn", "arn")],
        types::TOPIC => &[("arn", "arn")],
        types::ROLE => &[("arn", "arn")],
        _ => &[],
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order the lowered resources and derive output templates.
pub fn generate_plan(result: &AdapterResult, config: &AdapterConfig) -> ResourcePlan {
    let by_name: HashMap<&str, usize> = result
        .resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();

    let mut seeds: Vec<&str> = by_name.keys().copied().collect();
    seeds.sort_unstable();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order: Vec<usize> = Vec::with_capacity(result.resources.len());
    for name in seeds {
        visit(name, result, &by_name, &mut marks, &mut order);
    }

    let resources: Vec<PlannedResource> = order
        .into_iter()
        .map(|i| PlannedResource::from(&result.resources[i]))
        .collect();

    let mut outputs = IndexMap::new();
    for r in &resources {
        for (suffix, field) in output_fields(&r.resource_type) {
            outputs.insert(
                format!("{}-{}", r.name, suffix),
                format!("${{{}.{}}}", r.name, field),
            );
        }
    }

    tracing::debug!(
        service = %config.service_name,
        region = %config.region,
        resources = resources.len(),
        outputs = outputs.len(),
        "plan generated"
    );
    ResourcePlan { resources, outputs }
}

/// Post-order walk from `seed` over an explicit stack of `(resource, next dep)`
/// frames, so dependency chain depth is bounded by heap rather than call stack.
fn visit<'a>(
    seed: &'a str,
    result: &'a AdapterResult,
    by_name: &HashMap<&'a str, usize>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<usize>,
) {
    let Some(&seed_idx) = by_name.get(seed) else {
        return;
    };
    if marks.contains_key(seed) {
        return;
    }
    marks.insert(seed, Mark::Visiting);
    let mut stack: Vec<(usize, usize)> = vec![(seed_idx, 0)];

    while let Some(frame) = stack.last_mut() {
        let (idx, next) = *frame;
        let deps = &result.resources[idx].depends_on;
        if next == deps.len() {
            stack.pop();
            marks.insert(result.resources[idx].name.as_str(), Mark::Done);
            order.push(idx);
            continue;
        }
        frame.1 += 1;

        let dep = deps[next].as_str();
        let Some(&dep_idx) = by_name.get(dep) else {
            continue;
        };
        match marks.get(dep) {
            Some(Mark::Done) => {}
            Some(Mark::Visiting) => {
                tracing::warn!(resource = dep, "dependency cycle detected; edge ignored");
            }
            None => {
                marks.insert(dep, Mark::Visiting);
                stack.push((dep_idx, 0));
            }
        }
    }
}

/// BLAKE3 fingerprint of a plan's canonical JSON form.
pub fn plan_fingerprint(plan: &ResourcePlan) -> Result<String, String> {
    let json = serde_json::to_string(plan).map_err(|e| format!("cannot serialize plan: {}", e))?;
    Ok(format!("blake3:{}", blake3::hash(json.as_bytes()).to_hex()))
}
