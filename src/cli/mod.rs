//! CR-050: CLI subcommands — validate, lower, plan, preview, deploy.

use crate::core::orchestrator::Adapter;
use crate::core::types::{AdapterResult, LookupMode, ResourcePlan, Severity};
use crate::core::{parser, planner};
use crate::deploy::stack::LocalWorkspace;
use crate::deploy::{self, eventlog, DeployOptions, ProgressEvent, ProgressEventType};
use crate::link::{create_program, MemoryProvider, Program};
use crate::lowerers::LoweringContext;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an input document without lowering it
    Validate {
        /// Path to the input document
        #[arg(short, long, default_value = "cirrus.yaml")]
        file: PathBuf,
    },

    /// Lower intents and graph nodes into resources
    Lower {
        /// Path to the input document
        #[arg(short, long, default_value = "cirrus.yaml")]
        file: PathBuf,

        /// Node lowerer lookup strategy (registry, legacy)
        #[arg(long, default_value = "registry", value_parser = parse_lookup)]
        lookup: LookupMode,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the dependency-ordered resource plan
    Plan {
        /// Path to the input document
        #[arg(short, long, default_value = "cirrus.yaml")]
        file: PathBuf,

        /// Node lowerer lookup strategy (registry, legacy)
        #[arg(long, default_value = "registry", value_parser = parse_lookup)]
        lookup: LookupMode,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dry-run the plan against a local in-memory stack
    Preview {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Apply the plan to a local in-memory stack
    Deploy {
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Arguments shared by preview and deploy.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the input document
    #[arg(short, long, default_value = "cirrus.yaml")]
    pub file: PathBuf,

    /// Node lowerer lookup strategy (registry, legacy)
    #[arg(long, default_value = "registry", value_parser = parse_lookup)]
    pub lookup: LookupMode,

    /// Stack name (default: {service_name}-{region})
    #[arg(long)]
    pub stack: Option<String>,

    /// Project name (default: service_name)
    #[arg(long)]
    pub project: Option<String>,

    /// Abandon the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Append progress events to this JSONL file
    #[arg(long)]
    pub event_log: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_lookup(s: &str) -> Result<LookupMode, String> {
    match s {
        "registry" => Ok(LookupMode::Registry),
        "legacy" => Ok(LookupMode::Legacy),
        other => Err(format!("unknown lookup mode '{}' (expected registry or legacy)", other)),
    }
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Lower { file, lookup, json } => cmd_lower(&file, lookup, json),
        Commands::Plan { file, lookup, json } => cmd_plan(&file, lookup, json),
        Commands::Preview { run } => cmd_run(&run, false),
        Commands::Deploy { run } => cmd_run(&run, true),
    }
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let doc = parser::parse_document_file(file)?;
    let errors = parser::validate_document(&doc);

    if errors.is_empty() {
        println!(
            "OK: {} ({} intents, {} nodes, {} edges)",
            doc.config.service_name,
            doc.intents.len(),
            doc.graph.nodes.len(),
            doc.graph.edges.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate an input document, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<parser::Document, String> {
    let doc = parser::parse_document_file(file)?;
    let errors = parser::validate_document(&doc);
    if errors.is_empty() {
        return Ok(doc);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Lower a document; a result with error diagnostics is a failure.
fn lower_document(doc: &parser::Document, lookup: LookupMode) -> Result<AdapterResult, String> {
    let ctx = LoweringContext::new(&doc.config, &doc.intents, &doc.graph);
    let result = Adapter::new(lookup).lower(&ctx);
    for d in result
        .diagnostics
        .iter()
        .filter(|d| d.severity != Severity::Error)
    {
        eprintln!("  WARN: {}", d);
    }
    if result.success {
        return Ok(result);
    }
    for d in result.errors() {
        eprintln!("  ERROR: {}", d);
    }
    Err(format!(
        "lowering failed with {} error(s)",
        result.errors().count()
    ))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialize error: {}", e))
}

fn cmd_lower(file: &Path, lookup: LookupMode, json: bool) -> Result<(), String> {
    let doc = parse_and_validate(file)?;
    let result = lower_document(&doc, lookup)?;

    if json {
        println!("{}", to_json(&result)?);
        return Ok(());
    }
    println!(
        "Lowered: {} ({} resources, lookup={})",
        doc.config.service_name,
        result.resources.len(),
        lookup
    );
    println!();
    for r in &result.resources {
        println!("  {} ({}) <- {}", r.name, r.resource_type, r.source_id);
    }
    Ok(())
}

fn build_plan(file: &Path, lookup: LookupMode) -> Result<(parser::Document, ResourcePlan), String> {
    let doc = parse_and_validate(file)?;
    let result = lower_document(&doc, lookup)?;
    let plan = planner::generate_plan(&result, &doc.config);
    Ok((doc, plan))
}

fn cmd_plan(file: &Path, lookup: LookupMode, json: bool) -> Result<(), String> {
    let (doc, plan) = build_plan(file, lookup)?;

    if json {
        println!("{}", to_json(&plan)?);
        return Ok(());
    }
    print_plan(&doc.config.service_name, &plan)
}

/// Display a plan to stdout.
fn print_plan(service: &str, plan: &ResourcePlan) -> Result<(), String> {
    println!("Planning: {} ({} resources)", service, plan.resources.len());
    println!();
    for (i, r) in plan.resources.iter().enumerate() {
        if r.depends_on.is_empty() {
            println!("  {:>3}. + {} ({})", i + 1, r.name, r.resource_type);
        } else {
            println!(
                "  {:>3}. + {} ({}) after [{}]",
                i + 1,
                r.name,
                r.resource_type,
                r.depends_on.join(", ")
            );
        }
    }
    if !plan.outputs.is_empty() {
        println!();
        println!("Outputs:");
        for (key, template) in &plan.outputs {
            println!("  {} = {}", key, template);
        }
    }
    println!();
    println!("Fingerprint: {}", planner::plan_fingerprint(plan)?);
    Ok(())
}

fn deploy_options(run: &RunArgs) -> DeployOptions {
    let event_log = run.event_log.clone();
    DeployOptions {
        stack_name: run.stack.clone(),
        project_name: run.project.clone(),
        timeout: run.timeout_ms.map(Duration::from_millis),
        on_event: Some(Box::new(move |event: &ProgressEvent| {
            print_event(event);
            if let Some(path) = &event_log {
                if let Err(e) = eventlog::append_event(path, event) {
                    tracing::warn!(path = %path.display(), "event log write failed: {}", e);
                }
            }
        })),
    }
}

fn print_event(event: &ProgressEvent) {
    let label = match event.event_type {
        ProgressEventType::StackCreating => "creating stack",
        ProgressEventType::StackConfiguring => "configuring stack",
        ProgressEventType::Deploying => "deploying",
        ProgressEventType::Previewing => "previewing",
        ProgressEventType::Complete => "complete",
        ProgressEventType::Error => "error",
    };
    match &event.error {
        Some(err) => eprintln!(
            "[{}] {}: {} ({}, retryable={})",
            event.stack_name, label, err.message, err.category, err.retryable
        ),
        None => eprintln!("[{}] {}", event.stack_name, label),
    }
}

fn local_program(doc: parser::Document, plan: ResourcePlan) -> (Program, LocalWorkspace) {
    let provider = Arc::new(MemoryProvider::new(&doc.config.region));
    let workspace = LocalWorkspace::new(provider.clone());
    (create_program(plan, doc.config, provider), workspace)
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start async runtime: {}", e))
}

fn cmd_run(run: &RunArgs, apply: bool) -> Result<(), String> {
    let (doc, plan) = build_plan(&run.file, run.lookup)?;
    let (program, workspace) = local_program(doc, plan);
    let options = deploy_options(run);
    let rt = runtime()?;

    if apply {
        let result = rt.block_on(deploy::deploy(&workspace, program, options));
        if run.json {
            println!("{}", to_json(&result)?);
        } else if result.success {
            println!("Deploy complete: {}", result.stack_name);
            if let Some(changes) = &result.summary.resource_changes {
                for (op, n) in changes {
                    println!("  {}: {}", op, n);
                }
            }
            for (key, value) in &result.outputs {
                println!("  {} = {}", key, value);
            }
        }
        match result.error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    } else {
        let result = rt.block_on(deploy::preview(&workspace, program, options));
        if run.json {
            println!("{}", to_json(&result)?);
        } else if let Some(changes) = &result.change_summary {
            println!("Preview: {}", result.stack_name);
            for (op, n) in changes {
                println!("  {}: {}", op, n);
            }
        }
        match result.error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
config:
  region: us-east-1
  service_name: orders
  code_path: ./dist
intents:
  - type: identity-access
    source_edge_id: e1
    principal: component:api-handler
    resource: platform:work-queue
    actions: [read, write]
  - type: config
    source_edge_id: e2
    target: component:api-handler
    key: QUEUE_URL
    value_source:
      kind: reference
      node: platform:work-queue
  - type: network
    source_edge_id: e3
    source: component:api-handler
    target: platform:work-queue
graph:
  nodes:
    - id: component:api-handler
      properties:
        platform: compute-function
    - id: platform:work-queue
      properties:
        platform: queue
  edges:
    - id: e1
      type: bindsTo
      source: component:api-handler
      target: platform:work-queue
"#;

    fn write_doc(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("cirrus.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn run_args(file: PathBuf) -> RunArgs {
        RunArgs {
            file,
            lookup: LookupMode::Registry,
            stack: None,
            project: None,
            timeout_ms: None,
            event_log: None,
            json: false,
        }
    }

    #[test]
    fn test_cr050_parse_lookup() {
        assert_eq!(parse_lookup("registry"), Ok(LookupMode::Registry));
        assert_eq!(parse_lookup("legacy"), Ok(LookupMode::Legacy));
        assert!(parse_lookup("other").is_err());
    }

    #[test]
    fn test_cr050_validate() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_doc(dir.path(), DOC);
        dispatch(Commands::Validate { file }).unwrap();
    }

    #[test]
    fn test_cr050_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_doc(
            dir.path(),
            "config:\n  region: \"\"\n  service_name: s\ngraph:\n  nodes:\n    - id: bad\n",
        );
        let err = cmd_validate(&file).unwrap_err();
        assert_eq!(err, "2 validation error(s)");
    }

    #[test]
    fn test_cr050_lower_both_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_doc(dir.path(), DOC);
        cmd_lower(&file, LookupMode::Registry, false).unwrap();
        cmd_lower(&file, LookupMode::Legacy, true).unwrap();
    }

    #[test]
    fn test_cr050_lower_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = parser::parse_document(DOC).unwrap();
        broken.graph.nodes[1]
            .properties
            .insert("keySchema".to_string(), serde_json::json!({"hashKey": "pk"}));
        broken.graph.nodes[1]
            .properties
            .insert("platform".to_string(), serde_json::json!("key-value-table"));
        let file = write_doc(dir.path(), &serde_yaml_ng::to_string(&broken).unwrap());
        let err = cmd_lower(&file, LookupMode::Registry, false).unwrap_err();
        assert!(err.contains("lowering failed"), "{}", err);
    }

    #[test]
    fn test_cr050_plan() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_doc(dir.path(), DOC);
        cmd_plan(&file, LookupMode::Registry, false).unwrap();
        cmd_plan(&file, LookupMode::Registry, true).unwrap();
        let (_, plan) = build_plan(&file, LookupMode::Registry).unwrap();
        assert!(plan
            .resources
            .iter()
            .any(|r| r.name == "api-handler-work-queue-event-mapping"));
    }

    #[test]
    fn test_cr050_preview_and_deploy_with_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_doc(dir.path(), DOC);
        let log = dir.path().join("events.jsonl");

        let mut args = run_args(file);
        args.event_log = Some(log.clone());
        dispatch(Commands::Preview { run: args.clone() }).unwrap();
        args.stack = Some("orders-dev".to_string());
        args.json = true;
        dispatch(Commands::Deploy { run: args }).unwrap();

        let events = eventlog::read_events(&log).unwrap();
        assert_eq!(events.len(), 8);
        assert_eq!(events[2].event.event_type, ProgressEventType::Previewing);
        assert_eq!(events[3].event.stack_name, "orders-us-east-1");
        assert_eq!(events[6].event.event_type, ProgressEventType::Deploying);
        assert_eq!(events[7].event.stack_name, "orders-dev");
    }

    #[test]
    fn test_cr050_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_plan(&dir.path().join("none.yaml"), LookupMode::Registry, false)
            .unwrap_err();
        assert!(err.contains("failed to read"));
    }
}
