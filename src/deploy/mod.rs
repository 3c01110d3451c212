//! Deployer — apply or preview a linked program on a named stack.
//!
//! Both entry points share one run shape: name the stack, emit
//! `stack-creating`, create or select it, emit `stack-configuring`, set the
//! region, emit `deploying`/`previewing`, run (optionally raced against a
//! timeout), then emit `complete` or `error`. Failures never escape as `Err`;
//! they come back classified on the result.

pub mod classify;
pub mod eventlog;
pub mod stack;

use crate::link::Program;
use classify::{classify_error, ClassifiedError, Failure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stack::{PreviewSummary, StackError, UpResult, Workspace, REGION_CONFIG_KEY};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressEventType {
    StackCreating,
    StackConfiguring,
    Deploying,
    Previewing,
    Complete,
    Error,
}

/// One progress notification; every event carries the resolved stack name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    pub stack_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl ProgressEvent {
    pub fn new(event_type: ProgressEventType, stack_name: &str) -> Self {
        Self {
            event_type,
            stack_name: stack_name.to_string(),
            error: None,
        }
    }
}

pub type EventCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Per-call overrides for a deploy or preview.
#[derive(Default)]
pub struct DeployOptions {
    /// Defaults to `{service_name}-{region}`
    pub stack_name: Option<String>,
    /// Defaults to `service_name`
    pub project_name: Option<String>,
    pub timeout: Option<Duration>,
    pub on_event: Option<EventCallback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_changes: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub success: bool,
    pub stack_name: String,
    pub outputs: IndexMap<String, serde_json::Value>,
    pub summary: DeploySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ClassifiedError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub success: bool,
    pub stack_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ClassifiedError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Up,
    Preview,
}

enum RunOutput {
    Up(UpResult),
    Preview(PreviewSummary),
}

/// Default stack name for a program.
pub fn default_stack_name(program: &Program) -> String {
    let config = program.config();
    format!("{}-{}", config.service_name, config.region)
}

fn emit(options: &DeployOptions, event: ProgressEvent) {
    tracing::info!(stack = %event.stack_name, event = ?event.event_type, "progress");
    if let Some(callback) = &options.on_event {
        callback(&event);
    }
}

fn failure(err: StackError) -> Failure {
    match err {
        StackError::Value(value) => Failure::Value(value),
        other => Failure::error(other),
    }
}

async fn run(
    workspace: &dyn Workspace,
    program: Program,
    options: &DeployOptions,
    operation: Operation,
    stack_name: &str,
) -> Result<RunOutput, Failure> {
    let project_name = options
        .project_name
        .clone()
        .unwrap_or_else(|| program.config().service_name.clone());
    let region = program.config().region.clone();

    emit(options, ProgressEvent::new(ProgressEventType::StackCreating, stack_name));
    let mut stack = workspace
        .create_or_select_stack(&project_name, stack_name, program)
        .await
        .map_err(failure)?;

    emit(options, ProgressEvent::new(ProgressEventType::StackConfiguring, stack_name));
    stack
        .set_config(REGION_CONFIG_KEY, &region)
        .await
        .map_err(failure)?;

    let running = match operation {
        Operation::Up => ProgressEventType::Deploying,
        Operation::Preview => ProgressEventType::Previewing,
    };
    emit(options, ProgressEvent::new(running, stack_name));

    let handle = tokio::spawn(async move {
        match operation {
            Operation::Up => stack.up().await.map(RunOutput::Up),
            Operation::Preview => stack.preview().await.map(RunOutput::Preview),
        }
    });

    let joined = match options.timeout {
        // On expiry the handle is dropped; the spawned run is detached, not cancelled.
        Some(limit) => tokio::time::timeout(limit, handle).await.map_err(|_| {
            Failure::error(StackError::Timeout {
                millis: limit.as_millis(),
            })
        })?,
        None => handle.await,
    };

    match joined {
        Ok(result) => result.map_err(failure),
        // Only reachable through cancellation; panics abort the process.
        Err(join_err) => Err(Failure::error(StackError::Backend(join_err.to_string()))),
    }
}

/// Run `operation` and emit the terminal event.
async fn run_and_report(
    workspace: &dyn Workspace,
    program: Program,
    options: &DeployOptions,
    operation: Operation,
) -> (String, Result<RunOutput, ClassifiedError>) {
    let stack_name = options
        .stack_name
        .clone()
        .unwrap_or_else(|| default_stack_name(&program));
    match run(workspace, program, options, operation, &stack_name).await {
        Ok(output) => {
            emit(options, ProgressEvent::new(ProgressEventType::Complete, &stack_name));
            (stack_name, Ok(output))
        }
        Err(err) => {
            let detail = classify_error(&err);
            tracing::warn!(
                stack = %stack_name,
                category = %detail.category,
                retryable = detail.retryable,
                "{}",
                detail.message
            );
            let mut event = ProgressEvent::new(ProgressEventType::Error, &stack_name);
            event.error = Some(detail.clone());
            emit(options, event);
            (stack_name, Err(detail))
        }
    }
}

/// Apply the program to its stack.
pub async fn deploy(
    workspace: &dyn Workspace,
    program: Program,
    options: DeployOptions,
) -> DeployResult {
    let (stack_name, outcome) = run_and_report(workspace, program, &options, Operation::Up).await;
    match outcome {
        Ok(RunOutput::Up(up)) => DeployResult {
            success: true,
            stack_name,
            outputs: up
                .outputs
                .into_iter()
                .map(|(k, wrapped)| (k, wrapped.value))
                .collect(),
            summary: DeploySummary {
                resource_changes: Some(up.resource_changes),
            },
            error: None,
            error_detail: None,
        },
        Ok(RunOutput::Preview(_)) => DeployResult {
            success: true,
            stack_name,
            ..Default::default()
        },
        Err(detail) => DeployResult {
            success: false,
            stack_name,
            error: Some(detail.message.clone()),
            error_detail: Some(detail),
            ..Default::default()
        },
    }
}

/// Dry-run the program; never touches remote state.
pub async fn preview(
    workspace: &dyn Workspace,
    program: Program,
    options: DeployOptions,
) -> PreviewResult {
    let (stack_name, outcome) =
        run_and_report(workspace, program, &options, Operation::Preview).await;
    match outcome {
        Ok(RunOutput::Preview(summary)) => PreviewResult {
            success: true,
            stack_name,
            change_summary: Some(summary.change_summary),
            error: None,
            error_detail: None,
        },
        Ok(RunOutput::Up(_)) => PreviewResult {
            success: true,
            stack_name,
            ..Default::default()
        },
        Err(detail) => PreviewResult {
            success: false,
            stack_name,
            error: Some(detail.message.clone()),
            error_detail: Some(detail),
            ..Default::default()
        },
    }
}
