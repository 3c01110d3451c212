//! CR-031: In-process provider with deterministic fabricated outputs.
//!
//! Every object echoes its resolved inputs and adds the output fields its type
//! exposes (`arn`, `url`, `apiEndpoint`, ...). Identifiers derive from the
//! resource name, so repeated runs produce identical objects.

use super::provider::{CreateRequest, LiveObject, ResourceProvider};
use crate::lowerers::types;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Account id stamped into fabricated ARNs.
pub const LOCAL_ACCOUNT: &str = "000000000000";

/// Record of one construction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    pub name: String,
    pub resource_type: String,
    pub depends_on: Vec<String>,
}

pub struct MemoryProvider {
    region: String,
    account: String,
    calls: Mutex<Vec<CreateCall>>,
    failures: BTreeMap<String, String>,
}

impl MemoryProvider {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            account: LOCAL_ACCOUNT.to_string(),
            calls: Mutex::new(Vec::new()),
            failures: BTreeMap::new(),
        }
    }

    /// Make construction of `name` fail with `message`.
    pub fn fail_on(mut self, name: &str, message: &str) -> Self {
        self.failures.insert(name.to_string(), message.to_string());
        self
    }

    /// Construction calls so far, in call order.
    pub fn calls(&self) -> Vec<CreateCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn outputs(
        &self,
        name: &str,
        resource_type: &str,
        inputs: &IndexMap<String, Value>,
    ) -> Vec<(&'static str, String)> {
        let (region, account) = (&self.region, &self.account);
        let arn = |service: &str, resource: &str| {
            format!("arn:aws:{}:{}:{}:{}", service, region, account, resource)
        };
        match resource_type {
            types::ROLE => vec![
                ("arn", format!("arn:aws:iam::{}:role/{}", account, name)),
                ("name", name.to_string()),
            ],
            types::POLICY => vec![
                ("arn", format!("arn:aws:iam::{}:policy/{}", account, name)),
                ("name", name.to_string()),
            ],
            types::FUNCTION => {
                let function_arn = arn("lambda", &format!("function:{}", name));
                vec![
                    (
                        "invokeArn",
                        format!(
                            "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
                            region, function_arn
                        ),
                    ),
                    ("arn", function_arn),
                    ("name", name.to_string()),
                ]
            }
            types::QUEUE => vec![
                ("arn", arn("sqs", name)),
                ("url", format!("https://sqs.{}.amazonaws.com/{}/{}", region, account, name)),
                ("name", name.to_string()),
            ],
            types::TABLE => {
                let mut out = vec![
                    ("arn", arn("dynamodb", &format!("table/{}", name))),
                    ("name", name.to_string()),
                ];
                if inputs.get("streamEnabled") == Some(&Value::Bool(true)) {
                    out.push((
                        "streamArn",
                        arn("dynamodb", &format!("table/{}/stream/local", name)),
                    ));
                }
                out
            }
            types::BUCKET => vec![
                ("arn", format!("arn:aws:s3:::{}", name)),
                ("bucket", name.to_string()),
                ("bucketDomainName", format!("{}.s3.amazonaws.com", name)),
            ],
            types::API => {
                let id = short_id(name);
                vec![
                    (
                        "apiEndpoint",
                        format!("https://{}.execute-api.{}.amazonaws.com", id, region),
                    ),
                    ("executionArn", arn("execute-api", &id)),
                    ("id", id),
                ]
            }
            types::TOPIC => vec![("arn", arn("sns", name)), ("name", name.to_string())],
            types::PARAMETER => {
                let path = inputs
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(name)
                    .trim_start_matches('/')
                    .to_string();
                vec![
                    ("arn", arn("ssm", &format!("parameter/{}", path))),
                    ("name", format!("/{}", path)),
                ]
            }
            types::EVENT_SOURCE_MAPPING => vec![("uuid", short_id(name))],
            _ => Vec::new(),
        }
    }
}

/// Stable 10-char identifier derived from a name.
fn short_id(name: &str) -> String {
    blake3::hash(name.as_bytes()).to_hex().as_str()[..10].to_string()
}

#[async_trait]
impl ResourceProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports(&self, resource_type: &str) -> bool {
        types::ALL.contains(&resource_type)
    }

    async fn create(&self, request: CreateRequest<'_>) -> Result<LiveObject, String> {
        let call = CreateCall {
            name: request.name.to_string(),
            resource_type: request.resource_type.to_string(),
            depends_on: request.depends_on.iter().map(|o| o.name.clone()).collect(),
        };
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }

        if let Some(message) = self.failures.get(request.name) {
            return Err(message.clone());
        }

        let mut fields = request.inputs.clone();
        fields.insert("id".to_string(), Value::String(request.name.to_string()));
        for (key, value) in self.outputs(request.name, request.resource_type, request.inputs) {
            fields.insert(key.to_string(), Value::String(value));
        }
        Ok(LiveObject {
            name: request.name.to_string(),
            resource_type: request.resource_type.to_string(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create(p: &MemoryProvider, name: &str, resource_type: &str) -> LiveObject {
        let inputs = IndexMap::new();
        p.create(CreateRequest {
            name,
            resource_type,
            inputs: &inputs,
            depends_on: &[],
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_cr031_queue_outputs() {
        let p = MemoryProvider::new("eu-west-1");
        let q = create(&p, "work-queue-queue", types::QUEUE).await;
        assert_eq!(
            q.field("url").and_then(Value::as_str),
            Some("https://sqs.eu-west-1.amazonaws.com/000000000000/work-queue-queue")
        );
        assert_eq!(
            q.field("arn").and_then(Value::as_str),
            Some("arn:aws:sqs:eu-west-1:000000000000:work-queue-queue")
        );
        assert_eq!(q.field("id").and_then(Value::as_str), Some("work-queue-queue"));
    }

    #[tokio::test]
    async fn test_cr031_api_ids_deterministic() {
        let a = create(&MemoryProvider::new("us-east-1"), "api-gw-api", types::API).await;
        let b = create(&MemoryProvider::new("us-east-1"), "api-gw-api", types::API).await;
        assert_eq!(a, b);
        let id = a.field("id").and_then(Value::as_str).unwrap();
        assert_eq!(id.len(), 10);
        assert!(a
            .field("apiEndpoint")
            .and_then(Value::as_str)
            .unwrap()
            .starts_with(&format!("https://{}.execute-api", id)));
    }

    #[tokio::test]
    async fn test_cr031_inputs_echoed() {
        let p = MemoryProvider::new("us-east-1");
        let mut inputs = IndexMap::new();
        inputs.insert("runtime".to_string(), Value::String("nodejs20.x".to_string()));
        let f = p
            .create(CreateRequest {
                name: "h-function",
                resource_type: types::FUNCTION,
                inputs: &inputs,
                depends_on: &[],
            })
            .await
            .unwrap();
        assert_eq!(f.field("runtime").and_then(Value::as_str), Some("nodejs20.x"));
        assert!(f.field("invokeArn").is_some());
    }

    #[tokio::test]
    async fn test_cr031_failure_injection_and_calls() {
        let p = MemoryProvider::new("us-east-1").fail_on("bad-queue", "QueueAlreadyExists");
        let inputs = IndexMap::new();
        let err = p
            .create(CreateRequest {
                name: "bad-queue",
                resource_type: types::QUEUE,
                inputs: &inputs,
                depends_on: &[],
            })
            .await
            .unwrap_err();
        assert_eq!(err, "QueueAlreadyExists");
        assert_eq!(p.calls().len(), 1);
        assert!(p.supports(types::TOPIC));
        assert!(!p.supports("aws:ec2/instance:Instance"));
    }
}
