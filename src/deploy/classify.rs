//! CR-041: Deployment error classification.
//!
//! An ordered regex table over the failure message; the first match wins and
//! anything unmatched is treated as a transient dependency failure.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    AwsCredentials,
    StackConflict,
    Timeout,
    PulumiRuntime,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwsCredentials => write!(f, "aws-credentials"),
            Self::StackConflict => write!(f, "stack-conflict"),
            Self::Timeout => write!(f, "timeout"),
            Self::PulumiRuntime => write!(f, "pulumi-runtime"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AwsCredentials,
    StackConflict,
    Timeout,
    RateLimited,
    PulumiRuntime,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriableReason {
    UpstreamTimeout,
    RateLimit,
    DependencyUnavailable,
}

impl fmt::Display for RetriableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamTimeout => write!(f, "upstream_timeout"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::DependencyUnavailable => write!(f, "dependency_unavailable"),
        }
    }
}

/// A classified deployment failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retriable_reason: Option<RetriableReason>,
    pub message: String,
    /// Debug rendering of the underlying error, when there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

/// Whatever a failed operation produced.
#[derive(Debug)]
pub enum Failure {
    /// A real error value
    Error(Box<dyn std::error::Error + Send + Sync>),
    /// A non-error rejection payload
    Value(String),
}

impl Failure {
    pub fn error(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Error(Box::new(e))
    }
}

struct Rule {
    pattern: Regex,
    code: ErrorCode,
    category: ErrorCategory,
    retryable: bool,
    reason: Option<RetriableReason>,
}

const RULE_SPECS: &[(&str, ErrorCode, ErrorCategory, bool, Option<RetriableReason>)] = &[
    (
        r"(?i)expiredtoken|token (has )?expired|security token included in the request is (invalid|expired)|invalidclienttokenid|unrecognizedclient|no valid credential|unable to locate credentials|could not load credentials|credentials? (are |is )?(missing|invalid|expired)",
        ErrorCode::AwsCredentials,
        ErrorCategory::AwsCredentials,
        false,
        None,
    ),
    (
        r"(?i)conflict|already being updated|currently being updated|another update is (currently )?in progress|concurrent update|stack is locked",
        ErrorCode::StackConflict,
        ErrorCategory::StackConflict,
        false,
        None,
    ),
    (
        r"(?i)timed out|timeout|etimedout",
        ErrorCode::Timeout,
        ErrorCategory::Timeout,
        true,
        Some(RetriableReason::UpstreamTimeout),
    ),
    (
        r"(?i)rate.?limit|throttl|too many requests|\b429\b|slow ?down",
        ErrorCode::RateLimited,
        ErrorCategory::Unknown,
        true,
        Some(RetriableReason::RateLimit),
    ),
    (
        r"(?i)pulumi|plugin|language (host|runtime)|resource monitor|failed to load",
        ErrorCode::PulumiRuntime,
        ErrorCategory::PulumiRuntime,
        false,
        None,
    ),
];

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_SPECS
        .iter()
        .filter_map(|(pattern, code, category, retryable, reason)| {
            Regex::new(pattern).ok().map(|pattern| Rule {
                pattern,
                code: *code,
                category: *category,
                retryable: *retryable,
                reason: *reason,
            })
        })
        .collect()
});

/// Classify a failure with the first matching rule.
pub fn classify_error(failure: &Failure) -> ClassifiedError {
    let err = match failure {
        Failure::Value(v) => {
            return ClassifiedError {
                code: ErrorCode::Unknown,
                category: ErrorCategory::Unknown,
                retryable: false,
                retriable_reason: None,
                message: v.clone(),
                original: None,
            }
        }
        Failure::Error(e) => e,
    };

    let message = err.to_string();
    let original = Some(format!("{:?}", err));
    for rule in RULES.iter() {
        if rule.pattern.is_match(&message) {
            return ClassifiedError {
                code: rule.code,
                category: rule.category,
                retryable: rule.retryable,
                retriable_reason: rule.reason,
                message,
                original,
            };
        }
    }
    ClassifiedError {
        code: ErrorCode::Unknown,
        category: ErrorCategory::Unknown,
        retryable: true,
        retriable_reason: Some(RetriableReason::DependencyUnavailable),
        message,
        original,
    }
}
