//! Bounded-retry polling driven by a declarative acceptor list.
//!
//! A [`WaiterConfig`] describes how often to poll, how many times, and which
//! field values in the polled response mean success or failure. [`wait`] runs
//! the query until an [`Acceptor`] matches or the attempt budget runs out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Outcome an acceptor produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Success,
    Failure,
}

/// How the values found at an acceptor's path are compared to its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Every value at the path equals the expected value (and there is at least one).
    PathAll,
    /// At least one value at the path equals the expected value.
    PathAny,
}

/// One rule of a waiter's match list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptor {
    pub state: AcceptorState,
    pub matcher: Matcher,
    /// Dot-separated field path; a `[]` suffix flattens an array, e.g. `volumes[].state`.
    pub argument: String,
    pub expected: String,
}

impl Acceptor {
    pub fn success(matcher: Matcher, argument: &str, expected: &str) -> Self {
        Self {
            state: AcceptorState::Success,
            matcher,
            argument: argument.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn failure(matcher: Matcher, argument: &str, expected: &str) -> Self {
        Self {
            state: AcceptorState::Failure,
            matcher,
            argument: argument.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Returns true when this acceptor matches the given response document.
    pub fn matches(&self, response: &Value) -> bool {
        let values = resolve_path(response, &self.argument);
        match self.matcher {
            Matcher::PathAll => {
                !values.is_empty() && values.iter().all(|v| value_equals(v, &self.expected))
            }
            Matcher::PathAny => values.iter().any(|v| value_equals(v, &self.expected)),
        }
    }
}

/// Declarative description of one wait.
#[derive(Debug, Clone)]
pub struct WaiterConfig {
    /// Name of the polled operation, used in errors and logs.
    pub operation: String,
    pub delay: Duration,
    pub max_attempts: u32,
    pub acceptors: Vec<Acceptor>,
}

impl WaiterConfig {
    /// Waits for every conversion task to reach `completed`; `cancelled` or
    /// `cancelling` on any task ends the wait with a failure.
    pub fn conversion_task_completed(delay: Duration, max_attempts: u32) -> Self {
        let path = "conversionTasks[].state";
        Self {
            operation: "DescribeConversionTasks".to_string(),
            delay,
            max_attempts,
            acceptors: vec![
                Acceptor::success(Matcher::PathAll, path, "completed"),
                Acceptor::failure(Matcher::PathAny, path, "cancelled"),
                Acceptor::failure(Matcher::PathAny, path, "cancelling"),
            ],
        }
    }

    /// Waits for every volume to reach `available`; `deleted` or `error` fails.
    pub fn volume_available(delay: Duration, max_attempts: u32) -> Self {
        let path = "volumes[].state";
        Self {
            operation: "DescribeVolumes".to_string(),
            delay,
            max_attempts,
            acceptors: vec![
                Acceptor::success(Matcher::PathAll, path, "available"),
                Acceptor::failure(Matcher::PathAny, path, "deleted"),
                Acceptor::failure(Matcher::PathAny, path, "error"),
            ],
        }
    }

    fn validate(&self) -> Result<(), WaitError> {
        if self.max_attempts == 0 {
            return Err(WaitError::InvalidConfig(format!(
                "{}: max_attempts must be at least 1",
                self.operation
            )));
        }
        if self.acceptors.is_empty() {
            return Err(WaitError::InvalidConfig(format!(
                "{}: at least one acceptor is required",
                self.operation
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    /// A failure acceptor matched; the resource reached a terminal bad state.
    #[error("{operation} reached failure state: {argument} == {state:?}")]
    Failure {
        operation: String,
        argument: String,
        state: String,
    },

    #[error(
        "{operation} did not reach a terminal state after {attempts} attempts ({elapsed:?}){}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        last_error: Option<String>,
    },

    #[error("invalid waiter config: {0}")]
    InvalidConfig(String),

    #[error("serializing {operation} response: {source}")]
    Response {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(", last error: {e}"))
        .unwrap_or_default()
}

/// Polls `query` until an acceptor in `config` matches or attempts run out.
///
/// Sleeps `config.delay` between attempts, never before the first or after the
/// last. Query errors are treated as transient.
pub async fn wait<F, Fut, T, E>(mut query: F, config: &WaiterConfig) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: Display,
{
    config.validate()?;

    let started = Instant::now();
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            sleep(config.delay).await;
        }

        let response = match query().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    operation = %config.operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    "poll failed: {e}"
                );
                last_error = Some(e.to_string());
                continue;
            }
        };

        let document = serde_json::to_value(&response).map_err(|source| WaitError::Response {
            operation: config.operation.clone(),
            source,
        })?;

        match evaluate(&config.acceptors, &document) {
            Some(acceptor) if acceptor.state == AcceptorState::Success => {
                debug!(operation = %config.operation, attempt, "success acceptor matched");
                return Ok(());
            }
            Some(acceptor) => {
                return Err(WaitError::Failure {
                    operation: config.operation.clone(),
                    argument: acceptor.argument.clone(),
                    state: acceptor.expected.clone(),
                });
            }
            None => {
                debug!(operation = %config.operation, attempt, "no acceptor matched");
            }
        }
    }

    Err(WaitError::Timeout {
        operation: config.operation.clone(),
        attempts: config.max_attempts,
        elapsed: started.elapsed(),
        last_error,
    })
}

/// Returns the first acceptor matching the document, in list order.
fn evaluate<'a>(acceptors: &'a [Acceptor], document: &Value) -> Option<&'a Acceptor> {
    acceptors.iter().find(|a| a.matches(document))
}

fn resolve_path<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];

    for segment in path.split('.') {
        let (field, flatten) = match segment.strip_suffix("[]") {
            Some(field) => (field, true),
            None => (segment, false),
        };

        let mut next = Vec::new();
        for value in current {
            let value = if field.is_empty() {
                Some(value)
            } else {
                value.get(field)
            };
            match value {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) if flatten => next.extend(items.iter()),
                Some(_) if flatten => {}
                Some(v) => next.push(v),
            }
        }
        current = next;
    }

    current
}

fn value_equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Null | Value::Array(_) | Value::Object(_) => false,
        other => other.to_string() == expected,
    }
}
