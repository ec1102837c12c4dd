//! Fixture-backed session that replays a recorded stop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RequestError;
use crate::protocol::{ReadMemoryResponseBody, Scope, StackFrame, Thread, Variable};
use crate::session::DebugSession;

/// Recorded answers for one stop of a debuggee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
    /// Number of `stackTrace` polls answered with no frames before the frames appear.
    #[serde(default)]
    pub empty_stack_polls: usize,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    /// Children keyed by `variablesReference`.
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<Variable>>,
    /// `readMemory` bodies keyed by `memoryReference`.
    #[serde(default)]
    pub memory: BTreeMap<String, ReadMemoryResponseBody>,
    /// Error messages keyed by `command` or `command/argument`.
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
}

impl Transcript {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// One request received by a [`ReplaySession`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub command: String,
    pub arguments: Value,
}

#[derive(Debug)]
pub struct ReplaySession {
    transcript: Transcript,
    stack_polls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ReplaySession {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            stack_polls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.command == command)
            .count()
    }

    fn failure(&self, command: &str, key: Option<String>) -> Option<RequestError> {
        key.and_then(|key| self.transcript.failures.get(&format!("{command}/{key}")))
            .or_else(|| self.transcript.failures.get(command))
            .map(|message| RequestError::new(message.clone()))
    }

    fn answer(&self, command: &str, arguments: &Value) -> Result<Value, RequestError> {
        match command {
            "threads" => Ok(json!({ "threads": self.transcript.threads })),
            "pause" => Ok(Value::Null),
            "stackTrace" => {
                let poll = self.stack_polls.fetch_add(1, Ordering::SeqCst);
                let frames = if poll < self.transcript.empty_stack_polls {
                    Vec::new()
                } else {
                    self.transcript.stack_frames.iter().take(1).cloned().collect()
                };
                Ok(json!({ "stackFrames": frames }))
            }
            "scopes" => Ok(json!({ "scopes": self.transcript.scopes })),
            "variables" => {
                let key = argument_key(arguments, "variablesReference").unwrap_or_default();
                let variables = self
                    .transcript
                    .variables
                    .get(&key)
                    .cloned()
                    .unwrap_or_default();
                Ok(json!({ "variables": variables }))
            }
            "readMemory" => {
                let key = argument_key(arguments, "memoryReference").unwrap_or_default();
                let Some(body) = self.transcript.memory.get(&key) else {
                    return Err(RequestError::new(format!("unknown memory reference '{key}'")));
                };
                serde_json::to_value(body).map_err(|err| RequestError::new(err.to_string()))
            }
            other => Err(RequestError::new(format!("unsupported request '{other}'"))),
        }
    }
}

fn argument_key(arguments: &Value, field: &str) -> Option<String> {
    match arguments.get(field)? {
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl DebugSession for ReplaySession {
    async fn custom_request(&self, command: &str, arguments: Value) -> Result<Value, RequestError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                command: command.to_string(),
                arguments: arguments.clone(),
            });
        // Yield like a real round-trip so concurrent callers interleave.
        tokio::task::yield_now().await;

        let key = match command {
            "variables" => argument_key(&arguments, "variablesReference"),
            "readMemory" => argument_key(&arguments, "memoryReference"),
            "pause" | "stackTrace" => argument_key(&arguments, "threadId"),
            "scopes" => argument_key(&arguments, "frameId"),
            _ => None,
        };
        if let Some(err) = self.failure(command, key) {
            return Err(err);
        }
        self.answer(command, &arguments)
    }
}
