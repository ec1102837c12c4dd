//! Protocol session adapter.
//! - DebugSession: request/response seam over an established session
//! - SessionAdapter: threads, pause, top frame, scopes, variables, memory
//! - fetch_top_level_variables: thread -> pause -> frame -> scope -> variables

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ReferenceKind, RequestError, SnapshotError, SnapshotResult};
use crate::handle::{DebugVariable, MemoryRef, StopGeneration, VariablesRef};
use crate::memory::{decode_data, hex_dump, MemoryInfo, MAX_MEMORY_READ_SIZE};
use crate::protocol::{
    PauseArguments, ReadMemoryArguments, ReadMemoryResponseBody, Scope, ScopesArguments,
    ScopesResponseBody, StackFrame, StackTraceArguments, StackTraceResponseBody, Thread,
    ThreadsResponseBody, VariablesArguments, VariablesResponseBody,
};

/// Stack-trace polls issued before giving up on a paused frame.
pub const STACKTRACE_RETRIES: u32 = 20;
/// Fixed delay after each unsuccessful stack-trace poll.
pub const STACKTRACE_DELAY: Duration = Duration::from_millis(100);
/// Scope name used when the adapter reports an unnamed scope.
pub const DEFAULT_SCOPE_NAME: &str = "Locals";

static TOLERATED_PAUSE_FAILURE: Lazy<Regex> =
    Lazy::new(|| Regex::new("(?i)pause|stopp|running|already").expect("pause pattern"));

/// An established debug session that answers protocol requests.
///
/// The session owns its transport; callers only issue requests and await the
/// response body.
#[async_trait]
pub trait DebugSession: Send + Sync {
    async fn custom_request(&self, command: &str, arguments: Value) -> Result<Value, RequestError>;
}

/// Top-level variables of the preferred scope of the top frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelVariables {
    pub scope_name: String,
    pub variables: Vec<DebugVariable>,
}

/// Picks the thread whose name mentions "main", else the first reported one.
pub fn select_primary_thread(threads: &[Thread]) -> Option<&Thread> {
    threads
        .iter()
        .find(|thread| thread.name.to_lowercase().contains("main"))
        .or_else(|| threads.first())
}

/// Typed protocol operations against one session.
pub struct SessionAdapter<'s> {
    session: &'s dyn DebugSession,
    generation: StopGeneration,
}

impl<'s> SessionAdapter<'s> {
    pub fn new(session: &'s dyn DebugSession, generation: StopGeneration) -> Self {
        Self {
            session,
            generation,
        }
    }

    pub fn generation(&self) -> &StopGeneration {
        &self.generation
    }

    async fn call<A, B>(&self, command: &str, arguments: &A) -> Result<B, RequestError>
    where
        A: Serialize + Sync,
        B: DeserializeOwned + Default,
    {
        let arguments =
            serde_json::to_value(arguments).map_err(|err| RequestError::new(err.to_string()))?;
        debug!(command, %arguments, "dap request");
        let body = self.session.custom_request(command, arguments).await?;
        Ok(decode_body(command, body))
    }

    pub async fn list_threads(&self) -> SnapshotResult<Vec<Thread>> {
        let body: ThreadsResponseBody = self
            .call("threads", &Value::Null)
            .await
            .map_err(|err| SnapshotError::request("threads", err))?;
        if body.threads.is_empty() {
            return Err(SnapshotError::NoThreads);
        }
        Ok(body.threads)
    }

    /// Requests a pause. Failures that read like "already stopped" are not errors.
    pub async fn pause(&self, thread_id: i64) -> SnapshotResult<()> {
        let result: Result<Value, _> = self.call("pause", &PauseArguments { thread_id }).await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if TOLERATED_PAUSE_FAILURE.is_match(&err.message) => {
                debug!(thread_id, error = %err, "pause refused, treating thread as stopped");
                Ok(())
            }
            Err(err) => Err(SnapshotError::PauseFailed(err.message)),
        }
    }

    /// Polls a one-level stack trace until the thread reports a frame.
    pub async fn await_top_frame(&self, thread_id: i64) -> SnapshotResult<StackFrame> {
        let arguments = StackTraceArguments {
            thread_id,
            start_frame: Some(0),
            levels: Some(1),
        };
        for attempt in 1..=STACKTRACE_RETRIES {
            match self
                .call::<_, StackTraceResponseBody>("stackTrace", &arguments)
                .await
            {
                Ok(body) => {
                    if let Some(frame) = body.stack_frames.into_iter().next() {
                        return Ok(frame);
                    }
                    debug!(thread_id, attempt, "stack trace empty");
                }
                Err(err) => debug!(thread_id, attempt, error = %err, "stack trace failed"),
            }
            tokio::time::sleep(STACKTRACE_DELAY).await;
        }
        Err(SnapshotError::NoStackFrames)
    }

    pub async fn resolve_preferred_scope(&self, frame_id: i64) -> SnapshotResult<Scope> {
        let body: ScopesResponseBody = self
            .call("scopes", &ScopesArguments { frame_id })
            .await
            .map_err(|err| SnapshotError::request("scopes", err))?;
        let mut scopes = body.scopes;
        if scopes.is_empty() {
            return Err(SnapshotError::NoScopes);
        }
        let preferred = scopes
            .iter()
            .position(|scope| scope.presentation_hint.as_deref() == Some("locals"))
            .unwrap_or(0);
        Ok(scopes.swap_remove(preferred))
    }

    /// Children of a container, in protocol order.
    pub async fn expand_variable(
        &self,
        reference: VariablesRef,
    ) -> SnapshotResult<Vec<DebugVariable>> {
        self.generation.check(
            ReferenceKind::Variables,
            reference.id().to_string(),
            reference.generation(),
        )?;
        let arguments = VariablesArguments {
            variables_reference: reference.id(),
        };
        let body: VariablesResponseBody = self
            .call("variables", &arguments)
            .await
            .map_err(|err| SnapshotError::request("variables", err))?;
        let generation = self.generation.current();
        Ok(body
            .variables
            .into_iter()
            .map(|variable| DebugVariable::from_protocol(variable, generation))
            .collect())
    }

    /// Best-effort memory read. Only a stale handle is an error.
    pub async fn read_memory(
        &self,
        reference: &MemoryRef,
        size: usize,
        offset: i64,
    ) -> SnapshotResult<Option<MemoryInfo>> {
        self.generation.check(
            ReferenceKind::Memory,
            reference.as_str().to_string(),
            reference.generation(),
        )?;
        let arguments = ReadMemoryArguments {
            memory_reference: reference.as_str().to_string(),
            offset,
            count: size.clamp(1, MAX_MEMORY_READ_SIZE),
        };
        let body: ReadMemoryResponseBody = match self.call("readMemory", &arguments).await {
            Ok(body) => body,
            Err(err) => {
                warn!(reference = reference.as_str(), error = %err, "readMemory failed");
                return Ok(None);
            }
        };
        let Some(address) = body.address.filter(|address| !address.is_empty()) else {
            return Ok(None);
        };
        let bytes = match body.data.as_deref().map(decode_data) {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                warn!(reference = reference.as_str(), error = %err, "readMemory returned invalid data");
                Vec::new()
            }
            None => Vec::new(),
        };
        Ok(Some(MemoryInfo {
            address,
            offset,
            size: bytes.len(),
            raw_bytes: hex_dump(&bytes),
        }))
    }

    /// Thread -> pause -> top frame -> preferred scope -> its variables.
    pub async fn fetch_top_level_variables(&self) -> SnapshotResult<TopLevelVariables> {
        let threads = self.list_threads().await?;
        let thread_id = select_primary_thread(&threads)
            .map(|thread| thread.id)
            .ok_or(SnapshotError::NoThreads)?;
        self.pause(thread_id).await?;
        let frame = self.await_top_frame(thread_id).await?;
        let scope = self.resolve_preferred_scope(frame.id).await?;
        let variables =
            match VariablesRef::new(scope.variables_reference, self.generation.current()) {
                Some(reference) => self.expand_variable(reference).await?,
                None => Vec::new(),
            };
        let scope_name = if scope.name.is_empty() {
            DEFAULT_SCOPE_NAME.to_string()
        } else {
            scope.name
        };
        Ok(TopLevelVariables {
            scope_name,
            variables,
        })
    }
}

fn decode_body<B: DeserializeOwned + Default>(command: &str, body: Value) -> B {
    if body.is_null() {
        return B::default();
    }
    serde_json::from_value(body).unwrap_or_else(|err| {
        warn!(command, error = %err, "unexpected response body shape");
        B::default()
    })
}

#[cfg(test)]
mod tests;
