//! Passive listener over session traffic.
//! - classify: tag an inbound envelope by what it answers
//! - Suppression/SuppressionToken: scoped depth counter for self-issued traffic
//! - SnapshotTracker: decide when observed traffic warrants a rebuild

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::handle::{DebugVariable, StopGeneration};
use crate::protocol::{MessageType, Response, VariablesResponseBody};

/// Inbound protocol message, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Threads,
    Pause,
    StackTrace,
    Scopes,
    Variables {
        success: bool,
        body: VariablesResponseBody,
    },
    ReadMemory,
    /// The debuggee resumed; every issued reference is now invalid.
    Resumed,
    Other,
}

const RESUMING_COMMANDS: &[&str] = &[
    "continue",
    "next",
    "stepIn",
    "stepOut",
    "stepBack",
    "reverseContinue",
    "goto",
    "restartFrame",
];

pub fn classify(message: &Value) -> InboundMessage {
    let kind = message
        .get("type")
        .cloned()
        .and_then(|value| serde_json::from_value::<MessageType>(value).ok());
    match kind {
        Some(MessageType::Response) => classify_response(message),
        Some(MessageType::Event) => match message.get("event").and_then(Value::as_str) {
            Some("continued") => InboundMessage::Resumed,
            _ => InboundMessage::Other,
        },
        Some(MessageType::Request) | None => InboundMessage::Other,
    }
}

fn classify_response(message: &Value) -> InboundMessage {
    let Ok(response) = serde_json::from_value::<Response<Value>>(message.clone()) else {
        return InboundMessage::Other;
    };
    match response.command.as_str() {
        "threads" => InboundMessage::Threads,
        "pause" => InboundMessage::Pause,
        "stackTrace" => InboundMessage::StackTrace,
        "scopes" => InboundMessage::Scopes,
        "readMemory" => InboundMessage::ReadMemory,
        "variables" => {
            let body = response
                .body
                .and_then(|body| serde_json::from_value(body).ok())
                .unwrap_or_default();
            InboundMessage::Variables {
                success: response.success,
                body,
            }
        }
        command if response.success && RESUMING_COMMANDS.contains(&command) => {
            InboundMessage::Resumed
        }
        _ => InboundMessage::Other,
    }
}

/// Depth counter for builds in flight. Cloning shares the counter.
#[derive(Debug, Clone, Default)]
pub struct Suppression {
    depth: Arc<AtomicUsize>,
}

/// Keeps the suppression depth raised until dropped.
#[derive(Debug)]
#[must_use = "suppression ends when the token is dropped"]
pub struct SuppressionToken {
    depth: Arc<AtomicUsize>,
}

impl Suppression {
    pub fn enter(&self) -> SuppressionToken {
        self.depth.fetch_add(1, Ordering::SeqCst);
        SuppressionToken {
            depth: Arc::clone(&self.depth),
        }
    }

    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Drop for SuppressionToken {
    fn drop(&mut self) {
        let _ = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                Some(depth.saturating_sub(1))
            });
    }
}

/// What the caller should do with an observed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerAction {
    Ignore,
    Rebuild(Vec<DebugVariable>),
}

/// Watches one session's traffic.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
    suppression: Suppression,
    generation: StopGeneration,
}

impl SnapshotTracker {
    pub fn new(generation: StopGeneration) -> Self {
        Self {
            suppression: Suppression::default(),
            generation,
        }
    }

    pub fn suppression(&self) -> &Suppression {
        &self.suppression
    }

    pub fn generation(&self) -> &StopGeneration {
        &self.generation
    }

    pub fn on_message(&self, message: &Value) -> TrackerAction {
        match classify(message) {
            InboundMessage::Resumed => {
                let generation = self.generation.advance();
                debug!(generation, "debuggee resumed");
                TrackerAction::Ignore
            }
            InboundMessage::Variables {
                success: true,
                body,
            } if !self.suppression.is_active() => {
                let generation = self.generation.current();
                TrackerAction::Rebuild(
                    body.variables
                        .into_iter()
                        .map(|variable| DebugVariable::from_protocol(variable, generation))
                        .collect(),
                )
            }
            _ => TrackerAction::Ignore,
        }
    }
}
