//! Debug Adapter Protocol helpers for snapshotting a paused debuggee.

mod error;
mod handle;
mod memory;
mod protocol;
mod replay;
mod session;
mod tracker;

pub use error::{ReferenceKind, RequestError, SnapshotError, SnapshotResult};
pub use handle::{DebugVariable, MemoryRef, StopGeneration, VariablesRef};
pub use memory::{
    clamp_memory_read_size, decode_data, hex_dump, MemoryCache, MemoryInfo,
    DEFAULT_MEMORY_READ_SIZE, HEX_DUMP_ROW, MAX_MEMORY_READ_SIZE,
};
pub use protocol::{
    ContinuedEventBody, Event, MessageType, PauseArguments, ReadMemoryArguments,
    ReadMemoryResponseBody, Request, Response, Scope, ScopesArguments, ScopesResponseBody,
    StackFrame, StackTraceArguments, StackTraceResponseBody, Thread, ThreadsResponseBody,
    Variable, VariablesArguments, VariablesResponseBody,
};
pub use replay::{RecordedRequest, ReplaySession, Transcript};
pub use session::{
    select_primary_thread, DebugSession, SessionAdapter, TopLevelVariables, DEFAULT_SCOPE_NAME,
    STACKTRACE_DELAY, STACKTRACE_RETRIES,
};
pub use tracker::{
    classify, InboundMessage, SnapshotTracker, Suppression, SuppressionToken, TrackerAction,
};
