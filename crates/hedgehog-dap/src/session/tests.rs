//! Session adapter unit tests.
//! - thread selection and pause tolerance
//! - stack-trace retry budget and timing
//! - scope preference, generation checks, memory reads

use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::memory::MemoryCache;
use crate::replay::{ReplaySession, Transcript};

fn transcript(value: Value) -> Transcript {
    serde_json::from_value(value).unwrap()
}

fn stopped_program() -> Transcript {
    transcript(json!({
        "threads": [
            { "id": 3, "name": "worker" },
            { "id": 1, "name": "MainThread" }
        ],
        "stackFrames": [ { "id": 100, "name": "main" } ],
        "scopes": [
            { "name": "Globals", "variablesReference": 2 },
            { "name": "Locals", "presentationHint": "locals", "variablesReference": 1 }
        ],
        "variables": {
            "1": [
                { "name": "x", "value": "5", "type": "int", "variablesReference": 0 },
                { "name": "p", "value": "0x7ffd", "type": "int *", "variablesReference": 7, "memoryReference": "0x7ffd" }
            ],
            "2": [ { "name": "g", "value": "1", "variablesReference": 0 } ]
        },
        "memory": {
            "0x7ffd": { "address": "0x7ffd0000", "data": "AAECAwQFBgcICQ==" }
        }
    }))
}

#[test]
fn select_primary_thread_prefers_main_case_insensitively() {
    let threads = vec![
        Thread {
            id: 4,
            name: "io".into(),
        },
        Thread {
            id: 9,
            name: "tokio-MAIN-worker".into(),
        },
    ];
    assert_eq!(select_primary_thread(&threads).map(|t| t.id), Some(9));

    let unnamed = vec![
        Thread {
            id: 2,
            name: String::new(),
        },
        Thread {
            id: 5,
            name: "render".into(),
        },
    ];
    assert_eq!(select_primary_thread(&unnamed).map(|t| t.id), Some(2));
    assert!(select_primary_thread(&[]).is_none());
}

#[tokio::test]
async fn list_threads_rejects_empty_thread_list() {
    let session = ReplaySession::new(Transcript::default());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    assert_eq!(adapter.list_threads().await, Err(SnapshotError::NoThreads));
}

#[tokio::test]
async fn pause_tolerates_already_stopped_messages() {
    for message in [
        "Thread is already stopped",
        "cannot PAUSE now",
        "Process is not running",
        "target stopped",
    ] {
        let session = ReplaySession::new(transcript(json!({ "failures": { "pause": message } })));
        let adapter = SessionAdapter::new(&session, StopGeneration::new());
        assert_eq!(adapter.pause(1).await, Ok(()), "{message}");
    }

    let session = ReplaySession::new(transcript(json!({ "failures": { "pause": "connection reset" } })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    assert_eq!(
        adapter.pause(1).await,
        Err(SnapshotError::PauseFailed("connection reset".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn await_top_frame_gives_up_after_twenty_polls() {
    let session = ReplaySession::new(transcript(json!({
        "threads": [ { "id": 1, "name": "main" } ]
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());

    let started = Instant::now();
    let result = adapter.await_top_frame(1).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(SnapshotError::NoStackFrames));
    assert_eq!(session.count("stackTrace"), 20);
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn await_top_frame_returns_first_frame_once_stopped() {
    let mut recorded = stopped_program();
    recorded.empty_stack_polls = 3;
    let session = ReplaySession::new(recorded);
    let adapter = SessionAdapter::new(&session, StopGeneration::new());

    let frame = adapter.await_top_frame(1).await.unwrap();
    assert_eq!(frame.id, 100);
    assert_eq!(session.count("stackTrace"), 4);

    let request = &session.requests()[0];
    assert_eq!(
        request.arguments,
        json!({ "threadId": 1, "startFrame": 0, "levels": 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn await_top_frame_retries_through_request_errors() {
    let session = ReplaySession::new(transcript(json!({
        "failures": { "stackTrace": "thread is running" }
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    assert_eq!(adapter.await_top_frame(1).await, Err(SnapshotError::NoStackFrames));
    assert_eq!(session.count("stackTrace"), 20);
}

#[tokio::test]
async fn resolve_preferred_scope_prefers_locals_hint() {
    let session = ReplaySession::new(stopped_program());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    let scope = adapter.resolve_preferred_scope(100).await.unwrap();
    assert_eq!(scope.name, "Locals");

    let session = ReplaySession::new(transcript(json!({
        "scopes": [ { "name": "Registers", "variablesReference": 4 }, { "name": "Statics", "variablesReference": 5 } ]
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    assert_eq!(adapter.resolve_preferred_scope(1).await.unwrap().name, "Registers");

    let session = ReplaySession::new(Transcript::default());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    assert_eq!(adapter.resolve_preferred_scope(1).await, Err(SnapshotError::NoScopes));
}

#[tokio::test]
async fn fetch_top_level_variables_walks_thread_frame_and_scope() {
    let session = ReplaySession::new(stopped_program());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());

    let top = adapter.fetch_top_level_variables().await.unwrap();
    assert_eq!(top.scope_name, "Locals");
    assert_eq!(
        top.variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["x", "p"]
    );
    assert_eq!(
        top.variables[1].variables_reference.map(VariablesRef::id),
        Some(7)
    );

    let commands = session
        .requests()
        .into_iter()
        .map(|request| request.command)
        .collect::<Vec<_>>();
    assert_eq!(commands, ["threads", "pause", "stackTrace", "scopes", "variables"]);
    assert_eq!(session.requests()[1].arguments, json!({ "threadId": 1 }));
}

#[tokio::test]
async fn fetch_top_level_variables_names_unnamed_scope_locals() {
    let session = ReplaySession::new(transcript(json!({
        "threads": [ { "id": 1 } ],
        "stackFrames": [ { "id": 1 } ],
        "scopes": [ { "variablesReference": 0 } ]
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    let top = adapter.fetch_top_level_variables().await.unwrap();
    assert_eq!(top.scope_name, "Locals");
    assert!(top.variables.is_empty());
    assert_eq!(session.count("variables"), 0);
}

#[tokio::test]
async fn expand_variable_rejects_references_from_an_earlier_stop() {
    let session = ReplaySession::new(stopped_program());
    let generation = StopGeneration::new();
    let adapter = SessionAdapter::new(&session, generation.clone());

    let reference = VariablesRef::new(7, generation.current()).unwrap();
    generation.advance();
    let err = adapter.expand_variable(reference).await.unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::StaleReference {
            kind: ReferenceKind::Variables,
            issued: 0,
            current: 1,
            ..
        }
    ));
    assert_eq!(session.count("variables"), 0);
}

#[tokio::test]
async fn expand_variable_surfaces_request_failures() {
    let session = ReplaySession::new(transcript(json!({
        "failures": { "variables/7": "invalid reference" }
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    let reference = VariablesRef::new(7, 0).unwrap();
    assert_eq!(
        adapter.expand_variable(reference).await,
        Err(SnapshotError::Request {
            command: "variables".into(),
            message: "invalid reference".into(),
        })
    );
}

#[tokio::test]
async fn read_memory_decodes_payload_and_clamps_count() {
    let session = ReplaySession::new(stopped_program());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    let reference = MemoryRef::new("0x7ffd", 0).unwrap();

    let info = adapter.read_memory(&reference, 4096, 0).await.unwrap().unwrap();
    assert_eq!(info.address, "0x7ffd0000");
    assert_eq!(info.size, 10);
    assert_eq!(info.raw_bytes, "00 01 02 03 04 05 06 07\n08 09");
    assert_eq!(
        session.requests()[0].arguments,
        json!({ "memoryReference": "0x7ffd", "offset": 0, "count": 256 })
    );
}

#[tokio::test]
async fn read_memory_failures_are_not_errors() {
    let session = ReplaySession::new(transcript(json!({
        "memory": { "0x1": { "data": "AA==" } },
        "failures": { "readMemory/0x2": "unreadable" }
    })));
    let adapter = SessionAdapter::new(&session, StopGeneration::new());

    let missing_address = MemoryRef::new("0x1", 0).unwrap();
    assert_eq!(adapter.read_memory(&missing_address, 8, 0).await, Ok(None));
    let failing = MemoryRef::new("0x2", 0).unwrap();
    assert_eq!(adapter.read_memory(&failing, 8, 0).await, Ok(None));
}

#[tokio::test]
async fn memory_cache_issues_one_read_per_reference() {
    let session = ReplaySession::new(stopped_program());
    let adapter = SessionAdapter::new(&session, StopGeneration::new());
    let cache = MemoryCache::new(Some(16.0));
    let reference = MemoryRef::new("0x7ffd", 0).unwrap();

    let (first, second) = tokio::join!(
        cache.get(&adapter, &reference),
        cache.get(&adapter, &reference)
    );
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert!(first.is_some());

    let third = cache.get(&adapter, &reference).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(session.count("readMemory"), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(session.requests()[0].arguments["count"], json!(16));
}
