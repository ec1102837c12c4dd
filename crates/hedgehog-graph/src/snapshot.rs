//! Snapshot orchestration: fetch, traverse, render.

use hedgehog_dap::{
    DebugSession, DebugVariable, SessionAdapter, SnapshotError, SnapshotResult, SnapshotTracker,
    TrackerAction, DEFAULT_SCOPE_NAME,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::HedgehogConfig;
use crate::render::{render, Document};
use crate::traversal::{traverse, GRAPH_NODE_LIMIT};

/// One finished build. Either complete or not produced at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub scope_name: String,
    pub document: Document,
    pub truncated: bool,
    pub node_count: usize,
}

impl Snapshot {
    /// Warning text for a build that stopped at the node limit.
    pub fn truncation_notice(&self) -> Option<String> {
        self.truncated.then(|| {
            format!(
                "snapshot of '{}' truncated after {GRAPH_NODE_LIMIT} nodes",
                self.scope_name
            )
        })
    }
}

/// Pauses the debuggee, walks its preferred scope and renders the result.
///
/// The tracker stays suppressed for the whole build so the `variables`
/// responses this triggers do not schedule rebuilds of their own.
pub async fn take_snapshot(
    session: Option<&dyn DebugSession>,
    tracker: &SnapshotTracker,
    config: &HedgehogConfig,
) -> SnapshotResult<Snapshot> {
    let session = session.ok_or(SnapshotError::NoActiveSession)?;
    let _suppressed = tracker.suppression().enter();
    let adapter = SessionAdapter::new(session, tracker.generation().clone());

    info!("Pausing debugger...");
    let top = adapter.fetch_top_level_variables().await?;
    info!("Building deep graph...");
    build(&adapter, &top.scope_name, top.variables, config).await
}

/// Rebuild triggered by an observed `variables` response.
pub async fn rebuild_from_variables(
    session: &dyn DebugSession,
    tracker: &SnapshotTracker,
    variables: Vec<DebugVariable>,
    config: &HedgehogConfig,
) -> SnapshotResult<Snapshot> {
    let _suppressed = tracker.suppression().enter();
    let adapter = SessionAdapter::new(session, tracker.generation().clone());
    build(&adapter, DEFAULT_SCOPE_NAME, variables, config).await
}

/// Feeds one observed adapter message to the tracker, rebuilding when it asks.
pub async fn handle_message(
    session: &dyn DebugSession,
    tracker: &SnapshotTracker,
    message: &Value,
    config: &HedgehogConfig,
) -> Option<SnapshotResult<Snapshot>> {
    match tracker.on_message(message) {
        TrackerAction::Ignore => None,
        TrackerAction::Rebuild(variables) => {
            Some(rebuild_from_variables(session, tracker, variables, config).await)
        }
    }
}

async fn build(
    adapter: &SessionAdapter<'_>,
    scope_name: &str,
    variables: Vec<DebugVariable>,
    config: &HedgehogConfig,
) -> SnapshotResult<Snapshot> {
    let options = config.graph_options();
    let tree = traverse(adapter, scope_name, variables, &options, &config.policy).await?;
    let document = render(&tree, &options);
    debug!(
        mode = %options.visualization_mode,
        nodes = tree.len(),
        truncated = tree.truncated,
        "snapshot rendered"
    );
    Ok(Snapshot {
        scope_name: scope_name.to_string(),
        document,
        truncated: tree.truncated,
        node_count: tree.len(),
    })
}
