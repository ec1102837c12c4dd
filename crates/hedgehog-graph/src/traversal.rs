//! Bounded depth-first walk over a stopped program's variables.
//!
//! The walk produces a [`VariableTree`] that both renderers project from, so
//! the node budget, cycle handling and the skip filter are decided once.

use std::collections::HashSet;

use hedgehog_dap::{
    DebugVariable, MemoryCache, MemoryInfo, SessionAdapter, SnapshotError, SnapshotResult,
    VariablesRef,
};
use tracing::{debug, warn};

use crate::config::{GraphOptions, VisualizationMode};
use crate::policy::{is_callable_type, VariablePolicy};
use crate::sanitize::extract_hex_address;

/// Variables visited per build before the walk stops.
pub const GRAPH_NODE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Visit order, starting at zero.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Scalar value.
    Leaf,
    /// Expandable by handle or type name. Children were fetched when
    /// `reference` is set.
    Container { reference: Option<VariablesRef> },
    /// Handle already expanded earlier in this walk.
    Circular { reference: VariablesRef },
    /// Expansion was attempted and failed.
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub variable: DebugVariable,
    pub kind: NodeKind,
    /// Best-known address, independent of whether addresses are shown.
    pub address: Option<String>,
    pub memory: Option<MemoryInfo>,
    pub children: Vec<NodeId>,
}

/// Pre-order visit result of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTree {
    pub root_label: String,
    pub nodes: Vec<TreeNode>,
    pub roots: Vec<NodeId>,
    /// Set only when a non-skipped variable was dropped by the budget.
    pub truncated: bool,
    pub node_limit: usize,
}

impl VariableTree {
    fn new(root_label: &str, node_limit: usize) -> Self {
        Self {
            root_label: root_label.to_string(),
            nodes: Vec::new(),
            roots: Vec::new(),
            truncated: false,
            node_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().map(|id| self.node(*id))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> {
        self.node(id).children.iter().map(|child| self.node(*child))
    }
}

/// Address shown next to a variable: memory read, then the variable's own
/// fields, then the first hex literal in its value.
pub fn resolve_address(
    variable: &DebugVariable,
    memory: Option<&MemoryInfo>,
) -> Option<String> {
    memory
        .map(|info| info.address.clone())
        .filter(|address| !address.is_empty())
        .or_else(|| variable.address.clone())
        .or_else(|| {
            variable
                .memory_reference
                .as_ref()
                .map(|reference| reference.as_str().to_string())
        })
        .or_else(|| extract_hex_address(variable.value_str()).map(str::to_string))
}

/// Memory blocks never show callables, so they are not worth a visit.
fn omitted_from_blocks(variable: &DebugVariable, options: &GraphOptions) -> bool {
    options.visualization_mode == VisualizationMode::MemoryBlocks
        && is_callable_type(variable.type_str())
}

struct Pending {
    variable: DebugVariable,
    parent: Option<NodeId>,
    depth: usize,
}

pub async fn traverse(
    adapter: &SessionAdapter<'_>,
    root_label: &str,
    roots: Vec<DebugVariable>,
    options: &GraphOptions,
    policy: &VariablePolicy,
) -> SnapshotResult<VariableTree> {
    traverse_with_limit(adapter, root_label, roots, options, policy, GRAPH_NODE_LIMIT).await
}

pub async fn traverse_with_limit(
    adapter: &SessionAdapter<'_>,
    root_label: &str,
    roots: Vec<DebugVariable>,
    options: &GraphOptions,
    policy: &VariablePolicy,
    node_limit: usize,
) -> SnapshotResult<VariableTree> {
    let cache = MemoryCache::with_read_size(options.memory_read_size);
    let mut tree = VariableTree::new(root_label, node_limit);
    let mut expanded: HashSet<VariablesRef> = HashSet::new();
    let mut stack: Vec<Pending> = roots
        .into_iter()
        .rev()
        .map(|variable| Pending {
            variable,
            parent: None,
            depth: 0,
        })
        .collect();

    while let Some(Pending {
        variable,
        parent,
        depth,
    }) = stack.pop()
    {
        if policy.should_skip(&variable, options.hide_internal_variables)
            || omitted_from_blocks(&variable, options)
        {
            continue;
        }
        if tree.nodes.len() >= node_limit {
            debug!(
                "node limit {node_limit} reached before '{}'",
                variable.name
            );
            tree.truncated = true;
            break;
        }
        let id = NodeId(tree.nodes.len());

        let memory = match (&variable.memory_reference, options.show_memory_addresses) {
            (Some(reference), true) => cache.get(adapter, reference).await?,
            _ => None,
        };
        let address = resolve_address(&variable, memory.as_ref());

        let kind = if !policy.is_container(&variable) {
            NodeKind::Leaf
        } else {
            match variable.variables_reference {
                None => NodeKind::Container { reference: None },
                Some(reference) if expanded.contains(&reference) => {
                    NodeKind::Circular { reference }
                }
                Some(reference) => {
                    expanded.insert(reference);
                    match adapter.expand_variable(reference).await {
                        Ok(children) => {
                            stack.extend(children.into_iter().rev().map(|child| Pending {
                                variable: child,
                                parent: Some(id),
                                depth: depth + 1,
                            }));
                            NodeKind::Container {
                                reference: Some(reference),
                            }
                        }
                        Err(err @ SnapshotError::StaleReference { .. }) => return Err(err),
                        Err(err) => {
                            warn!("failed to expand '{}': {err}", variable.name);
                            NodeKind::Unreadable {
                                reason: err.to_string(),
                            }
                        }
                    }
                }
            }
        };

        match parent {
            Some(parent) => tree.nodes[parent.0].children.push(id),
            None => tree.roots.push(id),
        }
        tree.nodes.push(TreeNode {
            id,
            parent,
            depth,
            variable,
            kind,
            address,
            memory,
            children: Vec::new(),
        });
    }

    debug!(
        "visited {} variables under '{}' (truncated: {})",
        tree.nodes.len(),
        tree.root_label,
        tree.truncated
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedgehog_dap::{MemoryRef, ReplaySession, StopGeneration, Transcript};
    use serde_json::json;

    fn leaf(name: &str, value: &str) -> DebugVariable {
        DebugVariable {
            name: name.to_string(),
            value: Some(value.to_string()),
            type_name: Some("int".to_string()),
            variables_reference: None,
            memory_reference: None,
            address: None,
        }
    }

    fn session(value: serde_json::Value) -> ReplaySession {
        ReplaySession::new(serde_json::from_value::<Transcript>(value).unwrap())
    }

    #[test]
    fn address_resolution_order() {
        let mut variable = leaf("p", "(int *) 0xabc");
        assert_eq!(resolve_address(&variable, None).as_deref(), Some("0xabc"));

        variable.memory_reference = MemoryRef::new("0x100", 0);
        assert_eq!(resolve_address(&variable, None).as_deref(), Some("0x100"));

        variable.address = Some("0x200".into());
        assert_eq!(resolve_address(&variable, None).as_deref(), Some("0x200"));

        let info = MemoryInfo {
            address: "0x300".into(),
            offset: 0,
            size: 0,
            raw_bytes: String::new(),
        };
        assert_eq!(resolve_address(&variable, Some(&info)).as_deref(), Some("0x300"));
        assert_eq!(resolve_address(&leaf("n", "7"), None), None);
    }

    #[tokio::test]
    async fn visits_in_pre_order_with_depths() {
        let session = session(json!({
            "variables": {
                "1": [
                    { "name": "a", "value": "1", "variablesReference": 0 },
                    { "name": "b", "value": "2", "variablesReference": 0 }
                ]
            }
        }));
        let generation = StopGeneration::new();
        let adapter = SessionAdapter::new(&session, generation.clone());
        let mut outer = leaf("outer", "Pair");
        outer.type_name = Some("Pair".into());
        outer.variables_reference = VariablesRef::new(1, generation.current());

        let tree = traverse(
            &adapter,
            "Locals",
            vec![outer, leaf("z", "9")],
            &GraphOptions::default(),
            &VariablePolicy::python(),
        )
        .await
        .unwrap();

        let order = tree
            .nodes
            .iter()
            .map(|node| (node.variable.name.as_str(), node.depth))
            .collect::<Vec<_>>();
        assert_eq!(order, [("outer", 0), ("a", 1), ("b", 1), ("z", 0)]);
        assert_eq!(tree.roots.len(), 2);
        assert_eq!(tree.children(NodeId(0)).count(), 2);
        assert!(!tree.truncated);
    }

    #[tokio::test]
    async fn skipped_variables_do_not_spend_budget() {
        let session = session(json!({}));
        let adapter = SessionAdapter::new(&session, StopGeneration::new());
        let mut roots = vec![leaf("__class__", "<class>"), leaf("a", "1")];
        roots.push(leaf("__dict__", "{}"));

        let tree = traverse_with_limit(
            &adapter,
            "Locals",
            roots,
            &GraphOptions::default(),
            &VariablePolicy::python(),
            1,
        )
        .await
        .unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.truncated);
    }

    #[tokio::test]
    async fn callables_are_free_in_block_mode() {
        let session = session(json!({}));
        let adapter = SessionAdapter::new(&session, StopGeneration::new());
        let mut method = leaf("run", "<bound method run>");
        method.type_name = Some("method".into());
        let roots = vec![method.clone(), method.clone(), leaf("x", "5")];
        let options = GraphOptions {
            hide_internal_variables: false,
            ..GraphOptions::default()
        };

        let blocks = traverse_with_limit(
            &adapter,
            "Locals",
            roots.clone(),
            &options,
            &VariablePolicy::python(),
            1,
        )
        .await
        .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.nodes[0].variable.name, "x");
        assert!(!blocks.truncated);

        let graph = traverse_with_limit(
            &adapter,
            "Locals",
            roots,
            &GraphOptions {
                visualization_mode: VisualizationMode::Graph,
                ..options
            },
            &VariablePolicy::python(),
            1,
        )
        .await
        .unwrap();
        assert_eq!(graph.nodes[0].variable.name, "run");
        assert!(graph.truncated);
    }

    #[tokio::test]
    async fn stale_handles_abort_the_walk() {
        let session = session(json!({}));
        let generation = StopGeneration::new();
        let adapter = SessionAdapter::new(&session, generation.clone());
        let mut stale = leaf("obj", "Obj");
        stale.variables_reference = VariablesRef::new(4, generation.current());
        generation.advance();

        let err = traverse(
            &adapter,
            "Locals",
            vec![stale],
            &GraphOptions::default(),
            &VariablePolicy::python(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SnapshotError::StaleReference { .. }));
    }
}
