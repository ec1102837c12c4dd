//! Mermaid flowchart projection of a [`VariableTree`].

use hedgehog_dap::MemoryInfo;

use crate::config::GraphOptions;
use crate::sanitize::{sanitize_label, truncate_chars, LABEL_VALUE_LIMIT};
use crate::traversal::{NodeKind, TreeNode, VariableTree};

pub const ROOT_NODE_ID: &str = "Scope";
pub const TRUNCATED_NODE_ID: &str = "Truncated";
const MEMORY_PREVIEW_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Rect,
    Circle,
    Hexagon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStyle {
    Solid,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    /// Escaped for Mermaid.
    pub label: String,
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub truncated: bool,
}

impl DirectedGraph {
    fn node(&mut self, id: impl Into<String>, label: String, shape: NodeShape) {
        self.nodes.push(GraphNode {
            id: id.into(),
            label,
            shape,
        });
    }

    fn edge(&mut self, from: impl Into<String>, to: impl Into<String>, style: EdgeStyle) {
        self.edges.push(GraphEdge {
            from: from.into(),
            to: to.into(),
            style,
        });
    }

    /// `graph TD;` header, every node definition, then every edge.
    pub fn to_mermaid(&self) -> String {
        let mut lines = Vec::with_capacity(1 + self.nodes.len() + self.edges.len());
        lines.push("graph TD;".to_string());
        for node in &self.nodes {
            let GraphNode { id, label, shape } = node;
            lines.push(match shape {
                NodeShape::Rect => format!("    {id}[\"{label}\"];"),
                NodeShape::Circle => format!("    {id}(({label}));"),
                NodeShape::Hexagon => format!("    {id}{{{{{label}}}}};"),
            });
        }
        for GraphEdge { from, to, style } in &self.edges {
            lines.push(match style {
                EdgeStyle::Solid => format!("    {from} --> {to};"),
                EdgeStyle::Dotted => format!("    {from} -.-> {to};"),
            });
        }
        lines.join("\n")
    }
}

/// Drops characters Mermaid treats as shape or comment delimiters.
pub fn escape_mermaid(text: &str) -> String {
    text.chars()
        .filter(|ch| !matches!(ch, '<' | '>' | '(' | ')' | '[' | ']' | '{' | '}' | '#'))
        .map(|ch| if ch == '|' { '/' } else { ch })
        .collect()
}

fn graph_text(text: &str) -> String {
    escape_mermaid(&sanitize_label(text))
}

fn node_id(node: &TreeNode) -> String {
    format!("Node{}", node.id.index())
}

fn display_name(node: &TreeNode) -> String {
    let name = graph_text(&node.variable.name);
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

/// `name: value` with an optional ` @address` suffix.
pub fn variable_label(node: &TreeNode, show_addresses: bool) -> String {
    let name = display_name(node);
    let value = node
        .variable
        .value
        .as_deref()
        .map(|value| graph_text(&truncate_chars(&sanitize_label(value), LABEL_VALUE_LIMIT)))
        .filter(|value| !value.is_empty());
    let mut label = match value {
        Some(value) => format!("{name}: {value}"),
        None => name,
    };
    if show_addresses {
        if let Some(address) = node.address.as_deref().map(graph_text) {
            if !address.is_empty() {
                label.push_str(" @");
                label.push_str(&address);
            }
        }
    }
    label
}

pub fn memory_label(info: &MemoryInfo) -> String {
    let mut parts = vec![format!("@{}", info.address), format!("{} bytes", info.size)];
    let preview = info
        .preview_rows(MEMORY_PREVIEW_ROWS)
        .collect::<Vec<_>>()
        .join(" | ");
    if !preview.is_empty() {
        parts.push(preview);
    }
    graph_text(&parts.join(" • "))
}

pub fn layout(tree: &VariableTree, options: &GraphOptions) -> DirectedGraph {
    let mut graph = DirectedGraph {
        truncated: tree.truncated,
        ..DirectedGraph::default()
    };
    let root_label = graph_text(&tree.root_label);
    graph.node(
        ROOT_NODE_ID,
        if root_label.is_empty() {
            hedgehog_dap::DEFAULT_SCOPE_NAME.to_string()
        } else {
            root_label
        },
        NodeShape::Rect,
    );

    for node in &tree.nodes {
        let id = node_id(node);
        let (label, shape) = match &node.kind {
            NodeKind::Leaf => (
                variable_label(node, options.show_memory_addresses),
                NodeShape::Rect,
            ),
            NodeKind::Container { .. } => (
                variable_label(node, options.show_memory_addresses),
                NodeShape::Circle,
            ),
            NodeKind::Circular { .. } => {
                (format!("{}: ↻ circular", display_name(node)), NodeShape::Circle)
            }
            NodeKind::Unreadable { .. } => {
                (format!("{}: error reading", display_name(node)), NodeShape::Rect)
            }
        };
        graph.node(id.clone(), label, shape);
        let parent = node
            .parent
            .map(|parent| node_id(tree.node(parent)))
            .unwrap_or_else(|| ROOT_NODE_ID.to_string());
        graph.edge(parent, id.clone(), EdgeStyle::Solid);

        if options.show_memory_addresses {
            if let Some(info) = &node.memory {
                let memory_id = format!("{id}Mem");
                graph.node(memory_id.clone(), memory_label(info), NodeShape::Hexagon);
                graph.edge(id, memory_id, EdgeStyle::Dotted);
            }
        }
    }

    if tree.truncated {
        graph.node(
            TRUNCATED_NODE_ID,
            format!("Graph truncated after {} nodes", tree.node_limit),
            NodeShape::Hexagon,
        );
        graph.edge(ROOT_NODE_ID, TRUNCATED_NODE_ID, EdgeStyle::Solid);
    }
    graph
}
