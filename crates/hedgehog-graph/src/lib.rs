//! Variable graph snapshots of a paused debuggee.
//!
//! A snapshot pauses the session, walks its preferred scope into a bounded
//! [`VariableTree`] and renders that tree as Mermaid text or HTML memory
//! blocks.

mod config;
mod policy;
pub mod render;
mod sanitize;
mod snapshot;
mod traversal;

pub use config::{GraphOptions, HedgehogConfig, VisualizationMode};
pub use policy::{
    is_callable_type, is_container_type, is_dunder, is_null_value, is_pointer_type,
    is_structural_type, PolicyPreset, VariablePolicy, PYTHON_INTERNAL_NAMES,
};
pub use render::{render, Document};
pub use sanitize::{
    extract_hex_address, sanitize_label, truncate_chars, FIELD_VALUE_LIMIT, LABEL_VALUE_LIMIT,
};
pub use snapshot::{handle_message, rebuild_from_variables, take_snapshot, Snapshot};
pub use traversal::{
    resolve_address, traverse, traverse_with_limit, NodeId, NodeKind, TreeNode, VariableTree,
    GRAPH_NODE_LIMIT,
};
