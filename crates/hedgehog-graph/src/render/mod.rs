//! Output projections of a [`VariableTree`](crate::traversal::VariableTree).

pub mod blocks;
pub mod directed;

use crate::config::{GraphOptions, VisualizationMode};
use crate::traversal::VariableTree;

/// Rendered snapshot text, tagged with its syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Mermaid(String),
    Html(String),
}

impl Document {
    pub fn as_str(&self) -> &str {
        match self {
            Document::Mermaid(text) | Document::Html(text) => text,
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        match self {
            Document::Mermaid(_) => VisualizationMode::Graph,
            Document::Html(_) => VisualizationMode::MemoryBlocks,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Document::Mermaid(text) | Document::Html(text) => text,
        }
    }
}

pub fn render(tree: &VariableTree, options: &GraphOptions) -> Document {
    match options.visualization_mode {
        VisualizationMode::Graph => Document::Mermaid(directed::layout(tree, options).to_mermaid()),
        VisualizationMode::MemoryBlocks => Document::Html(blocks::layout(tree).to_html(options)),
    }
}
