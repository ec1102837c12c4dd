//! Memory-block projection of a [`VariableTree`].
//!
//! Compound values either get their own block, linked from the parent by a
//! pointer field, or are flattened into the parent as `parent.child` fields.

use std::collections::{HashMap, HashSet};

use hedgehog_dap::VariablesRef;

use crate::config::GraphOptions;
use crate::policy::{is_callable_type, is_null_value, is_pointer_type, is_structural_type};
use crate::sanitize::{sanitize_label, truncate_chars, FIELD_VALUE_LIMIT};
use crate::traversal::{NodeId, NodeKind, TreeNode, VariableTree};

pub const ROOT_BLOCK_ID: &str = "block_0";
pub const TRUNCATION_FIELD_NAME: &str = "⚠️";
const CIRCULAR_TEXT: &str = "↻ circular";
const UNREADABLE_TEXT: &str = "Error reading";
/// Compound values with more meaningful children than this get a block.
const INLINE_CHILD_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    Object,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Root => "root",
            BlockKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Plain(String),
    /// Links to the block with id `target`; the text is the pointee type.
    Pointer { target: String, text: String },
    Circular,
}

impl FieldValue {
    pub fn text(&self) -> &str {
        match self {
            FieldValue::Plain(text) | FieldValue::Pointer { text, .. } => text,
            FieldValue::Circular => CIRCULAR_TEXT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockField {
    pub name: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub id: String,
    pub name: String,
    pub kind: BlockKind,
    pub address: Option<String>,
    pub fields: Vec<BlockField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDiagram {
    /// Root first, then blocks in creation order.
    pub blocks: Vec<MemoryBlock>,
    pub truncated: bool,
}

impl BlockDiagram {
    pub fn block(&self, id: &str) -> Option<&MemoryBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn to_html(&self, options: &GraphOptions) -> String {
        let mut html = vec![r#"<div class="container">"#.to_string()];
        for block in &self.blocks {
            let kind = block.kind.as_str();
            html.push(format!(
                r#"<div class="memory-block {kind}" id="{}">"#,
                block.id
            ));
            html.push(format!(r#"<div class="block-header {kind}">"#));
            html.push(escape_html(&block.name));
            if block.kind != BlockKind::Root {
                html.push(format!(r#"<span class="type-badge">{kind}</span>"#));
            }
            html.push("</div>".to_string());

            if options.show_memory_addresses {
                if let Some(address) = block.address.as_deref().filter(|a| !a.is_empty()) {
                    html.push(format!(
                        r#"<div class="block-address">@ {}</div>"#,
                        escape_html(address)
                    ));
                }
            }

            for field in &block.fields {
                html.push(r#"<div class="block-field">"#.to_string());
                html.push(format!(
                    r#"<span class="field-name">{}:</span>"#,
                    escape_html(&field.name)
                ));
                let text = escape_html(field.value.text());
                html.push(match &field.value {
                    FieldValue::Pointer { target, .. } => format!(
                        r#"<span class="field-pointer" data-target="{}">→ {text}</span>"#,
                        escape_html(target)
                    ),
                    FieldValue::Circular => {
                        format!(r#"<span class="field-value circular">{text}</span>"#)
                    }
                    FieldValue::Plain(value) if is_null_value(value) => {
                        format!(r#"<span class="field-value null-value">{text}</span>"#)
                    }
                    FieldValue::Plain(_) => format!(r#"<span class="field-value">{text}</span>"#),
                });
                html.push("</div>".to_string());
            }
            html.push("</div>".to_string());
        }
        html.push("</div>".to_string());
        html.join("\n")
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            ch => out.push(ch),
        }
    }
    out
}

fn field_text(text: &str) -> String {
    truncate_chars(&sanitize_label(text), FIELD_VALUE_LIMIT)
}

fn is_meaningful(node: &TreeNode) -> bool {
    !is_callable_type(node.variable.type_str())
}

struct Builder<'t> {
    tree: &'t VariableTree,
    blocks: Vec<MemoryBlock>,
    /// Node that first expanded each handle.
    origins: HashMap<VariablesRef, NodeId>,
    /// Handles whose children were laid out as a block or inline fields.
    shown: HashSet<VariablesRef>,
}

impl<'t> Builder<'t> {
    fn push_field(&mut self, block: usize, name: String, value: FieldValue) {
        self.blocks[block].fields.push(BlockField { name, value });
    }

    /// First expansion of `reference`, unless its children already appear.
    fn unshown_origin(&self, reference: VariablesRef) -> Option<&'t TreeNode> {
        let tree = self.tree;
        if self.shown.contains(&reference) {
            return None;
        }
        self.origins.get(&reference).map(|id| tree.node(*id))
    }

    fn place(&mut self, node: &TreeNode, parent: usize) {
        let name = sanitize_label(&node.variable.name);
        match &node.kind {
            NodeKind::Circular { reference } => match self.unshown_origin(*reference) {
                Some(origin) => self.place_compound(node, origin, parent),
                None => self.push_field(parent, name, FieldValue::Circular),
            },
            NodeKind::Unreadable { .. } => {
                self.push_field(parent, name, FieldValue::Plain(UNREADABLE_TEXT.to_string()));
            }
            NodeKind::Leaf | NodeKind::Container { reference: None } => {
                let value = field_text(node.variable.value.as_deref().unwrap_or("undefined"));
                self.push_field(parent, name, FieldValue::Plain(value));
            }
            NodeKind::Container { reference: Some(_) } => self.place_compound(node, node, parent),
        }
    }

    /// Lays out `node` using the children fetched under `expansion`, which is
    /// `node` itself unless the handle was first expanded somewhere hidden.
    fn place_compound(&mut self, node: &TreeNode, expansion: &TreeNode, parent: usize) {
        let tree = self.tree;
        if let NodeKind::Container {
            reference: Some(reference),
        } = expansion.kind
        {
            self.shown.insert(reference);
        }
        let type_name = node.variable.type_str();
        let children = tree
            .children(expansion.id)
            .filter(|child| is_meaningful(child))
            .collect::<Vec<_>>();
        let own_block = is_pointer_type(type_name)
            || is_structural_type(type_name)
            || node.depth == 0
            || children.len() > INLINE_CHILD_LIMIT;

        if !own_block {
            for child in children {
                let value = match &child.kind {
                    NodeKind::Circular { reference } if self.shown.contains(reference) => {
                        CIRCULAR_TEXT.to_string()
                    }
                    NodeKind::Unreadable { .. } => UNREADABLE_TEXT.to_string(),
                    _ => field_text(child.variable.value_str()),
                };
                let name =
                    sanitize_label(&format!("{}.{}", node.variable.name, child.variable.name));
                self.push_field(parent, name, FieldValue::Plain(value));
            }
            return;
        }

        let id = format!("block_{}", self.blocks.len());
        let type_text = truncate_chars(type_name, FIELD_VALUE_LIMIT);
        let name = sanitize_label(&node.variable.name);
        self.blocks.push(MemoryBlock {
            id: id.clone(),
            name: format!("{name} ({type_text})"),
            kind: BlockKind::Object,
            address: node.address.clone(),
            fields: Vec::new(),
        });
        let block = self.blocks.len() - 1;
        self.push_field(
            parent,
            name,
            FieldValue::Pointer {
                target: id,
                text: type_text,
            },
        );
        for child in children {
            self.place(child, block);
        }
    }
}

/// Builds the block layout. Callable-typed variables never appear.
pub fn layout(tree: &VariableTree) -> BlockDiagram {
    let root_name = sanitize_label(&tree.root_label);
    let mut builder = Builder {
        tree,
        blocks: vec![MemoryBlock {
            id: ROOT_BLOCK_ID.to_string(),
            name: if root_name.is_empty() {
                hedgehog_dap::DEFAULT_SCOPE_NAME.to_string()
            } else {
                root_name
            },
            kind: BlockKind::Root,
            address: None,
            fields: Vec::new(),
        }],
        origins: tree
            .nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Container {
                    reference: Some(reference),
                } => Some((reference, node.id)),
                _ => None,
            })
            .collect(),
        shown: HashSet::new(),
    };
    for node in tree.roots().filter(|node| is_meaningful(node)) {
        builder.place(node, 0);
    }
    if tree.truncated {
        builder.push_field(
            0,
            TRUNCATION_FIELD_NAME.to_string(),
            FieldValue::Plain(format!(
                "Visualization truncated at {} nodes",
                tree.node_limit
            )),
        );
    }
    BlockDiagram {
        blocks: builder.blocks,
        truncated: tree.truncated,
    }
}
