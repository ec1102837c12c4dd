//! Reference handles bound to a stop generation.
//! - StopGeneration: shared counter bumped whenever the debuggee resumes
//! - VariablesRef/MemoryRef: opaque tokens stamped with the issuing stop
//! - DebugVariable: protocol variable with typed handles

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{ReferenceKind, SnapshotError, SnapshotResult};
use crate::protocol::Variable;

/// Counts debuggee resumptions for one session.
///
/// Cloning shares the counter.
#[derive(Debug, Clone, Default)]
pub struct StopGeneration {
    inner: Arc<AtomicU64>,
}

impl StopGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::SeqCst)
    }

    /// Invalidates every handle issued so far and returns the new generation.
    pub fn advance(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub(crate) fn check(&self, kind: ReferenceKind, reference: String, issued: u64) -> SnapshotResult<()> {
        let current = self.current();
        if issued == current {
            return Ok(());
        }
        Err(SnapshotError::StaleReference {
            kind,
            reference,
            issued,
            current,
        })
    }
}

/// Expandable-children handle. Only positive protocol references become tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariablesRef {
    id: i64,
    generation: u64,
}

impl VariablesRef {
    pub fn new(id: i64, generation: u64) -> Option<Self> {
        (id > 0).then_some(Self { id, generation })
    }

    pub fn id(self) -> i64 {
        self.id
    }

    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// Memory-readable region handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryRef {
    id: String,
    generation: u64,
}

impl MemoryRef {
    pub fn new(id: impl Into<String>, generation: u64) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self { id, generation })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One named value observed at a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugVariable {
    pub name: String,
    pub value: Option<String>,
    pub type_name: Option<String>,
    pub variables_reference: Option<VariablesRef>,
    pub memory_reference: Option<MemoryRef>,
    pub address: Option<String>,
}

impl DebugVariable {
    /// Wraps a protocol variable, stamping its handles with `generation`.
    pub fn from_protocol(variable: Variable, generation: u64) -> Self {
        Self {
            name: variable.name,
            value: variable.value,
            type_name: variable.r#type,
            variables_reference: VariablesRef::new(variable.variables_reference, generation),
            memory_reference: variable
                .memory_reference
                .and_then(|reference| MemoryRef::new(reference, generation)),
            address: variable.address.filter(|address| !address.is_empty()),
        }
    }

    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn type_str(&self) -> &str {
        self.type_name.as_deref().unwrap_or("")
    }
}
