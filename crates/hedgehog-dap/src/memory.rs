//! Memory reads and the per-build fetch cache.
//! - clamp_memory_read_size: normalize configured read sizes
//! - hex_dump/decode_data: readMemory payload helpers
//! - MemoryCache: at most one read per reference within a build

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::sync::OnceCell;

use crate::error::SnapshotResult;
use crate::handle::MemoryRef;
use crate::session::SessionAdapter;

/// Read size used when none (or an unusable one) is configured.
pub const DEFAULT_MEMORY_READ_SIZE: usize = 64;
/// Upper bound for a single memory read, in bytes.
pub const MAX_MEMORY_READ_SIZE: usize = 256;
/// Bytes per row in a hex dump.
pub const HEX_DUMP_ROW: usize = 8;

/// Result of one memory read. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub address: String,
    pub offset: i64,
    /// Bytes actually returned.
    pub size: usize,
    /// Hex dump, one row per line.
    pub raw_bytes: String,
}

impl MemoryInfo {
    pub fn preview_rows(&self, rows: usize) -> impl Iterator<Item = &str> {
        self.raw_bytes.lines().take(rows)
    }
}

/// Absent, zero, negative and NaN sizes use the default; the rest are floored
/// into `[1, MAX_MEMORY_READ_SIZE]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_memory_read_size(requested: Option<f64>) -> usize {
    match requested {
        Some(value) if value > 0.0 => {
            value.clamp(1.0, MAX_MEMORY_READ_SIZE as f64).floor() as usize
        }
        _ => DEFAULT_MEMORY_READ_SIZE,
    }
}

pub fn decode_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    STANDARD.decode(data)
}

pub fn hex_dump(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(no data)".to_string();
    }
    bytes
        .chunks(HEX_DUMP_ROW)
        .map(|row| {
            row.iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

type Slot = Arc<OnceCell<Option<MemoryInfo>>>;

/// Memory reads for one build, keyed by reference.
///
/// The first requester of a reference stores a pending slot before awaiting
/// the read, so concurrent requesters share its outcome. Nothing is evicted.
#[derive(Debug)]
pub struct MemoryCache {
    read_size: usize,
    slots: Mutex<HashMap<MemoryRef, Slot>>,
}

impl MemoryCache {
    pub fn new(requested_size: Option<f64>) -> Self {
        Self::with_read_size(clamp_memory_read_size(requested_size))
    }

    pub fn with_read_size(read_size: usize) -> Self {
        Self {
            read_size: read_size.clamp(1, MAX_MEMORY_READ_SIZE),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn read_size(&self) -> usize {
        self.read_size
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn get(
        &self,
        adapter: &SessionAdapter<'_>,
        reference: &MemoryRef,
    ) -> SnapshotResult<Option<MemoryInfo>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(reference.clone()).or_default())
        };
        let info = slot
            .get_or_try_init(|| adapter.read_memory(reference, self.read_size, 0))
            .await?;
        Ok(info.clone())
    }
}
