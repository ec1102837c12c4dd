//! Text normalization shared by both renderers.
//! - sanitize_label: strip hazards common to every output syntax
//! - truncate_chars: length cap with an ellipsis
//! - extract_hex_address: first `0x...` literal in a value

use once_cell::sync::Lazy;
use regex::Regex;

/// Cap for values inside directed-graph node labels.
pub const LABEL_VALUE_LIMIT: usize = 100;
/// Cap for values inside block-diagram fields.
pub const FIELD_VALUE_LIMIT: usize = 50;

const ELLIPSIS: &str = "...";

static HEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new("0x[0-9a-fA-F]+").expect("hex literal pattern"));

/// Collapses newline runs to one space, turns double quotes into single
/// quotes, drops control characters and trims. Idempotent.
pub fn sanitize_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_newline_run = false;
    for ch in value.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_newline_run {
                out.push(' ');
            }
            in_newline_run = true;
            continue;
        }
        in_newline_run = false;
        match ch {
            '"' => out.push('\''),
            ch if ch.is_control() => {}
            ch => out.push(ch),
        }
    }
    out.trim().to_string()
}

/// Keeps at most `max` characters, ending in `...` when shortened.
pub fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = value.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn extract_hex_address(value: &str) -> Option<&str> {
    HEX_LITERAL.find(value).map(|found| found.as_str())
}
