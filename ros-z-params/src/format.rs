//! Value-to-text rendering for the per-update log line.

use crate::types::{Parameter, ParameterValue};

/// Bytes shown from each end of a byte array.
const BYTE_PREVIEW_LEN: usize = 8;

/// Format an accepted update as `[PARAM] '<name>': <value>`.
pub fn format_update(param: &Parameter) -> String {
    format!("[PARAM] '{}': {}", param.name, format_value(&param.value))
}

/// Render a value for logging. Large byte arrays are reduced to their first
/// and last [`BYTE_PREVIEW_LEN`] bytes.
pub fn format_value(value: &ParameterValue) -> String {
    match value {
        ParameterValue::String(s) => format!("'{}'", s),
        ParameterValue::StringArray(items) => {
            let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
            format!("[{}]", quoted.join(", "))
        }
        ParameterValue::ByteArray(bytes) => format_bytes(bytes),
        ParameterValue::Bool(v) => v.to_string(),
        ParameterValue::Integer(v) => v.to_string(),
        ParameterValue::Double(v) => format!("{:?}", v),
        ParameterValue::BoolArray(v) => format!("{:?}", v),
        ParameterValue::IntegerArray(v) => format!("{:?}", v),
        ParameterValue::DoubleArray(v) => format!("{:?}", v),
    }
}

fn format_bytes(bytes: &[u8]) -> String {
    let first = &bytes[..bytes.len().min(BYTE_PREVIEW_LEN)];
    let last = &bytes[bytes.len().saturating_sub(BYTE_PREVIEW_LEN)..];

    if is_textual(first) || is_textual(last) {
        format!("['{}' ... '{}']", ascii_lossy(first), ascii_lossy(last))
    } else {
        format!("[{:?} ... {:?}]", first, last)
    }
}

/// A slice is shown as text when at least one byte decodes as ASCII, or
/// when it is empty.
fn is_textual(bytes: &[u8]) -> bool {
    bytes.is_empty() || bytes.iter().any(u8::is_ascii)
}

fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii() {
                b as char
            } else {
                char::REPLACEMENT_CHARACTER
            }
        })
        .collect()
}
