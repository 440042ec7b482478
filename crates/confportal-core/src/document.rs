//! Structured value document codec.
//!
//! The structured document is a flat JSON mapping from parameter name to
//! its typed value: strings for string-like types, integers for
//! Checkbox/Number/Range, floats for Float, and for MultiCheck the bitmap
//! read as a base-2 integer ("010" → 2). It is the exchange format for
//! save callbacks and for programmatic bulk update; canonical storage
//! stays string-typed either way.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::FieldType;
use crate::state::ConfigState;

/// Errors raised while importing a structured document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document is not a JSON object.
    #[error("malformed value document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document parsed but was not an object at the top level.
    #[error("value document must be a JSON object")]
    NotAnObject,
}

/// Export the current values as a structured document.
pub fn export_document(state: &ConfigState) -> Map<String, Value> {
    let mut doc = Map::new();
    for (index, descr) in state.schema().iter().enumerate() {
        let raw = state.value_at(index);
        let value = match descr.field_type() {
            FieldType::Checkbox | FieldType::Range | FieldType::Number => {
                Value::from(crate::state::leading_int(raw))
            }
            FieldType::Float => Value::from(crate::state::leading_float(raw)),
            FieldType::MultiCheck => Value::from(bitmap_to_int(raw)),
            _ => Value::from(raw),
        };
        doc.insert(descr.name().to_string(), value);
    }
    doc
}

/// Export the current values as a JSON string.
pub fn export_json(state: &ConfigState) -> String {
    Value::Object(export_document(state)).to_string()
}

/// Bulk-update values from a structured document given as a JSON string.
///
/// The update is a sparse patch: parameters absent from the document keep
/// their value, and document keys matching no parameter are ignored.
/// Fractional document values for integer-typed parameters truncate.
pub fn import_json(state: &mut ConfigState, json: &str) -> Result<(), DocumentError> {
    let value: Value = serde_json::from_str(json)?;
    let doc = value.as_object().ok_or(DocumentError::NotAnObject)?;
    import_document(state, doc);
    Ok(())
}

/// Bulk-update values from an already-parsed structured document.
pub fn import_document(state: &mut ConfigState, doc: &Map<String, Value>) {
    for index in 0..state.len() {
        let descr = match state.schema().get(index) {
            Some(d) => d,
            None => continue,
        };
        let Some(value) = doc.get(descr.name()) else {
            continue;
        };

        let canonical = match descr.field_type() {
            FieldType::Checkbox | FieldType::Range | FieldType::Number => {
                Some(truncate_to_int(value).to_string())
            }
            FieldType::Float => value
                .as_f64()
                .or_else(|| value.as_str().map(|s| crate::state::leading_float(s) as f64))
                .map(|f| (f as f32).to_string()),
            FieldType::MultiCheck => {
                let width = descr.option_count();
                Some(int_to_bitmap(truncate_to_int(value), width))
            }
            _ => value
                .as_str()
                .map(str::to_string)
                .or_else(|| Some(value.to_string())),
        };

        if let Some(canonical) = canonical {
            state.set_value_at(index, canonical);
        }
    }
}

/// Read a MultiCheck bitmap as a base-2 integer; malformed bitmaps read
/// as 0.
fn bitmap_to_int(bitmap: &str) -> i32 {
    if bitmap.is_empty() {
        return 0;
    }
    i32::from_str_radix(bitmap, 2).unwrap_or(0)
}

/// Render an integer back into a bitmap padded to the option count.
fn int_to_bitmap(value: i32, width: usize) -> String {
    let value = value.max(0) as u32;
    if width == 0 && value == 0 {
        return String::new();
    }
    // A value wider than the option list keeps its natural width rather
    // than losing high bits.
    format!("{:0width$b}", value, width = width)
}

fn truncate_to_int(value: &Value) -> i32 {
    if let Some(i) = value.as_i64() {
        return i as i32;
    }
    if let Some(f) = value.as_f64() {
        return f as i32;
    }
    if let Some(s) = value.as_str() {
        return crate::state::leading_int(s);
    }
    0
}
