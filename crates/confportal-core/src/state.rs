//! Canonical value store.
//!
//! Every parameter's current value is held as one canonical string,
//! positionally aligned with its schema descriptor, regardless of the
//! declared type. Typed accessors coerce on the way in and out. The device
//! identity (a free-text device name) lives alongside the parameter values
//! and is persisted under the reserved key `deviceName`.

use crate::schema::{FieldType, LoadReport, Schema, SchemaError};

/// Reserved persistence key for the device identity. A parameter with the
/// same name would shadow it on the form but never in the store.
pub const DEVICE_NAME_KEY: &str = "deviceName";

/// The schema store and value store pair for one portal instance.
#[derive(Debug, Clone, Default)]
pub struct ConfigState {
    schema: Schema,
    values: Vec<String>,
    device_name: String,
}

impl ConfigState {
    /// Create an empty state with the file-backend name cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty state with an explicit name cap
    /// ([`crate::schema::KV_NAME_LIMIT`] when the key-value backend is
    /// active).
    pub fn with_name_limit(name_limit: usize) -> Self {
        Self {
            schema: Schema::new(name_limit),
            values: Vec::new(),
            device_name: String::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    /// Append a schema document and initialize the new values.
    ///
    /// Each appended parameter starts at its document default, or at the
    /// type-appropriate zero value when no default is given. Existing
    /// values are untouched; a persistence adapter overlays stored values
    /// afterwards via [`crate::ConfigStorage::load`].
    pub fn load_schema(&mut self, document: &str) -> Result<LoadReport, SchemaError> {
        let report = self.schema.append_json(document)?;
        for descr in self.schema.iter().skip(self.values.len()) {
            let initial = descr
                .default_value()
                .map(str::to_string)
                .unwrap_or_else(|| descr.zero_value());
            self.values.push(initial);
        }
        Ok(report)
    }

    /// The device identity shown in the form header.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_device_name(&mut self, name: &str) {
        self.device_name = name.to_string();
    }

    /// Raw canonical value by index; empty string when out of range.
    pub fn value_at(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Overwrite a canonical value by index; out-of-range is a no-op.
    pub fn set_value_at(&mut self, index: usize, value: String) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Raw canonical value by name; empty string on a lookup miss.
    pub fn get_value(&self, name: &str) -> &str {
        match self.schema.index_of(name) {
            Some(index) => self.value_at(index),
            None => "",
        }
    }

    /// Overwrite a canonical value by name; a lookup miss is a no-op.
    pub fn set_value(&mut self, name: &str, value: &str) {
        if let Some(index) = self.schema.index_of(name) {
            self.set_value_at(index, value.to_string());
        }
    }

    /// Integer view of a value. Non-numeric text reads as 0, following the
    /// leading-digits convention of the firmware's string parser.
    pub fn get_int(&self, name: &str) -> i32 {
        leading_int(self.get_value(name))
    }

    /// Float view of a value; non-numeric text reads as 0.0.
    pub fn get_float(&self, name: &str) -> f32 {
        leading_float(self.get_value(name))
    }

    /// Boolean view: any value other than "0" reads as true. A lookup miss
    /// yields the empty string and reads as false.
    pub fn get_bool(&self, name: &str) -> bool {
        let raw = self.get_value(name);
        !raw.is_empty() && raw != "0"
    }

    /// Store an integer in canonical form.
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_value(name, &value.to_string());
    }

    /// Store a float in canonical form.
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_value(name, &value.to_string());
    }

    /// Update a parameter's label; a lookup miss is a no-op.
    pub fn set_label(&mut self, name: &str, label: &str) {
        if let Some(index) = self.schema.index_of(name) {
            if let Some(descr) = self.schema.get_mut(index) {
                descr.set_label(label);
            }
        }
    }

    /// Reset every value to its schema default (or zero value) and clear
    /// the device identity. Used after a whole-store delete.
    pub fn reset_to_defaults(&mut self) {
        for (descr, slot) in self.schema.iter().zip(self.values.iter_mut()) {
            *slot = descr
                .default_value()
                .map(str::to_string)
                .unwrap_or_else(|| descr.zero_value());
        }
        self.device_name.clear();
    }
}

/// Parse the leading integer of a string, `strtol`-style: optional sign,
/// then digits; anything else reads as 0.
pub(crate) fn leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let mut end = 0;
    let bytes = s.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }
    s[..end].parse().unwrap_or(0)
}

/// Parse the leading float of a string; anything else reads as 0.0.
pub(crate) fn leading_float(s: &str) -> f32 {
    let s = s.trim_start();
    let mut end = 0;
    let bytes = s.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if end == digits_start {
        return 0.0;
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Interpret a MultiCheck bitmap: character `i` is '1' iff option `i` is
/// selected, padded to the option count.
pub fn bitmap_is_set(bitmap: &str, index: usize) -> bool {
    bitmap.as_bytes().get(index) == Some(&b'1')
}

impl ConfigState {
    /// Field type by name, for callers that dispatch on it.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.schema
            .index_of(name)
            .and_then(|i| self.schema.get(i))
            .map(|d| d.field_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_state() -> ConfigState {
        let mut state = ConfigState::new();
        state
            .load_schema(
                r#"[
                    {"name":"ssid","label":"WiFi SSID","type":"text","default":"mynet"},
                    {"name":"temp","label":"Threshold","type":"number","default":20},
                    {"name":"ratio","label":"Ratio","type":"float","default":"1.5"},
                    {"name":"on","label":"Enabled","type":"check","default":"1"},
                    {"name":"days","label":"Days","type":"multicheck",
                     "options":[{"v":"mo","l":"Mon"},{"v":"tu","l":"Tue"},{"v":"we","l":"Wed"}]}
                ]"#,
            )
            .unwrap();
        state
    }

    #[test]
    fn test_defaults_and_zero_values() {
        let state = sample_state();
        assert_eq!(state.get_value("ssid"), "mynet");
        assert_eq!(state.get_value("temp"), "20");
        assert_eq!(state.get_value("days"), "000");
    }

    #[test]
    fn test_typed_getters() {
        let state = sample_state();
        assert_eq!(state.get_int("temp"), 20);
        assert_eq!(state.get_float("ratio"), 1.5);
        assert!(state.get_bool("on"));
        assert_eq!(state.get_int("ssid"), 0);
    }

    #[test]
    fn test_lookup_miss_is_safe() {
        let mut state = sample_state();
        assert_eq!(state.get_value("missing"), "");
        assert_eq!(state.get_int("missing"), 0);
        assert!(!state.get_bool("missing"));
        state.set_value("missing", "x"); // no-op, no panic
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn test_typed_setters() {
        let mut state = sample_state();
        state.set_int("temp", 42);
        assert_eq!(state.get_value("temp"), "42");
        state.set_float("ratio", 2.25);
        assert_eq!(state.get_value("ratio"), "2.25");
    }

    #[test]
    fn test_leading_int_convention() {
        assert_eq!(leading_int("42"), 42);
        assert_eq!(leading_int("-7"), -7);
        assert_eq!(leading_int("42abc"), 42);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
        assert_eq!(leading_float("1.5x"), 1.5);
        assert_eq!(leading_float("x"), 0.0);
    }

    #[test]
    fn test_reset_to_defaults() {
        let mut state = sample_state();
        state.set_value("ssid", "other");
        state.set_device_name("garage");
        state.reset_to_defaults();
        assert_eq!(state.get_value("ssid"), "mynet");
        assert_eq!(state.device_name(), "");
    }

    #[test]
    fn test_bitmap_helper() {
        assert!(bitmap_is_set("010", 1));
        assert!(!bitmap_is_set("010", 0));
        assert!(!bitmap_is_set("010", 7));
    }
}
