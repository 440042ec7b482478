//! Parameter schema store.
//!
//! A schema is an ordered, fixed-capacity list of parameter descriptors
//! parsed from a JSON schema document. Loading a document appends to the
//! existing list; it never replaces it. All capacity limits are hard caps
//! inherited from the device firmware: overflowing entries are dropped and
//! reported through [`LoadReport`] rather than failing the load.

use serde::Deserialize;
use thiserror::Error;

/// Maximum number of parameters in a schema.
pub const MAX_PARAMS: usize = 20;

/// Maximum number of stored options per parameter.
pub const MAX_OPTIONS: usize = 15;

/// Maximum parameter name length with the file backend.
pub const NAME_LIMIT: usize = 20;

/// Maximum parameter name length with the key-value backend, which caps
/// key length at 15 characters.
pub const KV_NAME_LIMIT: usize = 15;

/// Maximum label length.
pub const LABEL_LIMIT: usize = 40;

/// The input type of a configurable parameter.
///
/// The integer codes match the schema-document encoding and are stable:
/// adding a type means appending a new variant, never renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Password,
    Number,
    Date,
    Time,
    Range,
    Checkbox,
    Radio,
    Select,
    Color,
    Float,
    TextArea,
    MultiCheck,
}

impl FieldType {
    /// Resolve a raw integer code from a schema document.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FieldType::Text),
            1 => Some(FieldType::Password),
            2 => Some(FieldType::Number),
            3 => Some(FieldType::Date),
            4 => Some(FieldType::Time),
            5 => Some(FieldType::Range),
            6 => Some(FieldType::Checkbox),
            7 => Some(FieldType::Radio),
            8 => Some(FieldType::Select),
            9 => Some(FieldType::Color),
            10 => Some(FieldType::Float),
            11 => Some(FieldType::TextArea),
            12 => Some(FieldType::MultiCheck),
            _ => None,
        }
    }

    /// Resolve a symbolic type name from a schema document.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(FieldType::Text),
            "password" => Some(FieldType::Password),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "range" => Some(FieldType::Range),
            "check" => Some(FieldType::Checkbox),
            "radio" => Some(FieldType::Radio),
            "select" => Some(FieldType::Select),
            "color" => Some(FieldType::Color),
            "float" => Some(FieldType::Float),
            "textarea" => Some(FieldType::TextArea),
            "multicheck" => Some(FieldType::MultiCheck),
            _ => None,
        }
    }

    /// True for types whose canonical value is stored and exchanged as a
    /// plain string (including TextArea and the MultiCheck bitmap).
    pub fn is_string_like(self) -> bool {
        !matches!(
            self,
            FieldType::Checkbox | FieldType::Range | FieldType::Number | FieldType::Float
        )
    }

    /// True for types exchanged as integers in documents and typed stores.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Checkbox | FieldType::Range | FieldType::Number
        )
    }
}

/// One `{value, label}` choice of a Radio/Select/MultiCheck parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Static metadata for one configurable parameter.
///
/// `min`/`max` semantics depend on the type: numeric bounds for
/// Number/Range, rows/columns for TextArea, unused otherwise.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    name: String,
    label: String,
    field_type: FieldType,
    pub min: i32,
    pub max: i32,
    default: Option<String>,
    options: Vec<ChoiceOption>,
    option_count: usize,
}

impl ParamDescriptor {
    /// Create a descriptor with documented defaults (`min=0`, `max=99999`).
    pub fn new(name: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            name: clip(name, NAME_LIMIT),
            label: clip(label, LABEL_LIMIT),
            field_type,
            min: 0,
            max: 99999,
            default: None,
            options: Vec::new(),
            option_count: 0,
        }
    }

    /// Parameter name; doubles as persistence key and form field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable prompt.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = clip(label, LABEL_LIMIT);
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Default value declared in the schema document, if any.
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// The option count as declared in the schema document.
    ///
    /// Known limitation carried over from the firmware: when the document
    /// declares more options than [`MAX_OPTIONS`], the excess entries are
    /// dropped from storage but this count still reports the document's
    /// size. Use [`Self::options`] for the entries actually stored.
    pub fn option_count(&self) -> usize {
        self.option_count
    }

    /// The stored options, at most [`MAX_OPTIONS`] entries.
    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    /// Remove all options. This is the only way the option count shrinks.
    pub fn clear_options(&mut self) {
        self.options.clear();
        self.option_count = 0;
    }

    /// Append an option; a no-op once the count has reached the cap.
    pub fn add_option(&mut self, value: &str, label: &str) {
        if self.option_count < MAX_OPTIONS {
            self.options.push(ChoiceOption {
                value: value.to_string(),
                label: label.to_string(),
            });
            self.option_count += 1;
        }
    }

    /// Append an option whose label is its value.
    pub fn add_option_plain(&mut self, value: &str) {
        self.add_option(value, value);
    }

    /// Replace a stored option in place; out-of-range indices are ignored.
    pub fn set_option(&mut self, index: usize, value: &str, label: &str) {
        if let Some(opt) = self.options.get_mut(index) {
            opt.value = value.to_string();
            opt.label = label.to_string();
        }
    }

    /// The canonical value a parameter starts with when the schema document
    /// declares no default: empty for string-like types, "0" for numeric
    /// types, an all-'0' bitmap for MultiCheck.
    pub fn zero_value(&self) -> String {
        match self.field_type {
            FieldType::MultiCheck => "0".repeat(self.option_count),
            t if t.is_string_like() => String::new(),
            _ => "0".to_string(),
        }
    }
}

/// Errors raised while parsing a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document is not a valid JSON array of parameter objects.
    #[error("malformed schema document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outcome of one schema-document load.
///
/// Capacity overflow never fails the load; it is reported here so callers
/// can detect truncation instead of inferring it from mismatched counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Descriptors appended to the schema.
    pub added: usize,
    /// Document entries dropped because the schema was full.
    pub dropped_params: usize,
    /// Option entries dropped because a parameter's option list was full.
    pub dropped_options: usize,
    /// Names or labels clipped to their length caps.
    pub clipped_fields: usize,
    /// Entries that failed to parse and were stored with all defaults.
    pub malformed_entries: usize,
}

impl LoadReport {
    /// True if every document entry was stored exactly as written.
    pub fn is_clean(&self) -> bool {
        self.dropped_params == 0
            && self.dropped_options == 0
            && self.clipped_fields == 0
            && self.malformed_entries == 0
    }
}

/// Raw schema-document entry. Every key is optional; missing keys take the
/// documented defaults.
#[derive(Debug, Deserialize)]
struct ParamEntry {
    name: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    field_type: Option<TypeSpec>,
    min: Option<i32>,
    max: Option<i32>,
    default: Option<serde_json::Value>,
    options: Option<Vec<OptionEntry>>,
}

/// `type` accepts a symbolic name or a raw integer code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    Name(String),
    Code(u8),
}

#[derive(Debug, Deserialize)]
struct OptionEntry {
    #[serde(alias = "value")]
    v: serde_json::Value,
    #[serde(alias = "label")]
    l: Option<String>,
}

/// Ordered, fixed-capacity list of parameter descriptors.
#[derive(Debug, Clone)]
pub struct Schema {
    params: Vec<ParamDescriptor>,
    name_limit: usize,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(NAME_LIMIT)
    }
}

impl Schema {
    /// Create an empty schema. `name_limit` is [`NAME_LIMIT`] for the file
    /// backend or [`KV_NAME_LIMIT`] when the key-value backend is active.
    pub fn new(name_limit: usize) -> Self {
        Self {
            params: Vec::new(),
            name_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParamDescriptor> {
        self.params.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ParamDescriptor> {
        self.params.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter()
    }

    /// Find a parameter by name.
    ///
    /// Scans last-to-first like the firmware, so when a name is declared
    /// twice the most recent declaration wins. Returns `None` on a miss.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().rposition(|p| p.name == name)
    }

    /// Parse a JSON schema document and append its parameters.
    ///
    /// Unknown type names or codes fall back to [`FieldType::Text`].
    /// Entries beyond [`MAX_PARAMS`] are dropped; option entries beyond
    /// [`MAX_OPTIONS`] are dropped from storage while the declared count is
    /// kept (see [`ParamDescriptor::option_count`]). A malformed document
    /// leaves the schema untouched.
    pub fn append_json(&mut self, document: &str) -> Result<LoadReport, SchemaError> {
        let raw_entries: Vec<serde_json::Value> =
            serde_json::from_str(document).map_err(|e| {
                tracing::warn!("schema document rejected: {}", e);
                e
            })?;

        let mut report = LoadReport::default();
        for raw in raw_entries {
            if self.params.len() >= MAX_PARAMS {
                report.dropped_params += 1;
                continue;
            }

            // A malformed entry is stored with all defaults; parsing
            // continues with the remaining entries.
            let entry: ParamEntry = match serde_json::from_value(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("malformed schema entry, using defaults: {}", e);
                    report.malformed_entries += 1;
                    ParamEntry {
                        name: None,
                        label: None,
                        field_type: None,
                        min: None,
                        max: None,
                        default: None,
                        options: None,
                    }
                }
            };

            let raw_name = entry.name.unwrap_or_default();
            let name = clip(&raw_name, self.name_limit);
            if name.len() < raw_name.len() {
                tracing::warn!("parameter name '{}' clipped to '{}'", raw_name, name);
                report.clipped_fields += 1;
            }
            let raw_label = entry.label.unwrap_or_default();
            let label = clip(&raw_label, LABEL_LIMIT);
            if label.len() < raw_label.len() {
                report.clipped_fields += 1;
            }

            let field_type = match entry.field_type {
                Some(TypeSpec::Name(n)) => FieldType::from_name(&n).unwrap_or(FieldType::Text),
                Some(TypeSpec::Code(c)) => FieldType::from_code(c).unwrap_or(FieldType::Text),
                None => FieldType::Text,
            };

            let mut descr = ParamDescriptor {
                name,
                label,
                field_type,
                min: entry.min.unwrap_or(0),
                max: entry.max.unwrap_or(99999),
                default: entry.default.map(|v| value_to_string(&v)),
                options: Vec::new(),
                option_count: 0,
            };

            if let Some(opts) = entry.options {
                let declared = opts.len();
                for opt in opts.into_iter().take(MAX_OPTIONS) {
                    let value = value_to_string(&opt.v);
                    let label = opt.l.unwrap_or_else(|| value.clone());
                    descr.options.push(ChoiceOption { value, label });
                }
                if declared > MAX_OPTIONS {
                    tracing::warn!(
                        "parameter '{}': {} of {} options dropped",
                        descr.name,
                        declared - MAX_OPTIONS,
                        declared
                    );
                    report.dropped_options += declared - MAX_OPTIONS;
                }
                // Declared count is kept even when entries were dropped.
                descr.option_count = declared;
            }

            self.params.push(descr);
            report.added += 1;
        }

        if report.dropped_params > 0 {
            tracing::warn!(
                "schema full ({} parameters): {} entries dropped",
                MAX_PARAMS,
                report.dropped_params
            );
        }
        Ok(report)
    }
}

/// Render a schema-document scalar as a canonical string. Bare numbers are
/// accepted wherever the document may carry a string.
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clip(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    // Back off to a char boundary so multi-byte labels cannot split.
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
