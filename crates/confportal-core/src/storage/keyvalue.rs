//! Key-value persistence.
//!
//! Each parameter is written under its own key in a namespaced store with
//! a type-appropriate encoding: string-like types store raw strings
//! (including the TextArea text and the MultiCheck bitmap), Checkbox,
//! Range and Number store `i32`, Float stores `f32`. One reserved
//! `deviceName` entry carries the device identity.
//!
//! The actual store (NVS on an ESP32, or [`MemoryKeyValue`] in tests and
//! demos) sits behind [`KeyValueBackend`]. Reads return `Option`: the
//! firmware signalled "key absent" with the sentinel `0x7FFF_FFFF`, which
//! collided with a legitimately stored value; the explicit signal replaces
//! that documented ambiguity.

use std::collections::HashMap;

use crate::schema::FieldType;
use crate::state::{ConfigState, DEVICE_NAME_KEY};
use crate::storage::{ConfigStorage, StorageError};

/// A namespaced typed key-value store, the external collaborator behind
/// the key-value backend.
///
/// Writes return `false` on failure, mirroring the size-written contract
/// of the underlying flash API. There is no per-key delete; [`Self::clear`]
/// drops the whole namespace.
pub trait KeyValueBackend {
    fn get_string(&self, key: &str) -> Option<String>;
    fn put_string(&mut self, key: &str, value: &str) -> bool;

    fn get_i32(&self, key: &str) -> Option<i32>;
    fn put_i32(&mut self, key: &str, value: i32) -> bool;

    fn get_f32(&self, key: &str) -> Option<f32>;
    fn put_f32(&mut self, key: &str, value: f32) -> bool;

    fn contains(&self, key: &str) -> bool;

    /// Remove every entry in the namespace.
    fn clear(&mut self) -> bool;
}

/// Key-value storage backend over any [`KeyValueBackend`].
#[derive(Debug)]
pub struct KeyValueStorage<B: KeyValueBackend> {
    backend: B,
}

impl<B: KeyValueBackend> KeyValueStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: KeyValueBackend> ConfigStorage for KeyValueStorage<B> {
    fn load(&mut self, state: &mut ConfigState) -> Result<(), StorageError> {
        if let Some(name) = self.backend.get_string(DEVICE_NAME_KEY) {
            state.set_device_name(&name);
        }

        for index in 0..state.len() {
            let descr = match state.schema().get(index) {
                Some(d) => d,
                None => continue,
            };
            let key = descr.name().to_string();
            let field_type = descr.field_type();

            // Absent key: the schema default placed at load-schema time
            // stays in effect.
            let stored = match field_type {
                FieldType::Checkbox | FieldType::Range | FieldType::Number => {
                    self.backend.get_i32(&key).map(|v| v.to_string())
                }
                FieldType::Float => self.backend.get_f32(&key).map(|v| v.to_string()),
                _ => self.backend.get_string(&key),
            };

            if let Some(value) = stored {
                if field_type == FieldType::Password {
                    tracing::debug!("loaded {}=*****", key);
                } else {
                    tracing::debug!("loaded {}={}", key, value);
                }
                state.set_value_at(index, value);
            } else {
                tracing::debug!("no stored value for '{}', keeping default", key);
            }
        }
        Ok(())
    }

    fn save(&mut self, state: &ConfigState) -> Result<(), StorageError> {
        let mut all_ok = self.backend.put_string(DEVICE_NAME_KEY, state.device_name());

        for (index, descr) in state.schema().iter().enumerate() {
            let key = descr.name();
            let raw = state.value_at(index);
            let ok = match descr.field_type() {
                FieldType::Checkbox | FieldType::Range | FieldType::Number => {
                    self.backend.put_i32(key, crate::state::leading_int(raw))
                }
                FieldType::Float => self.backend.put_f32(key, crate::state::leading_float(raw)),
                _ => self.backend.put_string(key, raw),
            };
            if !ok {
                tracing::warn!("key-value write failed for '{}'", key);
            }
            all_ok &= ok;
        }

        // Earlier writes stay in place; there is no atomicity across
        // entries.
        if all_ok {
            Ok(())
        } else {
            Err(StorageError::Write(
                "one or more key-value writes failed".to_string(),
            ))
        }
    }

    fn delete(&mut self) -> Result<(), StorageError> {
        if self.backend.clear() {
            Ok(())
        } else {
            Err(StorageError::Delete(
                "could not clear the namespace".to_string(),
            ))
        }
    }
}

/// Typed entry of the in-memory store.
#[derive(Debug, Clone, PartialEq)]
enum KvEntry {
    Str(String),
    Int(i32),
    Float(f32),
}

/// In-memory [`KeyValueBackend`], used by tests and the demo server.
#[derive(Debug, Default)]
pub struct MemoryKeyValue {
    entries: HashMap<String, KvEntry>,
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueBackend for MemoryKeyValue {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.entries.get(key) {
            Some(KvEntry::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn put_string(&mut self, key: &str, value: &str) -> bool {
        self.entries
            .insert(key.to_string(), KvEntry::Str(value.to_string()));
        true
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(KvEntry::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn put_i32(&mut self, key: &str, value: i32) -> bool {
        self.entries.insert(key.to_string(), KvEntry::Int(value));
        true
    }

    fn get_f32(&self, key: &str) -> Option<f32> {
        match self.entries.get(key) {
            Some(KvEntry::Float(v)) => Some(*v),
            _ => None,
        }
    }

    fn put_f32(&mut self, key: &str, value: f32) -> bool {
        self.entries.insert(key.to_string(), KvEntry::Float(value));
        true
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn clear(&mut self) -> bool {
        self.entries.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_state() -> ConfigState {
        let mut state = ConfigState::with_name_limit(crate::schema::KV_NAME_LIMIT);
        state
            .load_schema(
                r#"[
                    {"name":"ssid","type":"text","default":"mynet"},
                    {"name":"temp","type":"number","default":20},
                    {"name":"ratio","type":"float","default":"1.5"},
                    {"name":"days","type":"multicheck",
                     "options":[{"v":"mo","l":"Mon"},{"v":"tu","l":"Tue"},{"v":"we","l":"Wed"}]}
                ]"#,
            )
            .unwrap();
        state
    }

    #[test]
    fn test_typed_round_trip() {
        let mut storage = KeyValueStorage::new(MemoryKeyValue::new());
        let mut state = sample_state();
        state.set_device_name("garage");
        state.set_value("ssid", "othernet");
        state.set_value("temp", "42");
        state.set_value("ratio", "2.25");
        state.set_value("days", "101");
        storage.save(&state).unwrap();

        // Values land with their typed encodings.
        assert_eq!(storage.backend().get_i32("temp"), Some(42));
        assert_eq!(storage.backend().get_f32("ratio"), Some(2.25));
        assert_eq!(storage.backend().get_string("days").as_deref(), Some("101"));

        let mut restored = sample_state();
        storage.load(&mut restored).unwrap();
        assert_eq!(restored.device_name(), "garage");
        assert_eq!(restored.get_value("ssid"), "othernet");
        assert_eq!(restored.get_value("temp"), "42");
        assert_eq!(restored.get_value("ratio"), "2.25");
        assert_eq!(restored.get_value("days"), "101");
    }

    #[test]
    fn test_absent_key_keeps_schema_default() {
        let mut storage = KeyValueStorage::new(MemoryKeyValue::new());
        let mut state = sample_state();
        storage.load(&mut state).unwrap();
        // Never written: the declared default survives, no sentinel leaks.
        assert_eq!(state.get_int("temp"), 20);
        assert_eq!(state.get_value("ssid"), "mynet");
    }

    #[test]
    fn test_delete_clears_namespace() {
        let mut storage = KeyValueStorage::new(MemoryKeyValue::new());
        let state = sample_state();
        storage.save(&state).unwrap();
        assert!(!storage.backend().is_empty());
        storage.delete().unwrap();
        assert!(storage.backend().is_empty());
    }

    /// Backend that rejects writes to one key, for partial-failure tests.
    struct FlakyBackend {
        inner: MemoryKeyValue,
        poison: String,
    }

    impl KeyValueBackend for FlakyBackend {
        fn get_string(&self, key: &str) -> Option<String> {
            self.inner.get_string(key)
        }
        fn put_string(&mut self, key: &str, value: &str) -> bool {
            key != self.poison && self.inner.put_string(key, value)
        }
        fn get_i32(&self, key: &str) -> Option<i32> {
            self.inner.get_i32(key)
        }
        fn put_i32(&mut self, key: &str, value: i32) -> bool {
            key != self.poison && self.inner.put_i32(key, value)
        }
        fn get_f32(&self, key: &str) -> Option<f32> {
            self.inner.get_f32(key)
        }
        fn put_f32(&mut self, key: &str, value: f32) -> bool {
            key != self.poison && self.inner.put_f32(key, value)
        }
        fn contains(&self, key: &str) -> bool {
            self.inner.contains(key)
        }
        fn clear(&mut self) -> bool {
            self.inner.clear()
        }
    }

    #[test]
    fn test_single_failed_write_degrades_whole_save() {
        let backend = FlakyBackend {
            inner: MemoryKeyValue::new(),
            poison: "ratio".to_string(),
        };
        let mut storage = KeyValueStorage::new(backend);
        let state = sample_state();

        let result = storage.save(&state);
        assert!(matches!(result, Err(StorageError::Write(_))));
        // Writes that succeeded before the failure are not rolled back.
        assert_eq!(storage.backend().get_i32("temp"), Some(20));
        assert!(!storage.backend().contains("ratio"));
    }
}
