//! File-backed persistence.
//!
//! The store is a flat UTF-8 text file with one `name=value` line per
//! entry, terminated by a single newline each. The first line is reserved
//! for the device identity (`deviceName=...`). The line format cannot
//! carry embedded newlines, so they are escaped as `~` on write and
//! unescaped on read.

use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::FieldType;
use crate::state::{ConfigState, DEVICE_NAME_KEY};
use crate::storage::{ConfigStorage, StorageError};

/// Placeholder for embedded newlines in values.
const NEWLINE_ESCAPE: char = '~';

/// Line-file storage backend.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(state: &ConfigState) -> String {
        let mut out = String::new();
        out.push_str(DEVICE_NAME_KEY);
        out.push('=');
        out.push_str(&escape(state.device_name()));
        out.push('\n');
        for (index, descr) in state.schema().iter().enumerate() {
            out.push_str(descr.name());
            out.push('=');
            out.push_str(&escape(state.value_at(index)));
            out.push('\n');
        }
        out
    }
}

impl ConfigStorage for FileStorage {
    fn load(&mut self, state: &mut ConfigState) -> Result<(), StorageError> {
        if !self.path.exists() {
            // First boot: seed the file from current defaults, then read
            // it back like any other load.
            tracing::debug!("config file {:?} missing, seeding defaults", self.path);
            self.save(state)?;
        }

        let text = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::Read(format!("{:?}: {}", self.path, e)))?;

        for line in text.lines() {
            let Some((name, raw)) = line.split_once('=') else {
                continue;
            };
            let value = unescape(raw);
            if name == DEVICE_NAME_KEY {
                if !value.is_empty() {
                    state.set_device_name(&value);
                }
                continue;
            }
            match state.schema().index_of(name) {
                Some(index) => {
                    let is_password = state
                        .schema()
                        .get(index)
                        .map(|d| d.field_type() == FieldType::Password)
                        .unwrap_or(false);
                    if is_password {
                        tracing::debug!("{}=*****", name);
                    } else {
                        tracing::debug!("{}={}", name, value);
                    }
                    state.set_value_at(index, value);
                }
                // Key left over from an older schema.
                None => tracing::debug!("skipping unknown key '{}'", name),
            }
        }
        Ok(())
    }

    fn save(&mut self, state: &ConfigState) -> Result<(), StorageError> {
        let text = Self::render(state);
        fs::write(&self.path, text)
            .map_err(|e| StorageError::Write(format!("{:?}: {}", self.path, e)))?;
        tracing::debug!("wrote {} parameters to {:?}", state.len(), self.path);
        Ok(())
    }

    fn delete(&mut self) -> Result<(), StorageError> {
        fs::remove_file(&self.path)
            .map_err(|e| StorageError::Delete(format!("{:?}: {}", self.path, e)))
    }
}

fn escape(value: &str) -> String {
    value.replace('\n', &NEWLINE_ESCAPE.to_string())
}

fn unescape(value: &str) -> String {
    value.replace(NEWLINE_ESCAPE, "\n")
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
                    {"name":"ssid","type":"text","default":"mynet"},
                    {"name":"pwd","type":"password","default":"secret"},
                    {"name":"temp","type":"number","default":20},
                    {"name":"notes","type":"textarea","default":""}
                ]"#,
            )
            .unwrap();
        state
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("portal.conf"));

        let mut state = sample_state();
        state.set_device_name("garage");
        state.set_value("ssid", "othernet");
        state.set_value("temp", "33");
        storage.save(&state).unwrap();

        let mut restored = sample_state();
        storage.load(&mut restored).unwrap();
        assert_eq!(restored.device_name(), "garage");
        assert_eq!(restored.get_value("ssid"), "othernet");
        assert_eq!(restored.get_int("temp"), 33);
    }

    #[test]
    fn test_embedded_newlines_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("portal.conf"));

        let mut state = sample_state();
        state.set_value("notes", "line one\nline two");
        storage.save(&state).unwrap();

        let text = fs::read_to_string(storage.path()).unwrap();
        assert!(text.contains("notes=line one~line two\n"));

        let mut restored = sample_state();
        storage.load(&mut restored).unwrap();
        assert_eq!(restored.get_value("notes"), "line one\nline two");
    }

    #[test]
    fn test_missing_file_is_seeded_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.conf");
        let mut storage = FileStorage::new(&path);

        let mut state = sample_state();
        storage.load(&mut state).unwrap();
        assert!(path.exists());
        assert_eq!(state.get_value("ssid"), "mynet");
    }

    #[test]
    fn test_unknown_keys_skipped_and_missing_keys_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.conf");
        fs::write(&path, "deviceName=dev\nssid=saved\nrelic=ancient\n").unwrap();

        let mut state = sample_state();
        let mut storage = FileStorage::new(&path);
        storage.load(&mut state).unwrap();
        assert_eq!(state.get_value("ssid"), "saved");
        // 'temp' was absent from the file; its default survives.
        assert_eq!(state.get_int("temp"), 20);
    }

    #[test]
    fn test_first_line_is_device_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("portal.conf"));
        let mut state = sample_state();
        state.set_device_name("attic");
        storage.save(&state).unwrap();

        let text = fs::read_to_string(storage.path()).unwrap();
        assert!(text.starts_with("deviceName=attic\n"));
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("portal.conf"));
        let state = sample_state();
        storage.save(&state).unwrap();
        storage.delete().unwrap();
        assert!(!storage.path().exists());
        assert!(storage.delete().is_err());
    }
}
