//! Session controller.
//!
//! Orchestrates one request/response cycle: decode the submission into the
//! value store, persist if a save action was requested, fire the matching
//! callbacks, then render the next form or terminate. The controller
//! models exactly one unauthenticated form session and is not reentrant;
//! the transport must serve one request at a time.

use serde_json::{Map, Value};

use confportal_core::document::{export_document, export_json};
use confportal_core::{ConfigState, ConfigStorage};

use crate::form::{
    apply_submission, has_field, render_form, ButtonSet, SaveStatus, ACTION_CANCEL, ACTION_DELETE,
    ACTION_DONE, ACTION_RESTART, ACTION_SAVE,
};

/// What one handled request produced.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Send this page as the response body.
    Page(String),
    /// A terminal action (restart/done/cancel/delete) ended the session;
    /// no body is rendered this cycle.
    Terminated,
}

type SaveTextCallback = Box<dyn FnMut(&str) + Send>;
type SaveDocCallback = Box<dyn FnMut(&Map<String, Value>) + Send>;
type UnitCallback = Box<dyn FnMut() + Send>;
type DeleteCallback = Box<dyn FnMut(&str) + Send>;

/// The per-request orchestration state machine.
///
/// Owns the schema/value store pair and the persistence backend for its
/// whole lifetime.
pub struct SessionController<S: ConfigStorage> {
    state: ConfigState,
    storage: S,
    buttons: ButtonSet,
    on_save_text: Option<SaveTextCallback>,
    on_save_doc: Option<SaveDocCallback>,
    on_save: Option<UnitCallback>,
    on_done: Option<SaveDocCallback>,
    on_cancel: Option<UnitCallback>,
    on_delete: Option<DeleteCallback>,
    restart_hook: Option<UnitCallback>,
}

impl<S: ConfigStorage> SessionController<S> {
    pub fn new(state: ConfigState, storage: S) -> Self {
        Self {
            state,
            storage,
            buttons: ButtonSet::Config,
            on_save_text: None,
            on_save_doc: None,
            on_save: None,
            on_done: None,
            on_cancel: None,
            on_delete: None,
            restart_hook: None,
        }
    }

    pub fn state(&self) -> &ConfigState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConfigState {
        &mut self.state
    }

    /// Select the trailing form controls.
    pub fn set_buttons(&mut self, buttons: ButtonSet) {
        self.buttons = buttons;
    }

    /// Register the string form of the on-save callback.
    pub fn on_save_text(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_save_text = Some(Box::new(callback));
    }

    /// Register the structured-document form of the on-save callback.
    pub fn on_save_document(&mut self, callback: impl FnMut(&Map<String, Value>) + Send + 'static) {
        self.on_save_doc = Some(Box::new(callback));
    }

    /// Register the no-argument form of the on-save callback.
    pub fn on_save(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_save = Some(Box::new(callback));
    }

    pub fn on_done(&mut self, callback: impl FnMut(&Map<String, Value>) + Send + 'static) {
        self.on_done = Some(Box::new(callback));
    }

    pub fn on_cancel(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_cancel = Some(Box::new(callback));
    }

    /// The delete callback receives the device identity.
    pub fn on_delete(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_delete = Some(Box::new(callback));
    }

    /// Hook standing in for the device reset collaborator; fired after a
    /// restart action has been persisted.
    pub fn on_restart(&mut self, callback: impl FnMut() + Send + 'static) {
        self.restart_hook = Some(Box::new(callback));
    }

    /// Overlay persisted values onto the store.
    pub fn load(&mut self) -> Result<(), confportal_core::StorageError> {
        self.storage.load(&mut self.state)
    }

    /// Persist the current values.
    pub fn save(&mut self) -> Result<(), confportal_core::StorageError> {
        self.storage.save(&self.state)
    }

    /// Remove the whole stored configuration.
    pub fn delete_config(&mut self) -> Result<(), confportal_core::StorageError> {
        self.storage.delete()
    }

    /// Handle one request cycle.
    ///
    /// An empty field list is the initial page load and renders the
    /// current values directly. Terminal actions (restart, done, cancel,
    /// delete) suppress rendering for this cycle.
    pub fn handle_request(&mut self, fields: &[(String, String)]) -> SessionOutcome {
        let mut status = SaveStatus::None;

        if !fields.is_empty() {
            apply_submission(&mut self.state, fields);

            if has_field(fields, ACTION_SAVE) || has_field(fields, ACTION_RESTART) {
                status = match self.storage.save(&self.state) {
                    Ok(()) => SaveStatus::Saved,
                    Err(e) => {
                        tracing::warn!("saving configuration failed: {}", e);
                        SaveStatus::Error
                    }
                };
            }
        }

        if has_field(fields, ACTION_SAVE) {
            // All registered save forms fire, in this order.
            if let Some(cb) = self.on_save_text.as_mut() {
                cb(&export_json(&self.state));
            }
            if let Some(cb) = self.on_save_doc.as_mut() {
                cb(&export_document(&self.state));
            }
            if let Some(cb) = self.on_save.as_mut() {
                cb();
            }
        }

        let mut terminated = false;
        if has_field(fields, ACTION_RESTART) {
            if let Some(cb) = self.restart_hook.as_mut() {
                cb();
            }
            terminated = true;
        }
        if has_field(fields, ACTION_DONE) {
            if let Some(cb) = self.on_done.as_mut() {
                cb(&export_document(&self.state));
                terminated = true;
            }
        }
        if has_field(fields, ACTION_CANCEL) {
            if let Some(cb) = self.on_cancel.as_mut() {
                cb();
                terminated = true;
            }
        }
        if has_field(fields, ACTION_DELETE) {
            if let Some(cb) = self.on_delete.as_mut() {
                let name = self.state.device_name().to_string();
                cb(&name);
                terminated = true;
            }
        }

        if terminated {
            SessionOutcome::Terminated
        } else {
            SessionOutcome::Page(render_form(&self.state, self.buttons, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confportal_core::storage::{MemoryKeyValue, KeyValueStorage, StorageError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn owned(fields: &[(&str, &str)]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    fn sample_controller() -> SessionController<KeyValueStorage<MemoryKeyValue>> {
        let mut state = ConfigState::new();
        state
            .load_schema(
                r#"[
                    {"name":"temp","label":"Threshold","type":"number","min":0,"max":100,"default":20},
                    {"name":"days","label":"Days","type":"multicheck",
                     "options":[{"v":"mo","l":"Mon"},{"v":"tu","l":"Tue"},{"v":"we","l":"Wed"}]}
                ]"#,
            )
            .unwrap();
        SessionController::new(state, KeyValueStorage::new(MemoryKeyValue::new()))
    }

    #[test]
    fn test_initial_load_renders_defaults() {
        let mut controller = sample_controller();
        match controller.handle_request(&[]) {
            SessionOutcome::Page(page) => {
                assert!(page.contains("value='20' name='temp'"));
            }
            SessionOutcome::Terminated => panic!("initial load must render"),
        }
    }

    #[test]
    fn test_save_cycle_fires_callbacks_in_order() {
        let mut controller = sample_controller();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o = order.clone();
        controller.on_save_text(move |json| {
            assert!(json.contains("\"temp\":20"));
            o.lock().unwrap().push("text");
        });
        let o = order.clone();
        controller.on_save_document(move |doc| {
            assert_eq!(doc["temp"], serde_json::json!(20));
            assert_eq!(doc["days"], serde_json::json!(2));
            o.lock().unwrap().push("doc");
        });
        let o = order.clone();
        controller.on_save(move || o.lock().unwrap().push("unit"));

        let outcome = controller.handle_request(&owned(&[("days", "1"), ("SAVE", "")]));
        assert!(matches!(outcome, SessionOutcome::Page(_)));
        assert_eq!(controller.state().get_value("days"), "010");
        assert_eq!(*order.lock().unwrap(), vec!["text", "doc", "unit"]);

        // The save persisted: a fresh load sees the value.
        controller.state_mut().set_value("days", "000");
        controller.load().unwrap();
        assert_eq!(controller.state().get_value("days"), "010");
    }

    #[test]
    fn test_saved_banner_and_no_save_button() {
        let mut controller = sample_controller();
        match controller.handle_request(&owned(&[("temp", "33"), ("SAVE", "")])) {
            SessionOutcome::Page(page) => {
                assert!(page.contains("SAVED!"));
                assert!(!page.contains("name='SAVE'"));
            }
            SessionOutcome::Terminated => panic!("save without restart renders"),
        }
    }

    struct BrokenStorage;
    impl ConfigStorage for BrokenStorage {
        fn load(&mut self, _state: &mut ConfigState) -> Result<(), StorageError> {
            Err(StorageError::Read("broken".into()))
        }
        fn save(&mut self, _state: &ConfigState) -> Result<(), StorageError> {
            Err(StorageError::Write("broken".into()))
        }
        fn delete(&mut self) -> Result<(), StorageError> {
            Err(StorageError::Delete("broken".into()))
        }
    }

    #[test]
    fn test_failed_save_shows_error_banner() {
        let mut state = ConfigState::new();
        state
            .load_schema(r#"[{"name":"temp","type":"number","default":20}]"#)
            .unwrap();
        let mut controller = SessionController::new(state, BrokenStorage);

        match controller.handle_request(&owned(&[("SAVE", "")])) {
            SessionOutcome::Page(page) => {
                assert!(page.contains("ERROR IN SAVING"));
                assert!(page.contains("name='SAVE'"));
            }
            SessionOutcome::Terminated => panic!("failed save still renders"),
        }
    }

    #[test]
    fn test_restart_is_terminal_after_persisting() {
        let mut controller = sample_controller();
        let restarted = Arc::new(AtomicUsize::new(0));
        let r = restarted.clone();
        controller.on_restart(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = controller.handle_request(&owned(&[("temp", "50"), ("RST", "")]));
        assert_eq!(outcome, SessionOutcome::Terminated);
        assert_eq!(restarted.load(Ordering::SeqCst), 1);

        // Persisted before the restart fired.
        controller.state_mut().set_value("temp", "0");
        controller.load().unwrap();
        assert_eq!(controller.state().get_int("temp"), 50);
    }

    #[test]
    fn test_done_cancel_delete_terminate() {
        let mut controller = sample_controller();
        controller.state_mut().set_device_name("garage");

        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        controller.on_done(move |doc| {
            assert!(doc.contains_key("temp"));
            d.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(
            controller.handle_request(&owned(&[("DONE", "")])),
            SessionOutcome::Terminated
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);

        let cancelled = Arc::new(AtomicUsize::new(0));
        let c = cancelled.clone();
        controller.on_cancel(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(
            controller.handle_request(&owned(&[("CANCEL", "")])),
            SessionOutcome::Terminated
        );
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);

        let deleted_name = Arc::new(std::sync::Mutex::new(String::new()));
        let n = deleted_name.clone();
        controller.on_delete(move |name| {
            *n.lock().unwrap() = name.to_string();
        });
        assert_eq!(
            controller.handle_request(&owned(&[("DELETE", "")])),
            SessionOutcome::Terminated
        );
        assert_eq!(&*deleted_name.lock().unwrap(), "garage");
    }

    #[test]
    fn test_unregistered_terminal_action_still_renders() {
        let mut controller = sample_controller();
        // No on_done callback: the action is ignored and the form renders.
        assert!(matches!(
            controller.handle_request(&owned(&[("DONE", "")])),
            SessionOutcome::Page(_)
        ));
    }
}
