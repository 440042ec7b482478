//! HTML form codec.
//!
//! The encoder renders the schema and current values into the portal's
//! fixed form layout, one block per parameter in descriptor order. The
//! decoder applies submitted `(name, value)` pairs back onto the value
//! store. Submissions are a sparse patch: a field that is absent leaves
//! its value unchanged, except for the checkbox family where absence
//! means "unchecked".
//!
//! Every render builds a fresh string; there is no shared scratch buffer.

use std::fmt::Write;

use confportal_core::state::DEVICE_NAME_KEY;
use confportal_core::{ConfigState, FieldType};

/// Reserved form field requesting persistence.
pub const ACTION_SAVE: &str = "SAVE";
/// Reserved form field requesting persistence followed by a device restart.
pub const ACTION_RESTART: &str = "RST";
/// Reserved form field closing the session with results.
pub const ACTION_DONE: &str = "DONE";
/// Reserved form field closing the session without saving.
pub const ACTION_CANCEL: &str = "CANCEL";
/// Reserved form field deleting the stored configuration.
pub const ACTION_DELETE: &str = "DELETE";

/// Outcome of the most recent persistence attempt, driving the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// No save was attempted this cycle.
    None,
    /// The save succeeded.
    Saved,
    /// The save failed; the form shows the error banner.
    Error,
}

/// Which trailing controls the form renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonSet {
    /// Full configuration mode: device-name field plus Save and Restart.
    Config,
    /// Reduced mode with a subset of Done/Cancel/Delete.
    Actions {
        done: bool,
        cancel: bool,
        delete: bool,
    },
}

const PAGE_START: &str = "<!DOCTYPE HTML>\n\
<html lang='en'>\n\
<head>\n\
<meta http-equiv='Content-Type' content='text/html; charset=utf-8'>\n\
<meta name='viewport' content='width=320' />\n\
<title>Config Portal</title>\n\
<style>\n\
body { font-family: Arial, Helvetica, Sans-Serif; font-size: 12pt; width: 320px; }\n\
.title { font-weight: bold; text-align: center; width: 100%; padding: 5px; }\n\
.row { width: 100%; padding: 5px; text-align: center; }\n\
button { font-size: 14pt; width: 150px; border-radius: 10px; margin: 5px; }\n\
</style>\n\
</head>\n\
<body>\n\
<div id='main_div' style='margin-left:15px;margin-right:15px;'>\n";

const PAGE_END: &str = "</form>\n</div>\n</body>\n</html>\n";

/// Render the full form page for the current state.
pub fn render_form(state: &ConfigState, buttons: ButtonSet, status: SaveStatus) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(PAGE_START);
    let _ = writeln!(
        out,
        "<div class='title'>Config Portal {}</div>",
        escape(state.device_name())
    );
    out.push_str("<form method='post'>\n");

    if buttons == ButtonSet::Config {
        push_simple(&mut out, DEVICE_NAME_KEY, "device Name", "text", state.device_name());
    }

    for (index, descr) in state.schema().iter().enumerate() {
        let value = state.value_at(index);
        match descr.field_type() {
            FieldType::Text | FieldType::Float => {
                push_simple(&mut out, descr.name(), descr.label(), "text", value)
            }
            FieldType::Password => {
                push_simple(&mut out, descr.name(), descr.label(), "password", value)
            }
            FieldType::Date => push_simple(&mut out, descr.name(), descr.label(), "date", value),
            FieldType::Time => push_simple(&mut out, descr.name(), descr.label(), "time", value),
            FieldType::Color => push_simple(&mut out, descr.name(), descr.label(), "color", value),
            FieldType::TextArea => {
                // max = rows, min = cols
                let _ = writeln!(out, "  <div class='row'><b>{}</b></div>", escape(descr.label()));
                let _ = writeln!(
                    out,
                    "  <div class='row'><textarea rows='{}' cols='{}' name='{}'>{}</textarea></div>",
                    descr.max,
                    descr.min,
                    escape(descr.name()),
                    escape(value)
                );
            }
            FieldType::Number => {
                let _ = writeln!(out, "  <div class='row'><b>{}</b></div>", escape(descr.label()));
                let _ = writeln!(
                    out,
                    "  <div class='row'><input type='number' min='{}' max='{}' value='{}' name='{}'></div>",
                    descr.min,
                    descr.max,
                    escape(value),
                    escape(descr.name())
                );
            }
            FieldType::Range => {
                let _ = writeln!(out, "  <div class='row'><b>{}</b></div>", escape(descr.label()));
                let _ = writeln!(
                    out,
                    "  <div class='row'>{}&nbsp;<input type='range' min='{}' max='{}' value='{}' name='{}'>&nbsp;{}</div>",
                    descr.min,
                    descr.min,
                    descr.max,
                    escape(value),
                    escape(descr.name()),
                    descr.max
                );
            }
            FieldType::Checkbox => {
                let checked = if value != "0" { " checked" } else { "" };
                let _ = writeln!(
                    out,
                    "  <div class='row'><b>{}</b><input type='checkbox'{} name='{}'></div>",
                    escape(descr.label()),
                    checked,
                    escape(descr.name())
                );
            }
            FieldType::Radio => {
                let _ = writeln!(out, " <div class='row'><b>{}</b></div>", escape(descr.label()));
                for option in descr.options() {
                    let checked = if option.value == value { " checked" } else { "" };
                    let _ = writeln!(
                        out,
                        "  <div class='row'><input type='radio' name='{}' value='{}'{}>{}</div>",
                        escape(descr.name()),
                        escape(&option.value),
                        checked,
                        escape(&option.label)
                    );
                }
            }
            FieldType::Select => {
                let _ = writeln!(out, " <div class='row'><b>{}</b></div>", escape(descr.label()));
                let _ = writeln!(out, " <div class='row'><select name='{}'>", escape(descr.name()));
                for option in descr.options() {
                    let selected = if option.value == value { " selected" } else { "" };
                    let _ = writeln!(
                        out,
                        "  <option value='{}'{}>{}</option>",
                        escape(&option.value),
                        selected,
                        escape(&option.label)
                    );
                }
                out.push_str(" </select></div>\n");
            }
            FieldType::MultiCheck => {
                let _ = writeln!(out, " <div class='row'><b>{}</b></div>", escape(descr.label()));
                out.push_str(" <div class='row'><fieldset style='text-align:left;'>\n");
                for (opt_index, option) in descr.options().iter().enumerate() {
                    let checked = if confportal_core::state::bitmap_is_set(value, opt_index) {
                        " checked"
                    } else {
                        ""
                    };
                    let _ = writeln!(
                        out,
                        "  <input type='checkbox' name='{}' value='{}'{}>{}<br>",
                        escape(descr.name()),
                        opt_index,
                        checked,
                        escape(&option.label)
                    );
                }
                out.push_str(" </fieldset></div>\n");
            }
        }
    }

    if status == SaveStatus::Saved {
        out.push_str("  <div class='row'><b>SAVED!</b></div>\n");
    }
    if status == SaveStatus::Error {
        out.push_str("  <div class='row'><b>ERROR IN SAVING</b></div>\n");
    }

    match buttons {
        ButtonSet::Config => {
            out.push_str("<div class='row'>");
            // After a successful save only the restart control remains.
            if status != SaveStatus::Saved {
                push_button(&mut out, ACTION_SAVE, "Save");
            }
            push_button(&mut out, ACTION_RESTART, "Restart");
            out.push_str("</div>\n");
        }
        ButtonSet::Actions {
            done,
            cancel,
            delete,
        } => {
            out.push_str("<div class='row'>");
            if done {
                push_button(&mut out, ACTION_DONE, "Done");
            }
            if cancel {
                push_button(&mut out, ACTION_CANCEL, "Cancel");
            }
            if delete {
                push_button(&mut out, ACTION_DELETE, "Delete");
            }
            out.push_str("</div>\n");
        }
    }

    out.push_str(PAGE_END);
    out
}

fn push_simple(out: &mut String, name: &str, label: &str, input_type: &str, value: &str) {
    let _ = writeln!(out, "  <div class='row'><b>{}</b></div>", escape(label));
    let _ = writeln!(
        out,
        "  <div class='row'><input type='{}' value='{}' name='{}'></div>",
        input_type,
        escape(value),
        escape(name)
    );
}

fn push_button(out: &mut String, action: &str, label: &str) {
    let _ = writeln!(out, "<button type='submit' name='{}'>{}</button>", action, label);
}

/// True if a submitted field with the given name is present.
pub fn has_field(fields: &[(String, String)], name: &str) -> bool {
    fields.iter().any(|(n, _)| n == name)
}

fn first_field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Apply submitted form fields onto the value store.
pub fn apply_submission(state: &mut ConfigState, fields: &[(String, String)]) {
    if let Some(name) = first_field(fields, DEVICE_NAME_KEY) {
        state.set_device_name(name);
    }

    for index in 0..state.len() {
        let descr = match state.schema().get(index) {
            Some(d) => d,
            None => continue,
        };
        let name = descr.name().to_string();
        match descr.field_type() {
            FieldType::Checkbox => {
                let value = if has_field(fields, &name) { "1" } else { "0" };
                state.set_value_at(index, value.to_string());
            }
            FieldType::MultiCheck => {
                let mut selected = vec![false; descr.option_count()];
                for (field, value) in fields {
                    if field == &name {
                        // The submitted value is the option index.
                        if let Ok(opt_index) = value.trim().parse::<usize>() {
                            if opt_index < selected.len() {
                                selected[opt_index] = true;
                            }
                        }
                    }
                }
                let bitmap: String = selected.iter().map(|&s| if s { '1' } else { '0' }).collect();
                state.set_value_at(index, bitmap);
            }
            _ => {
                if let Some(value) = first_field(fields, &name) {
                    state.set_value_at(index, value.to_string());
                }
            }
        }
    }
}

/// Minimal HTML attribute/text escaping for interpolated values.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
