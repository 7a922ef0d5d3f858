//! Generated form with one control per option of the active version

use std::collections::BTreeMap;

use eframe::egui;

use crate::constants::options::DEFAULT_SENTINEL;
use crate::gui::constants::*;
use crate::schema::{ControlKind, OptionSpec};
use crate::values::OptionValueMap;

/// What the user did to the form this frame
#[derive(Debug, Default)]
pub struct FormResponse {
    /// `(option, raw control text)` pairs edited this frame
    pub edits: Vec<(String, String)>,
    /// A control was committed (select changed, text field left or Enter pressed)
    pub commit: bool,
}

/// Text bound to each control between frames
#[derive(Debug, Default)]
pub struct OptionForm {
    buffers: BTreeMap<String, String>,
}

impl OptionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload control contents from the authoritative map
    pub fn sync(&mut self, values: &OptionValueMap) {
        self.buffers = values
            .iter()
            .map(|(name, value)| (name.clone(), value.display()))
            .collect();
    }

    pub fn ui<'a>(
        &mut self,
        ui: &mut egui::Ui,
        options: impl Iterator<Item = (&'a String, &'a OptionSpec)>,
    ) -> FormResponse {
        let mut response = FormResponse::default();

        egui::Grid::new("option_form")
            .num_columns(2)
            .striped(true)
            .spacing([ITEM_SPACING, ITEM_SPACING / 2.0])
            .show(ui, |ui| {
                for (name, spec) in options {
                    let label = ui.label(name.as_str());
                    if !spec.documentation.is_empty() {
                        label.on_hover_text(spec.documentation.as_str());
                    }

                    let buffer = self.buffers.entry(name.clone()).or_default();
                    let before = buffer.clone();
                    let committed = control(ui, name, &spec.control(), buffer);

                    if *buffer != before {
                        response.edits.push((name.clone(), buffer.clone()));
                    }
                    response.commit |= committed;
                    ui.end_row();
                }
            });

        response
    }
}

/// Draw one control; returns true when the edit should be applied now
fn control(ui: &mut egui::Ui, name: &str, kind: &ControlKind, buffer: &mut String) -> bool {
    match kind {
        ControlKind::Select(choices) => {
            let mut committed = false;
            let selected = if buffer.is_empty() {
                DEFAULT_SENTINEL.to_string()
            } else {
                buffer.clone()
            };
            egui::ComboBox::from_id_salt(name)
                .width(OPTION_CONTROL_WIDTH)
                .selected_text(selected.as_str())
                .show_ui(ui, |ui| {
                    for choice in choices {
                        if ui.selectable_label(*choice == selected, choice.as_str()).clicked()
                            && *choice != selected
                        {
                            *buffer = choice.clone();
                            committed = true;
                        }
                    }
                });
            committed
        }
        ControlKind::Text => {
            let output = ui.add(
                egui::TextEdit::singleline(buffer)
                    .id_salt(name)
                    .hint_text(DEFAULT_SENTINEL)
                    .desired_width(OPTION_CONTROL_WIDTH),
            );
            output.lost_focus()
        }
        ControlKind::Number { min } => {
            let output = ui.add(
                egui::TextEdit::singleline(buffer)
                    .id_salt(name)
                    .hint_text(DEFAULT_SENTINEL)
                    .desired_width(OPTION_CONTROL_WIDTH),
            );
            if output.changed() {
                *buffer = sanitize_number(buffer, min.is_none_or(|m| m < 0));
            }
            output.lost_focus()
        }
    }
}

/// Keep only what can be part of an integer literal
fn sanitize_number(input: &str, allow_negative: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for (index, ch) in input.trim().chars().enumerate() {
        if ch.is_ascii_digit() || (allow_negative && index == 0 && ch == '-') {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::OptionValue;

    #[test]
    fn test_sanitize_number() {
        assert_eq!(sanitize_number("12a3", false), "123");
        assert_eq!(sanitize_number("-4", true), "-4");
        assert_eq!(sanitize_number("-4", false), "4");
        assert_eq!(sanitize_number("4-", true), "4");
        assert_eq!(sanitize_number("", true), "");
    }

    #[test]
    fn test_sync_replaces_buffers() {
        let mut form = OptionForm::new();
        form.buffers.insert("Stale".into(), "x".into());

        let mut values = OptionValueMap::new();
        values.insert("ColumnLimit".into(), OptionValue::text("100"));
        values.insert("ForEachMacros".into(), OptionValue::List(vec!["a".into(), "b".into()]));
        form.sync(&values);

        assert_eq!(form.buffers.len(), 2);
        assert_eq!(form.buffers["ColumnLimit"], "100");
        assert_eq!(form.buffers["ForEachMacros"], "a, b");
    }
}
