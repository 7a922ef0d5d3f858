//! Source editor panel backed by an egui code `TextEdit`

use eframe::egui;
use egui::text::{CCursor, CCursorRange};

use crate::derive::EditorHints;
use crate::editor::{Editor, Selection};
use crate::gui::constants::*;

pub struct CodeEditor {
    text: String,
    selection: Selection,
    /// Selection to push into the widget on the next frame
    restore: Option<Selection>,
}

impl CodeEditor {
    pub fn new(text: String) -> Self {
        Self {
            text,
            selection: Selection::cursor(0, 0),
            restore: None,
        }
    }

    /// Draw the editor; returns true when the user changed the text
    pub fn ui(&mut self, ui: &mut egui::Ui, hints: EditorHints, busy: bool) -> bool {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!(
                    "Tab width: {}   Column limit: {}",
                    hints.tab_width, hints.column_limit
                ))
                .small()
                .weak(),
            );
            if busy {
                ui.spinner();
            }
        });
        ui.add_space(ITEM_SPACING / 2.0);

        let mut changed = false;
        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let mut output = egui::TextEdit::multiline(&mut self.text)
                    .id_salt("code_editor")
                    .code_editor()
                    .desired_rows(EDITOR_ROWS)
                    .desired_width(f32::INFINITY)
                    .show(ui);

                changed = output.response.changed();

                if let Some(selection) = self.restore.take() {
                    let (start, end) = selection.to_char_offsets(&self.text);
                    output
                        .state
                        .cursor
                        .set_char_range(Some(CCursorRange::two(CCursor::new(start), CCursor::new(end))));
                    output.state.store(ui.ctx(), output.response.id);
                    self.selection = selection;
                } else if let Some(range) = output.cursor_range {
                    let (a, b) = (range.primary.index, range.secondary.index);
                    self.selection = Selection::from_char_offsets(&self.text, a.min(b), a.max(b));
                }
            });

        changed
    }
}

impl Editor for CodeEditor {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.restore = Some(selection);
    }
}
