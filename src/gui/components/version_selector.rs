use eframe::egui;

use crate::gui::constants::*;

/// Version drop-down; returns the newly picked version, if any
pub fn ui(ui: &mut egui::Ui, versions: &[String], active: Option<&str>) -> Option<String> {
    let mut picked = None;

    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("clang-format version:").strong());
        ui.add_space(ITEM_SPACING);

        egui::ComboBox::from_id_salt("version_selector")
            .selected_text(active.unwrap_or("-"))
            .show_ui(ui, |ui| {
                for version in versions {
                    let selected = active == Some(version.as_str());
                    if ui.selectable_label(selected, version).clicked() && !selected {
                        picked = Some(version.clone());
                    }
                }
            });
    });

    picked
}
