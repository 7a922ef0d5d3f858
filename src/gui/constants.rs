//! GUI-specific constants for layout and status colors

use egui;

/// Window dimensions
pub const WINDOW_MIN_WIDTH: f32 = 800.0;
pub const WINDOW_MIN_HEIGHT: f32 = 500.0;

/// Layout spacing
pub const SECTION_SPACING: f32 = 15.0;
pub const ITEM_SPACING: f32 = 8.0;
pub const PADDING: f32 = 6.0;

/// Options panel
pub const OPTIONS_PANEL_WIDTH: f32 = 420.0;
pub const OPTION_CONTROL_WIDTH: f32 = 160.0;

/// Code editor
pub const EDITOR_ROWS: usize = 40;

/// Status colors
pub const STATUS_OK: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);
pub const STATUS_ERROR: egui::Color32 = egui::Color32::from_rgb(200, 0, 0);
pub const STATUS_BUSY: egui::Color32 = egui::Color32::from_rgb(200, 200, 0);
pub const STATUS_WARNING: egui::Color32 = egui::Color32::from_rgb(230, 140, 0);
