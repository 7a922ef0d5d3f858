//! Reusable panels of the configurator window

pub mod code_editor;
pub mod option_form;
pub mod version_selector;
