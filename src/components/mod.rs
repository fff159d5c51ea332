pub mod canvas_editor;
pub mod control_panel;
pub mod file_panel;
pub mod popup;
