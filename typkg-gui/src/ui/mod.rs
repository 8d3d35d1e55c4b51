//! UI components for typkg.

pub mod dialogs;
pub mod form;
pub mod status;

// Theme-aware colors for the UI
pub mod colors {
    use eframe::egui::{Color32, Visuals};

    /// Install button background
    pub const ACCENT: Color32 = Color32::from_rgb(59, 130, 246); // Blue

    /// Get muted text color based on theme
    pub fn muted(visuals: &Visuals) -> Color32 {
        if visuals.dark_mode {
            Color32::from_rgb(156, 163, 175)
        } else {
            Color32::from_rgb(100, 100, 110)
        }
    }

    /// Get disabled button background based on theme
    pub fn disabled_bg(visuals: &Visuals) -> Color32 {
        if visuals.dark_mode {
            Color32::from_rgb(40, 40, 45)
        } else {
            Color32::from_rgb(235, 240, 250)
        }
    }
}
