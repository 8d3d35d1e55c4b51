//! Status bar at the bottom of the window.

use eframe::egui::{self, RichText};

use crate::app::TypkgApp;
use crate::ui::colors;

/// Render the status bar.
pub fn render(app: &TypkgApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());

    ui.horizontal(|ui| {
        if let Some((msg, _)) = &app.status_message {
            ui.label(RichText::new(msg).size(11.0).color(muted));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if app.is_installing() {
                ui.spinner();
                ui.separator();
            }

            let path_str = app.package_root().to_string_lossy();
            let display_path = match path_str.char_indices().rev().nth(36) {
                Some((idx, _)) if path_str.chars().count() > 40 => {
                    format!("...{}", &path_str[idx..])
                }
                _ => path_str.to_string(),
            };
            ui.label(
                RichText::new(format!("📁 {}", display_path))
                    .size(11.0)
                    .color(muted),
            )
            .on_hover_text(app.package_root().display().to_string());
        });
    });
}
