//! URL input and install button.

use eframe::egui::{self, Color32, RichText, Rounding, Vec2};

use crate::app::TypkgApp;
use crate::ui::colors;

/// Render the input form.
pub fn render(app: &mut TypkgApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());

    ui.vertical_centered(|ui| {
        ui.add_space(6.0);
        ui.label("Paste a GitHub repository URL:");
        ui.add_space(4.0);

        ui.add(
            egui::TextEdit::singleline(&mut app.input)
                .desired_width(ui.available_width() - 20.0)
                .hint_text("https://github.com/owner/repository"),
        );

        ui.add_space(12.0);

        let has_input = !app.input.trim().is_empty();
        let button = egui::Button::new(RichText::new("Download & install package").color(
            if has_input { Color32::WHITE } else { muted },
        ))
        .fill(if has_input {
            colors::ACCENT
        } else {
            colors::disabled_bg(ui.visuals())
        })
        .rounding(Rounding::same(8.0));

        // Stays clickable with empty input so the user gets the warning dialog
        if ui
            .add_sized(Vec2::new(220.0, 32.0), button)
            .on_hover_text_at_pointer(if has_input {
                "Install the latest release"
            } else {
                "Paste a repository URL first"
            })
            .clicked()
        {
            app.start_install();
        }
    });
}
