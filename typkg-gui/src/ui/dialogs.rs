//! Native message dialogs.
//!
//! All of these block the calling (UI) thread until dismissed.

use std::path::Path;

use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use typkg_core::RepoRef;

fn show(level: MessageLevel, title: &str, description: &str, buttons: MessageButtons) -> MessageDialogResult {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(buttons)
        .show()
}

pub fn info(title: &str, description: &str) {
    show(MessageLevel::Info, title, description, MessageButtons::Ok);
}

pub fn warning(title: &str, description: &str) {
    show(MessageLevel::Warning, title, description, MessageButtons::Ok);
}

pub fn error(title: &str, description: &str) {
    show(MessageLevel::Error, title, description, MessageButtons::Ok);
}

/// Ask whether an installed package may be replaced.
pub fn confirm_overwrite(repo: &RepoRef, _destination: &Path) -> bool {
    let result = show(
        MessageLevel::Warning,
        "Conflict",
        &format!(
            "The package '{}' already exists in the local package folder.\n\nDo you want to overwrite it?",
            repo.name()
        ),
        MessageButtons::YesNo,
    );

    matches!(result, MessageDialogResult::Yes)
}
