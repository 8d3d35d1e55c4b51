//! Main application state and update loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::runtime::Runtime;
use tracing::info;

use typkg_core::{GateDecision, InstallOutcome, InstallRequest, PendingInstall, Pipeline, RepoRef};

use crate::ui;
use crate::ui::dialogs;

/// How often to poll running installs for their outcome.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Application State
// =============================================================================

/// Main application state. Lives on the UI thread only.
pub struct TypkgApp {
    /// Tokio runtime that runs install tasks.
    runtime: Runtime,

    /// Shared install pipeline.
    pipeline: Arc<Pipeline>,

    /// Current URL input.
    pub input: String,

    /// Installs that have not reported an outcome yet.
    pending: Vec<PendingInstall>,

    /// Status message.
    pub status_message: Option<(String, chrono::DateTime<chrono::Utc>)>,
}

impl TypkgApp {
    /// Create a new application instance.
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: Runtime, pipeline: Arc<Pipeline>) -> Self {
        info!("Initializing TypkgApp");

        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        cc.egui_ctx.set_style(style);

        Self {
            runtime,
            pipeline,
            input: String::new(),
            pending: Vec::new(),
            status_message: None,
        }
    }

    pub fn package_root(&self) -> &Path {
        &self.pipeline.config().package_root
    }

    pub fn is_installing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Validate the input, run the conflict gate, then start an install task.
    pub fn start_install(&mut self) {
        let url = self.input.trim().to_string();

        if url.is_empty() {
            dialogs::warning("Empty input", "Please paste a GitHub repository URL.");
            return;
        }

        let repo = match RepoRef::parse(&url) {
            Ok(repo) => repo,
            Err(e) => {
                dialogs::error("Invalid URL", &format!("Could not process the URL:\n{}", e));
                return;
            }
        };

        let overwrite = match self.pipeline.gate().check(&repo, dialogs::confirm_overwrite) {
            GateDecision::Proceed { overwrite } => overwrite,
            GateDecision::Abort => {
                self.set_status("Installation cancelled");
                return;
            }
        };

        let name = repo.name().to_string();
        let request = InstallRequest::new(repo, url, overwrite);
        self.pending
            .push(self.pipeline.spawn(self.runtime.handle(), request));
        self.set_status(&format!("Installing {}...", name));
    }

    /// Drain finished installs and present their outcomes.
    fn check_install_completion(&mut self, ctx: &egui::Context) {
        let mut finished = Vec::new();
        self.pending.retain_mut(|pending| match pending.poll() {
            Some(outcome) => {
                finished.push(outcome);
                false
            }
            None => true,
        });

        for outcome in finished {
            self.present(outcome, ctx);
        }
    }

    /// Show one dialog for an outcome. Success and hard failures end the session.
    fn present(&mut self, outcome: InstallOutcome, ctx: &egui::Context) {
        match outcome {
            InstallOutcome::Success {
                package_name,
                destination,
            } => {
                dialogs::info(
                    "Success",
                    &format!(
                        "Package '{}' was installed into the Typst package directory!\n\n{}",
                        package_name,
                        destination.display()
                    ),
                );
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            InstallOutcome::Failure {
                message,
                recoverable: true,
            } => {
                dialogs::error("Error", &message);
                self.set_status("Check the URL and try again");
            }
            InstallOutcome::Failure {
                message,
                recoverable: false,
            } => {
                dialogs::error("Error", &format!("An error occurred:\n{}", message));
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Set a status message.
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some((msg.to_string(), chrono::Utc::now()));
    }

    /// Clear old status messages. Kept while installs are running.
    fn clear_old_status(&mut self) {
        if self.is_installing() {
            return;
        }
        if let Some((_, time)) = &self.status_message {
            if chrono::Utc::now() - *time > chrono::Duration::seconds(5) {
                self.status_message = None;
            }
        }
    }
}

impl eframe::App for TypkgApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_install_completion(ctx);
        self.clear_old_status();

        egui::TopBottomPanel::bottom("status_panel")
            .max_height(24.0)
            .show(ctx, |ui| {
                ui::status::render(self, ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui::form::render(self, ui);
        });

        if self.is_installing() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}
