//! typkg GUI Application
//!
//! A small desktop window that installs the latest release of a GitHub
//! repository into the local Typst package directory.

mod app;
mod ui;

use std::sync::Arc;

use anyhow::Context;
use eframe::egui;
use typkg_core::{InstallerConfig, Pipeline};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("typkg=debug".parse()?)
                .add_directive("typkg_core=debug".parse()?)
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting typkg v{}", typkg_core::VERSION);

    let pipeline = match build_pipeline() {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            tracing::error!("Startup failed: {e:#}");
            ui::dialogs::error("Error", &format!("typkg could not start:\n{e:#}"));
            return Err(e);
        }
    };
    tracing::info!(
        "Package directory: {}",
        pipeline.config().package_root.display()
    );

    // Workers for install tasks; the UI thread never blocks on them
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 190.0])
            .with_min_inner_size([420.0, 170.0])
            .with_title("Typst Package Installer"),
        ..Default::default()
    };

    eframe::run_native(
        "typkg",
        options,
        Box::new(|cc| Ok(Box::new(app::TypkgApp::new(cc, runtime, pipeline)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}

/// Resolve configuration and build the GitHub-backed pipeline.
fn build_pipeline() -> anyhow::Result<Pipeline> {
    let config = InstallerConfig::from_env()?;
    Pipeline::github(config).context("Failed to create HTTP client")
}
