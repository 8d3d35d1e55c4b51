//! Install pipeline coordinator.
//!
//! Sequences release lookup, download, extraction and installation for one
//! `InstallRequest`. Each invocation runs as its own task on the tokio
//! runtime; the interaction thread only sees the final `InstallOutcome`,
//! delivered once through a oneshot channel it drains from its event loop.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::downloader::{archive_path, DownloadProgress};
use super::error::InstallError;
use super::extractor::extract_package;
use super::gate::ConflictGate;
use super::installer::Installer;
use super::release::{GitHubReleases, ReleaseProvider};
use super::types::{InstallOutcome, InstallRequest, RepoRef, Stage};
use crate::config::InstallerConfig;

/// Prefix of scoped working directories.
const WORK_DIR_PREFIX: &str = "typkg-";

// =============================================================================
// Pipeline
// =============================================================================

pub struct Pipeline {
    config: InstallerConfig,
    provider: Arc<dyn ReleaseProvider>,
    installer: Installer,
}

impl Pipeline {
    pub fn new(config: InstallerConfig, provider: Arc<dyn ReleaseProvider>) -> Self {
        let installer = Installer::new(&config.package_root);
        Self {
            config,
            provider,
            installer,
        }
    }

    /// Pipeline backed by the GitHub release API.
    pub fn github(config: InstallerConfig) -> anyhow::Result<Self> {
        let provider = GitHubReleases::new(&config)?;
        Ok(Self::new(config, Arc::new(provider)))
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Conflict gate over the same package root this pipeline installs into.
    pub fn gate(&self) -> ConflictGate {
        ConflictGate::new(&self.config.package_root)
    }

    /// Where `repo` will be installed.
    pub fn destination_for(&self, repo: &RepoRef) -> PathBuf {
        self.installer.destination_for(repo.name())
    }

    /// Starts `request` on the runtime and returns a handle to its outcome.
    pub fn spawn(self: &Arc<Self>, runtime: &Handle, request: InstallRequest) -> PendingInstall {
        let (tx, rx) = oneshot::channel();
        let repo = request.repo.clone();
        let pipeline = Arc::clone(self);

        info!(repo = %repo, "Starting install task");
        runtime.spawn(async move {
            let outcome = pipeline.run(request).await;
            if tx.send(outcome).is_err() {
                warn!("Install finished but nobody is waiting for the result");
            }
        });

        PendingInstall { repo, rx }
    }

    /// Runs the whole pipeline and converts the result into an outcome.
    pub async fn run(&self, request: InstallRequest) -> InstallOutcome {
        let result = self.execute(&request).await;

        match &result {
            Ok(destination) => info!(
                repo = %request.repo,
                "Package '{}' installed at {}",
                request.repo.name(),
                destination.display()
            ),
            Err(e) if e.is_recoverable() => warn!(repo = %request.repo, "{}", e),
            Err(e) => error!(repo = %request.repo, "{}", e),
        }

        InstallOutcome::from_result(&request.repo, result)
    }

    async fn execute(&self, request: &InstallRequest) -> Result<PathBuf, InstallError> {
        let repo = &request.repo;

        enter(repo, Stage::Resolving);
        debug!(
            "Source {} resolved to {}/{}",
            request.source_url,
            repo.namespace(),
            repo.name()
        );

        enter(repo, Stage::LookingUpRelease);
        let release = self.provider.latest_release(repo).await?;
        let archive_url = release
            .archive_url
            .ok_or_else(|| InstallError::NoDownloadableArchive {
                repo: repo.to_string(),
            })?;

        // Removed on drop, whichever way this function returns
        let work_dir = self
            .create_work_dir()
            .map_err(|e| InstallError::DownloadFailed {
                url: archive_url.clone(),
                reason: format!("could not create working directory: {}", e),
            })?;
        debug!("Working in {}", work_dir.path().display());

        enter(repo, Stage::Downloading);
        let format = release.archive_format;
        let archive = archive_path(
            work_dir.path(),
            repo.name(),
            &release.version_label,
            format,
        );
        let progress = |p: DownloadProgress| {
            if let Some(percent) = p.percent {
                debug!("Download progress: {:.1}%", percent);
            }
        };
        let bytes = self
            .provider
            .fetch_archive(&archive_url, &archive, &progress)
            .await?;
        debug!("Fetched {} bytes for {}", bytes, repo);

        enter(repo, Stage::Extracting);
        let root = work_dir.path().to_path_buf();
        let archive_for_task = archive.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_package(&archive_for_task, &root, format)
        })
        .await
        .map_err(|e| InstallError::Extraction {
            archive: archive.clone(),
            reason: format!("extraction task failed: {}", e),
        })??;
        info!("Found package folder {}", extracted.display());

        enter(repo, Stage::Installing);
        let installer = self.installer.clone();
        let name = repo.name().to_string();
        let overwrite = request.overwrite;
        let destination = tokio::task::spawn_blocking(move || {
            installer.install(&extracted, &name, overwrite)
        })
        .await
        .map_err(|e| InstallError::InstallMoveFailed {
            destination: self.destination_for(repo),
            reason: format!("install task failed: {}", e),
        })??;

        if let Err(e) = work_dir.close() {
            warn!("Failed to remove working directory: {}", e);
        }

        Ok(destination)
    }

    fn create_work_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);

        match &self.config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }
}

fn enter(repo: &RepoRef, stage: Stage) {
    info!(repo = %repo, %stage, "Pipeline stage");
}

// =============================================================================
// Pending Installs
// =============================================================================

/// Receiving end of one running install.
pub struct PendingInstall {
    repo: RepoRef,
    rx: oneshot::Receiver<InstallOutcome>,
}

impl PendingInstall {
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Non-blocking check for the outcome. Call from the UI loop; once this
    /// returns `Some`, drop the handle.
    pub fn poll(&mut self) -> Option<InstallOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                error!(repo = %self.repo, "Install task ended without reporting a result");
                Some(InstallOutcome::Failure {
                    message: format!("The installation of '{}' stopped unexpectedly.", self.repo.name()),
                    recoverable: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::extractor::tests::write_zip;
    use crate::package::test_server::{Canned, TestServer};
    use crate::package::types::{ArchiveFormat, ReleaseInfo};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SOURCE_URL: &str = "https://host/acme/widgets";
    const ARCHIVE_URL: &str = "https://host/dl/widgets-1.2.0.zip";

    /// Serves a release whose archive is a local file.
    struct FakeProvider {
        release: Result<ReleaseInfo, String>,
        archive: Option<PathBuf>,
        fetches: AtomicUsize,
        fetched_to: Mutex<Vec<PathBuf>>,
    }

    impl FakeProvider {
        fn serving(archive: PathBuf) -> Self {
            Self {
                release: Ok(ReleaseInfo {
                    archive_url: Some(ARCHIVE_URL.to_string()),
                    archive_format: ArchiveFormat::Zip,
                    version_label: "v1.2.0".to_string(),
                }),
                archive: Some(archive),
                fetches: AtomicUsize::new(0),
                fetched_to: Mutex::new(Vec::new()),
            }
        }

        fn with_release(mut self, release: Result<ReleaseInfo, String>) -> Self {
            self.release = release;
            self
        }

        fn without_archive_file(mut self) -> Self {
            self.archive = None;
            self
        }
    }

    #[async_trait]
    impl ReleaseProvider for FakeProvider {
        async fn latest_release(&self, repo: &RepoRef) -> Result<ReleaseInfo, InstallError> {
            self.release
                .clone()
                .map_err(|reason| InstallError::ReleaseLookupFailed {
                    repo: repo.to_string(),
                    reason,
                })
        }

        async fn fetch_archive(
            &self,
            url: &str,
            dest: &Path,
            progress: &(dyn Fn(DownloadProgress) + Send + Sync),
        ) -> Result<u64, InstallError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.fetched_to.lock().unwrap().push(dest.to_path_buf());

            let source = self.archive.as_ref().ok_or_else(|| InstallError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;

            let bytes = tokio::fs::copy(source, dest)
                .await
                .map_err(|e| InstallError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            progress(DownloadProgress::new(bytes, Some(bytes)));
            Ok(bytes)
        }
    }

    struct Fixture {
        _temp: TempDir,
        fixtures: PathBuf,
        package_root: PathBuf,
        scratch: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let fixtures = temp.path().join("fixtures");
            fs::create_dir_all(&fixtures).unwrap();
            Self {
                fixtures,
                package_root: temp.path().join("data/typst/packages/local"),
                scratch: temp.path().join("scratch"),
                _temp: temp,
            }
        }

        fn archive(&self, files: &[(&str, &str)]) -> PathBuf {
            let path = self.fixtures.join("release.zip");
            write_zip(&path, files);
            path
        }

        fn pipeline(&self, provider: Arc<FakeProvider>) -> Pipeline {
            let config = InstallerConfig::new(&self.package_root).with_scratch_dir(&self.scratch);
            Pipeline::new(config, provider)
        }

        fn scratch_is_empty(&self) -> bool {
            !self.scratch.exists() || fs::read_dir(&self.scratch).unwrap().next().is_none()
        }
    }

    fn request(overwrite: bool) -> InstallRequest {
        InstallRequest::new(RepoRef::parse(SOURCE_URL).unwrap(), SOURCE_URL, overwrite)
    }

    /// Relative path -> file content for every file below `root`.
    fn snapshot(root: &Path) -> BTreeMap<String, String> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    let rel = path.strip_prefix(base).unwrap();
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    out.insert(key, fs::read_to_string(&path).unwrap());
                }
            }
        }

        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let fx = Fixture::new();
        let archive = fx.archive(&[("widgets-1.2.0/lib.typ", "#let widget = 1")]);
        let provider = Arc::new(FakeProvider::serving(archive));
        let pipeline = fx.pipeline(provider.clone());

        let outcome = pipeline.run(request(false)).await;

        assert_eq!(
            outcome,
            InstallOutcome::Success {
                package_name: "widgets".to_string(),
                destination: fx.package_root.join("widgets"),
            }
        );
        let installed = snapshot(&fx.package_root.join("widgets"));
        assert_eq!(installed.len(), 1);
        assert_eq!(installed["lib.typ"], "#let widget = 1");

        let fetched = provider.fetched_to.lock().unwrap();
        assert_eq!(fetched[0].file_name().unwrap(), "widgets-v1.2.0.zip");
    }

    #[tokio::test]
    async fn test_round_trip_preserves_tree() {
        let fx = Fixture::new();
        let archive = fx.archive(&[
            ("acme-widgets-1a2b3c/a.txt", "alpha"),
            ("acme-widgets-1a2b3c/sub/b.txt", "beta"),
        ]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));

        assert!(pipeline.run(request(false)).await.is_success());

        let dest = fx.package_root.join("widgets");
        assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(dest.join("sub/b.txt")).unwrap(), "beta");
        assert!(!fx.package_root.join("acme-widgets-1a2b3c").exists());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let fx = Fixture::new();
        let archive = fx.archive(&[("pkg/a.txt", "alpha"), ("pkg/sub/b.txt", "beta")]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));
        let dest = fx.package_root.join("widgets");

        assert!(pipeline.run(request(false)).await.is_success());
        let first = snapshot(&dest);

        assert!(pipeline.run(request(true)).await.is_success());
        assert_eq!(snapshot(&dest), first);
    }

    #[tokio::test]
    async fn test_authorized_overwrite_removes_old_contents() {
        let fx = Fixture::new();
        let old = fx.package_root.join("widgets");
        fs::create_dir_all(old.join("legacy")).unwrap();
        fs::write(old.join("legacy/old.typ"), "old").unwrap();

        let archive = fx.archive(&[("pkg/a.txt", "alpha")]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));

        assert!(pipeline.run(request(true)).await.is_success());

        let installed = snapshot(&old);
        assert_eq!(installed.keys().collect::<Vec<_>>(), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_destination_created_after_gate_is_replaced() {
        let fx = Fixture::new();
        let old = fx.package_root.join("widgets");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("old.typ"), "old").unwrap();

        let archive = fx.archive(&[("pkg/a.txt", "alpha")]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));

        let outcome = pipeline.run(request(false)).await;

        assert!(outcome.is_success());
        assert!(!old.join("old.typ").exists());
        assert_eq!(fs::read_to_string(old.join("a.txt")).unwrap(), "alpha");
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_missing_archive_url_is_soft_failure_without_download() {
        let fx = Fixture::new();
        let provider = Arc::new(
            FakeProvider::serving(fx.fixtures.join("unused.zip")).with_release(Ok(ReleaseInfo {
                archive_url: None,
                archive_format: ArchiveFormat::Zip,
                version_label: "v1.2.0".to_string(),
            })),
        );
        let pipeline = fx.pipeline(provider.clone());

        let outcome = pipeline.run(request(false)).await;

        match outcome {
            InstallOutcome::Failure {
                message,
                recoverable,
            } => {
                assert!(recoverable);
                assert!(message.contains("zipball_url"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
        assert!(!fx.package_root.exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_release_lookup_failure() {
        let fx = Fixture::new();
        let provider = Arc::new(
            FakeProvider::serving(fx.fixtures.join("unused.zip"))
                .with_release(Err("HTTP 404 Not Found".to_string())),
        );
        let pipeline = fx.pipeline(provider.clone());

        match pipeline.run(request(false)).await {
            InstallOutcome::Failure {
                message,
                recoverable,
            } => {
                assert!(!recoverable);
                assert!(message.contains("acme/widgets"));
                assert!(message.contains("404"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_failure_cleans_up() {
        let fx = Fixture::new();
        let provider = Arc::new(
            FakeProvider::serving(fx.fixtures.join("unused.zip")).without_archive_file(),
        );
        let pipeline = fx.pipeline(provider);

        let outcome = pipeline.run(request(false)).await;

        assert!(matches!(
            outcome,
            InstallOutcome::Failure {
                recoverable: false,
                ..
            }
        ));
        assert!(fx.scratch_is_empty());
        assert!(!fx.package_root.join("widgets").exists());
    }

    #[tokio::test]
    async fn test_flat_archive_reports_no_top_level_dir_and_cleans_up() {
        let fx = Fixture::new();
        let archive = fx.archive(&[("a.txt", "alpha")]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));

        match pipeline.run(request(false)).await {
            InstallOutcome::Failure { message, .. } => {
                assert!(message.contains("top-level folder"))
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_success_leaves_no_scratch_behind() {
        let fx = Fixture::new();
        let archive = fx.archive(&[("pkg/a.txt", "alpha")]);
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(archive)));

        assert!(pipeline.run(request(false)).await.is_success());
        assert!(fx.scratch.exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_spawned_install_delivers_outcome_once() {
        let fx = Fixture::new();
        let archive = fx.archive(&[("pkg/a.txt", "alpha")]);
        let pipeline = Arc::new(fx.pipeline(Arc::new(FakeProvider::serving(archive))));

        let mut pending = pipeline.spawn(&Handle::current(), request(false));
        assert_eq!(pending.repo().name(), "widgets");

        let outcome = loop {
            if let Some(outcome) = pending.poll() {
                break outcome;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };

        assert!(outcome.is_success());
        assert!(fx.package_root.join("widgets/a.txt").exists());
    }

    #[test]
    fn test_gate_and_destination_share_package_root() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Arc::new(FakeProvider::serving(PathBuf::new())));
        let repo = RepoRef::parse(SOURCE_URL).unwrap();

        assert_eq!(pipeline.destination_for(&repo), fx.package_root.join("widgets"));
        assert_eq!(
            pipeline.gate().check(&repo, |_, _| false),
            crate::package::GateDecision::Proceed { overwrite: false }
        );
    }

    #[tokio::test]
    async fn test_github_provider_installs_from_served_release() {
        let fx = Fixture::new();
        let archive = fx.archive(&[
            ("acme-widgets-3f2a1c/typst.toml", "[package]"),
            ("acme-widgets-3f2a1c/src/lib.typ", "#let widget = 2"),
        ]);
        let server = TestServer::bind().await;
        let release = format!(
            r#"{{"tag_name": "v2.0.0", "zipball_url": "{}"}}"#,
            server.url("/zipball/v2.0.0")
        );
        let base = server.serve(vec![
            (
                "/repos/acme/widgets/releases/latest",
                Canned::json(&release),
            ),
            (
                "/zipball/v2.0.0",
                Canned::bytes(&fs::read(&archive).unwrap()),
            ),
        ]);
        let config = InstallerConfig::new(&fx.package_root)
            .with_scratch_dir(&fx.scratch)
            .with_api_base_url(&base);
        let pipeline = Pipeline::github(config).unwrap();

        let outcome = pipeline.run(request(false)).await;

        assert!(outcome.is_success(), "{:?}", outcome);
        let installed = snapshot(&fx.package_root.join("widgets"));
        assert_eq!(installed["typst.toml"], "[package]");
        assert_eq!(installed["src/lib.typ"], "#let widget = 2");
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_github_provider_missing_release_fails_hard() {
        let fx = Fixture::new();
        let base = TestServer::bind().await.serve(Vec::new());
        let config = InstallerConfig::new(&fx.package_root)
            .with_scratch_dir(&fx.scratch)
            .with_api_base_url(&base);
        let pipeline = Pipeline::github(config).unwrap();

        let outcome = pipeline.run(request(false)).await;

        assert!(matches!(
            outcome,
            InstallOutcome::Failure {
                recoverable: false,
                ..
            }
        ));
        assert!(!fx.package_root.join("widgets").exists());
    }
}
