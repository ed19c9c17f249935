//! Build cycle sequencing, one-shot and on a timer.
//!
//! One cycle runs the phases
//!
//! ```text
//! idle -> discovering -> filtering -> building-configs -> resolving-hierarchy
//!      -> rendering -> publishing -> backing-up -> idle
//! ```
//!
//! Reading and fingerprinting sources and building page configs run on the
//! rayon pool; everything that needs the whole batch runs on the calling
//! thread. A failure confined to one document is logged, reported in
//! [`BuildReport::failed`] and does not stop the cycle. Failing to create the
//! output tree, publish the manifest, write the backup snapshot or persist
//! the ledger aborts the cycle with a [`BuildError`].

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use orrery_config::{Config, OutputConfig, SourceConfig};
use orrery_ledger::{
    ChangeDetector, FileLedgerStore, LedgerError, LedgerStore, NullLedgerStore, fingerprint,
    write_atomic,
};
use rayon::prelude::*;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backup::{BackupError, BackupManager};
use crate::builder::{PageConfigBuilder, SourceDocument};
use crate::hierarchy::HierarchyResolver;
use crate::page::PageConfig;
use crate::render::TemplateRenderer;
use crate::scanner::{Scanner, SourceFile};
use crate::sitemap::SiteMapBuilder;

/// Current step of a build cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Discovering,
    Filtering,
    BuildingConfigs,
    ResolvingHierarchy,
    Rendering,
    Publishing,
    BackingUp,
}

impl BuildPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Filtering => "filtering",
            Self::BuildingConfigs => "building-configs",
            Self::ResolvingHierarchy => "resolving-hierarchy",
            Self::Rendering => "rendering",
            Self::Publishing => "publishing",
            Self::BackingUp => "backing-up",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch-fatal build error.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Another cycle holds the single-flight guard.
    #[error("a build is already in progress")]
    InFlight,
    #[error("cannot create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize manifest: {0}")]
    SerializeManifest(#[source] serde_json::Error),
    #[error("cannot write manifest {}: {source}", .path.display())]
    WriteManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write backup snapshot: {0}")]
    Backup(#[from] BackupError),
    #[error("cannot persist hash ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// A document that could not be processed in one cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageError {
    /// Source filename relative to the source dir.
    pub file: String,
    pub message: String,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// Outcome of one successful cycle.
#[derive(Clone, Debug)]
pub struct BuildReport {
    /// Source documents found by discovery.
    pub discovered: usize,
    /// Documents whose fingerprint differed from the ledger.
    pub changed: usize,
    /// Output documents written.
    pub rendered: usize,
    pub failed: Vec<PageError>,
    /// Pages published with at least one validation error.
    pub pages_with_errors: usize,
    pub manifest_path: PathBuf,
    pub backup_path: PathBuf,
    pub backups_pruned: usize,
    pub duration: Duration,
}

/// Totals of a watch session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Cycles that ran to completion, successfully or not.
    pub cycles: usize,
    /// Cycles that ended in a [`BuildError`].
    pub failures: usize,
    /// Ticks dropped because a cycle was still running.
    pub skipped: usize,
}

/// Sequences the build pipeline.
pub struct BuildOrchestrator {
    source: SourceConfig,
    output: OutputConfig,
    incremental: bool,
    max_backup_count: usize,
    interval: Duration,
    builder: PageConfigBuilder,
    ledger: Box<dyn LedgerStore>,
    backups: BackupManager,
    phase: Mutex<BuildPhase>,
    running: AtomicBool,
}

/// Clears the single-flight flag when dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A source document loaded for this cycle, with its discovery index.
struct Loaded {
    index: usize,
    doc: SourceDocument,
    changed: bool,
}

impl BuildOrchestrator {
    /// Create an orchestrator from resolved configuration.
    ///
    /// With incremental builds disabled the ledger is neither read nor
    /// written, so every document counts as changed.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let ledger: Box<dyn LedgerStore> = if config.build.incremental {
            Box::new(FileLedgerStore::new(config.ledger_path()))
        } else {
            Box::new(NullLedgerStore)
        };
        Self {
            source: config.source_resolved.clone(),
            output: config.output_resolved.clone(),
            incremental: config.build.incremental,
            max_backup_count: config.build.max_backup_count,
            interval: Duration::from_millis(config.watch.interval_ms),
            builder: PageConfigBuilder::new(config.types_resolved.clone(), &config.layout),
            ledger,
            backups: BackupManager::new(config.backup_dir()),
            phase: Mutex::new(BuildPhase::Idle),
            running: AtomicBool::new(false),
        }
    }

    /// Replace the ledger store.
    #[must_use]
    pub fn with_ledger_store(mut self, store: Box<dyn LedgerStore>) -> Self {
        self.ledger = store;
        self
    }

    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a cycle is running right now.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn enter(&self, phase: BuildPhase) {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = %*current, to = %phase, "build phase");
        *current = phase;
    }

    /// Run one build cycle.
    ///
    /// Returns [`BuildError::InFlight`] without doing anything if another
    /// cycle is running on this orchestrator.
    pub fn run_once(&self) -> Result<BuildReport, BuildError> {
        let Some(_guard) = FlightGuard::acquire(&self.running) else {
            return Err(BuildError::InFlight);
        };
        let start = Instant::now();
        let result = self.run_cycle(start);
        self.enter(BuildPhase::Idle);

        match &result {
            Ok(report) => tracing::info!(
                discovered = report.discovered,
                changed = report.changed,
                rendered = report.rendered,
                failed = report.failed.len(),
                with_errors = report.pages_with_errors,
                elapsed_ms = report.duration.as_millis(),
                "build complete"
            ),
            Err(e) => tracing::error!(error = %e, "build failed"),
        }
        result
    }

    fn run_cycle(&self, start: Instant) -> Result<BuildReport, BuildError> {
        self.enter(BuildPhase::Discovering);
        create_dir(&self.output.dir)?;
        let files = Scanner::new(&self.source).scan();
        let total = files.len();
        tracing::debug!(count = total, dir = %self.source.dir.display(), "discovered sources");

        self.enter(BuildPhase::Filtering);
        let mut failed = Vec::new();
        let mut detector = ChangeDetector::load(self.ledger.as_ref());
        let reads: Vec<Result<SourceDocument, PageError>> = files.par_iter().map(read_source).collect();
        let mut loaded = Vec::with_capacity(total);
        for (index, read) in reads.into_iter().enumerate() {
            match read {
                Ok(doc) => {
                    let changed = detector.observe(&doc.filename, doc.fingerprint.clone());
                    loaded.push(Loaded {
                        index,
                        doc,
                        changed,
                    });
                }
                Err(error) => {
                    tracing::warn!(file = %error.file, error = %error.message, "skipping unreadable source");
                    detector.forget(&error.file);
                    failed.push(error);
                }
            }
        }
        let changed = loaded.iter().filter(|l| l.changed).count();

        self.enter(BuildPhase::BuildingConfigs);
        let mut pages: Vec<PageConfig> = loaded
            .par_iter()
            .map(|l| self.builder.build_document(&l.doc, l.index, total))
            .collect();

        self.enter(BuildPhase::ResolvingHierarchy);
        HierarchyResolver::resolve(&mut pages);
        let generated_at = loaded
            .iter()
            .filter_map(|l| l.doc.modified)
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let manifest = SiteMapBuilder::build(&pages, &self.output.extension, generated_at);
        let manifest_json = manifest.to_json().map_err(BuildError::SerializeManifest)?;
        // Unchanged sources can still need new output when a neighbour's
        // relations changed; any such change shows up in the manifest.
        let batch_dirty = !self.incremental
            || !fs::read(&self.output.manifest_path)
                .is_ok_and(|prev| prev == manifest_json.as_bytes());

        self.enter(BuildPhase::Rendering);
        let renderer = TemplateRenderer::for_batch(&pages, &self.output.extension);
        let outcomes: Vec<Result<bool, PageError>> = loaded
            .par_iter()
            .zip(pages.par_iter())
            .map(|(l, page)| self.render_page(&renderer, page, &l.doc.filename, l.changed, batch_dirty))
            .collect();
        let mut rendered = 0;
        for outcome in outcomes {
            match outcome {
                Ok(true) => rendered += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(file = %error.file, error = %error.message, "failed to render page");
                    detector.forget(&error.file);
                    failed.push(error);
                }
            }
        }

        self.enter(BuildPhase::Publishing);
        write_atomic(&self.output.manifest_path, manifest_json.as_bytes()).map_err(|source| {
            BuildError::WriteManifest {
                path: self.output.manifest_path.clone(),
                source,
            }
        })?;

        self.enter(BuildPhase::BackingUp);
        let backup_path = self.backups.snapshot(&manifest)?;
        let backups_pruned = self.backups.prune(self.max_backup_count);
        detector.persist(self.ledger.as_ref())?;

        Ok(BuildReport {
            discovered: total,
            changed,
            rendered,
            failed,
            pages_with_errors: manifest.statistics.with_errors,
            manifest_path: self.output.manifest_path.clone(),
            backup_path,
            backups_pruned,
            duration: start.elapsed(),
        })
    }

    /// Render and write one page if needed. Returns whether a file was written.
    fn render_page(
        &self,
        renderer: &TemplateRenderer,
        page: &PageConfig,
        filename: &str,
        changed: bool,
        batch_dirty: bool,
    ) -> Result<bool, PageError> {
        let path = self.output.dir.join(page.url(&self.output.extension));
        let exists = path.is_file();
        if !changed && exists && !batch_dirty {
            return Ok(false);
        }

        let html = renderer.render(page);
        if !changed && exists && fs::read(&path).is_ok_and(|prev| prev == html.as_bytes()) {
            return Ok(false);
        }

        write_atomic(&path, html.as_bytes()).map_err(|e| PageError {
            file: filename.to_owned(),
            message: format!("cannot write {}: {e}", path.display()),
        })?;
        tracing::debug!(file = %filename, output = %path.display(), "rendered page");
        Ok(true)
    }

    /// Run cycles every [`interval`](Self::interval) until `shutdown` resolves.
    ///
    /// Each cycle runs on the blocking pool. A tick that arrives while a
    /// cycle is still running is dropped. On shutdown the running cycle, if
    /// any, is awaited before returning. Cycle failures are logged and the
    /// next tick proceeds as usual.
    pub async fn watch<F>(self: Arc<Self>, shutdown: F) -> WatchStats
    where
        F: Future<Output = ()>,
    {
        let mut stats = WatchStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut running: Option<JoinHandle<Result<BuildReport, BuildError>>> = None;
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = self.interval.as_millis(), "watching for changes");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Some(handle) = running.take() {
                        if !handle.is_finished() {
                            tracing::debug!("previous build still running, skipping tick");
                            stats.skipped += 1;
                            running = Some(handle);
                            continue;
                        }
                        record(handle.await, &mut stats);
                    }
                    let this = Arc::clone(&self);
                    running = Some(tokio::task::spawn_blocking(move || this.run_once()));
                }
            }
        }

        if let Some(handle) = running {
            record(handle.await, &mut stats);
        }
        tracing::info!(
            cycles = stats.cycles,
            failures = stats.failures,
            skipped = stats.skipped,
            "watch stopped"
        );
        stats
    }
}

fn record(
    outcome: Result<Result<BuildReport, BuildError>, tokio::task::JoinError>,
    stats: &mut WatchStats,
) {
    match outcome {
        Ok(Ok(_)) => stats.cycles += 1,
        Ok(Err(BuildError::InFlight)) => stats.skipped += 1,
        // already logged by run_once
        Ok(Err(_)) => {
            stats.cycles += 1;
            stats.failures += 1;
        }
        Err(e) => {
            tracing::error!(error = %e, "build task panicked");
            stats.cycles += 1;
            stats.failures += 1;
        }
    }
}

fn create_dir(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|source| BuildError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn read_source(file: &SourceFile) -> Result<SourceDocument, PageError> {
    let fail = |message: String| PageError {
        file: file.key.clone(),
        message,
    };
    let bytes = fs::read(&file.path).map_err(|e| fail(format!("cannot read: {e}")))?;
    let digest = fingerprint(&bytes);
    let content = String::from_utf8(bytes).map_err(|_| fail("not valid UTF-8".to_owned()))?;
    let meta = fs::metadata(&file.path).ok();
    Ok(SourceDocument {
        filename: file.key.clone(),
        content,
        fingerprint: digest,
        modified: meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from),
        created: meta
            .as_ref()
            .and_then(|m| m.created().ok())
            .map(DateTime::<Utc>::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_ledger::HashLedger;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (tempfile::TempDir, Config) {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::default_with_base(tmp.path());
        fs::create_dir_all(&config.source_resolved.dir).unwrap();
        (tmp, config)
    }

    fn write_source(config: &Config, name: &str, content: &str) {
        fs::write(config.source_resolved.dir.join(name), content).unwrap();
    }

    #[test]
    fn test_run_once_renders_everything_first_time() {
        let (_tmp, config) = setup();
        write_source(&config, "a.html", "<h1>A</h1>");
        write_source(&config, "b.html", "<meta name=\"orrery:parent\" content=\"a\">");
        let orchestrator = BuildOrchestrator::from_config(&config);

        let report = orchestrator.run_once().unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.changed, 2);
        assert_eq!(report.rendered, 2);
        assert!(report.failed.is_empty());
        assert!(config.output_resolved.dir.join("a.html").is_file());
        assert!(config.output_resolved.manifest_path.is_file());
        assert!(report.backup_path.is_file());
        assert!(config.ledger_path().is_file());
        assert_eq!(orchestrator.phase(), BuildPhase::Idle);
        assert!(!orchestrator.is_building());
    }

    #[test]
    fn test_missing_output_is_rerendered() {
        let (_tmp, config) = setup();
        write_source(&config, "a.html", "<h1>A</h1>");
        let orchestrator = BuildOrchestrator::from_config(&config);
        orchestrator.run_once().unwrap();
        fs::remove_file(config.output_resolved.dir.join("a.html")).unwrap();

        let report = orchestrator.run_once().unwrap();

        assert_eq!(report.changed, 0);
        assert_eq!(report.rendered, 1);
    }

    #[test]
    fn test_new_child_rerenders_unchanged_parent() {
        let (_tmp, config) = setup();
        write_source(&config, "a.html", "<h1>A</h1>");
        let orchestrator = BuildOrchestrator::from_config(&config);
        orchestrator.run_once().unwrap();

        write_source(&config, "b.html", "<meta name=\"orrery:parent\" content=\"a\">");
        let report = orchestrator.run_once().unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.rendered, 2);
        let parent = fs::read_to_string(config.output_resolved.dir.join("a.html")).unwrap();
        assert!(parent.contains("data-level=\"b\""));
    }

    #[test]
    fn test_unreadable_source_is_partial_failure() {
        let (_tmp, config) = setup();
        write_source(&config, "good.html", "<h1>Good</h1>");
        fs::write(config.source_resolved.dir.join("bad.html"), [0xff, 0xfe, 0x00]).unwrap();
        let orchestrator = BuildOrchestrator::from_config(&config);

        let report = orchestrator.run_once().unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.rendered, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, "bad.html");
        let ledger = FileLedgerStore::new(config.ledger_path()).load().unwrap().unwrap();
        assert!(ledger.get("bad.html").is_none());
        assert!(ledger.get("good.html").is_some());
    }

    #[test]
    fn test_in_flight_guard() {
        let (_tmp, config) = setup();
        let orchestrator = BuildOrchestrator::from_config(&config);
        let guard = FlightGuard::acquire(&orchestrator.running).unwrap();

        assert!(orchestrator.is_building());
        assert!(matches!(orchestrator.run_once(), Err(BuildError::InFlight)));

        drop(guard);
        assert!(orchestrator.run_once().is_ok());
    }

    #[test]
    fn test_manifest_write_failure_is_fatal() {
        let (_tmp, mut config) = setup();
        write_source(&config, "a.html", "<h1>A</h1>");
        // a directory where the manifest file should go
        fs::create_dir_all(&config.output_resolved.manifest_path).unwrap();
        config.build.incremental = false;
        let orchestrator = BuildOrchestrator::from_config(&config);

        let err = orchestrator.run_once().unwrap_err();

        assert!(matches!(err, BuildError::WriteManifest { .. }), "{err}");
        assert!(!config.ledger_path().exists());
        assert_eq!(orchestrator.phase(), BuildPhase::Idle);
    }

    #[test]
    fn test_non_incremental_ignores_ledger() {
        let (_tmp, mut config) = setup();
        config.build.incremental = false;
        write_source(&config, "a.html", "<h1>A</h1>");
        let orchestrator = BuildOrchestrator::from_config(&config);

        orchestrator.run_once().unwrap();
        let report = orchestrator.run_once().unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.rendered, 1);
        assert!(!config.ledger_path().exists());
    }

    #[tokio::test]
    async fn test_watch_runs_cycles_until_shutdown() {
        let (_tmp, mut config) = setup();
        config.watch.interval_ms = 50;
        write_source(&config, "a.html", "<h1>A</h1>");
        let orchestrator = Arc::new(BuildOrchestrator::from_config(&config));

        let stats = Arc::clone(&orchestrator)
            .watch(tokio::time::sleep(Duration::from_millis(300)))
            .await;

        assert!(stats.cycles >= 1, "{stats:?}");
        assert_eq!(stats.failures, 0);
        assert!(!orchestrator.is_building());
        assert!(config.output_resolved.dir.join("a.html").is_file());
    }

    /// Ledger store whose load blocks, so one cycle outlasts several ticks.
    struct SlowStore {
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl LedgerStore for SlowStore {
        fn load(&self) -> Result<Option<HashLedger>, LedgerError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(None)
        }

        fn save(&self, _ledger: &HashLedger) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_watch_drops_ticks_while_cycle_runs() {
        let (_tmp, mut config) = setup();
        config.watch.interval_ms = 20;
        write_source(&config, "a.html", "<h1>A</h1>");
        let peak = Arc::new(AtomicUsize::new(0));
        let store = SlowStore {
            delay: Duration::from_millis(150),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        };
        let orchestrator =
            Arc::new(BuildOrchestrator::from_config(&config).with_ledger_store(Box::new(store)));

        let stats = Arc::clone(&orchestrator)
            .watch(tokio::time::sleep(Duration::from_millis(400)))
            .await;

        assert!(stats.cycles >= 1, "{stats:?}");
        assert!(stats.skipped >= 1, "{stats:?}");
        assert_eq!(stats.failures, 0);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(!orchestrator.is_building());
    }
}
