//! Incremental site generation for Orrery.
//!
//! A build cycle turns a directory of annotated source documents into a site:
//!
//! 1. [`Scanner`] discovers source documents.
//! 2. [`ChangeDetector`](orrery_ledger::ChangeDetector) compares their
//!    fingerprints against the previous build.
//! 3. [`PageConfigBuilder`] derives a [`PageConfig`] per document from its
//!    annotations ([`extract_metadata`]) and positional defaults.
//! 4. [`HierarchyResolver`] repairs parent references across the batch and
//!    computes children.
//! 5. [`TemplateRenderer`] writes one HTML page per document.
//! 6. [`SiteMapBuilder`] publishes the [`Manifest`]; [`BackupManager`] keeps
//!    timestamped copies of it.
//!
//! [`BuildOrchestrator`] sequences these steps, once or on a timer.
//!
//! # Example
//!
//! ```no_run
//! use orrery_config::Config;
//! use orrery_site::BuildOrchestrator;
//!
//! let config = Config::load(None, None)?;
//! let report = BuildOrchestrator::from_config(&config).run_once()?;
//! println!("{} pages rendered", report.rendered);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backup;
mod builder;
mod hierarchy;
mod metadata;
mod orchestrator;
mod page;
mod render;
mod scanner;
mod sitemap;

pub use backup::{BackupError, BackupManager, BackupSnapshot};
pub use builder::{PageConfigBuilder, SourceDocument, page_name};
pub use hierarchy::{HierarchyResolver, ResolveReport};
pub use metadata::{ExtractedMetadata, META_PREFIX, extract_metadata, normalize_key};
pub use orchestrator::{BuildError, BuildOrchestrator, BuildPhase, BuildReport, PageError, WatchStats};
pub use page::{Importance, PageConfig, PageMetadata};
pub use render::TemplateRenderer;
pub use scanner::{Scanner, SourceFile};
pub use sitemap::{MANIFEST_VERSION, Manifest, PageSummary, SiteMapBuilder, Statistics};
