//! Configuration management for Orrery.
//!
//! Parses `orrery.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Path values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `source.dir`
//! - `output.dir`

mod entity;
mod expand;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use entity::{EntityType, TypeStyle, TypeTables, UnknownEntityType, is_hex_color};
use entity::TypeStyleRaw;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override source document directory.
    pub source_dir: Option<PathBuf>,
    /// Override site output directory.
    pub output_dir: Option<PathBuf>,
    /// Override incremental build flag.
    pub incremental: Option<bool>,
    /// Override watch mode flag.
    pub watch_enabled: Option<bool>,
    /// Override watch interval in milliseconds.
    pub watch_interval_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "orrery.toml";

/// Project state directory created next to the config file.
const PROJECT_DIRNAME: &str = ".orrery";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source discovery configuration (paths are relative strings from TOML).
    source: SourceConfigRaw,
    /// Output configuration (paths are relative strings from TOML).
    output: OutputConfigRaw,
    /// Build behaviour.
    pub build: BuildConfig,
    /// Watch mode.
    pub watch: WatchConfig,
    /// Positioning defaults.
    pub layout: LayoutConfig,
    /// Per-kind overrides of the built-in type tables.
    types: HashMap<EntityType, TypeStyleRaw>,

    /// Resolved source configuration (set after loading).
    #[serde(skip)]
    pub source_resolved: SourceConfig,
    /// Resolved output configuration (set after loading).
    #[serde(skip)]
    pub output_resolved: OutputConfig,
    /// Resolved type tables (set after loading).
    #[serde(skip)]
    pub types_resolved: TypeTables,
    /// Project state directory (.orrery/).
    #[serde(skip)]
    pub project_dir: PathBuf,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw source configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceConfigRaw {
    dir: Option<String>,
    max_depth: Option<usize>,
    exclude: Option<Vec<String>>,
    extensions: Option<Vec<String>>,
}

/// Resolved source discovery configuration.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Directory holding the author-written documents.
    pub dir: PathBuf,
    /// Maximum directory depth below `dir` (0 scans only `dir` itself).
    pub max_depth: usize,
    /// Glob patterns, relative to `dir`, of paths to skip.
    pub exclude: Vec<String>,
    /// File extensions (without dot) treated as source documents.
    pub extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("pages"),
            max_depth: 8,
            exclude: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["html".to_owned(), "htm".to_owned(), "md".to_owned()]
}

/// Raw output configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputConfigRaw {
    dir: Option<String>,
    manifest: Option<String>,
    extension: Option<String>,
}

/// Resolved output configuration.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Site root receiving rendered documents.
    pub dir: PathBuf,
    /// Manifest file path.
    pub manifest_path: PathBuf,
    /// Extension of rendered documents (without dot).
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("site"),
            manifest_path: PathBuf::from("site/site-map.json"),
            extension: "html".to_owned(),
        }
    }
}

/// Build behaviour configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Skip re-rendering documents whose fingerprint is unchanged.
    pub incremental: bool,
    /// Number of manifest snapshots kept in the backup directory.
    pub max_backup_count: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            max_backup_count: 10,
        }
    }
}

/// Watch mode configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Re-run the pipeline on a timer instead of once.
    pub enabled: bool,
    /// Interval between cycles in milliseconds.
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 2000,
        }
    }
}

/// Positioning defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Orbit radius added per discovery index.
    pub orbit_step: f64,
    /// Number of documents after the first that become planets.
    pub primary_slots: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            orbit_step: 12.0,
            primary_slots: 3,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`source.dir`").
        field: String,
        /// Error message (e.g., "${`PAGES_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `orrery.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.source_resolved.dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            let manifest_name = self
                .output_resolved
                .manifest_path
                .file_name()
                .map_or_else(|| PathBuf::from("site-map.json"), PathBuf::from);
            self.output_resolved.dir.clone_from(output_dir);
            self.output_resolved.manifest_path = output_dir.join(manifest_name);
        }
        if let Some(incremental) = settings.incremental {
            self.build.incremental = incremental;
        }
        if let Some(enabled) = settings.watch_enabled {
            self.watch.enabled = enabled;
        }
        if let Some(interval_ms) = settings.watch_interval_ms {
            self.watch.interval_ms = interval_ms;
        }
    }

    /// Hash ledger path (.orrery/hashes.json).
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.project_dir.join("hashes.json")
    }

    /// Backup snapshot directory (.orrery/backups/).
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.project_dir.join("backups")
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let output_dir = base.join("site");
        Self {
            source: SourceConfigRaw::default(),
            output: OutputConfigRaw::default(),
            build: BuildConfig::default(),
            watch: WatchConfig::default(),
            layout: LayoutConfig::default(),
            types: HashMap::new(),
            source_resolved: SourceConfig {
                dir: base.join("pages"),
                ..SourceConfig::default()
            },
            output_resolved: OutputConfig {
                manifest_path: output_dir.join("site-map.json"),
                dir: output_dir,
                ..OutputConfig::default()
            },
            types_resolved: TypeTables::default(),
            project_dir: base.join(PROJECT_DIRNAME),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_source()?;
        self.validate_output()?;
        self.validate_build()?;
        self.types_resolved.validate()?;
        Ok(())
    }

    fn validate_source(&self) -> Result<(), ConfigError> {
        if self.source_resolved.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "source.extensions cannot be empty".to_owned(),
            ));
        }
        for ext in &self.source_resolved.extensions {
            require_non_empty(ext, "source.extensions")?;
        }
        Ok(())
    }

    fn validate_output(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.output_resolved.extension, "output.extension")?;
        if self.output_resolved.dir == self.source_resolved.dir {
            return Err(ConfigError::Validation(
                "output.dir must differ from source.dir".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_build(&self) -> Result<(), ConfigError> {
        const MIN_INTERVAL_MS: u64 = 100;

        if self.build.max_backup_count == 0 {
            return Err(ConfigError::Validation(
                "build.max_backup_count must be at least 1".to_owned(),
            ));
        }
        if self.watch.interval_ms < MIN_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "watch.interval_ms must be at least {MIN_INTERVAL_MS}"
            )));
        }
        if !(self.layout.orbit_step.is_finite() && self.layout.orbit_step > 0.0) {
            return Err(ConfigError::Validation(
                "layout.orbit_step must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in path strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.source.dir {
            self.source.dir = Some(expand::expand_env(dir, "source.dir")?);
        }
        if let Some(ref dir) = self.output.dir {
            self.output.dir = Some(expand::expand_env(dir, "output.dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.source_resolved = SourceConfig {
            dir: resolve(self.source.dir.as_deref(), "pages"),
            max_depth: self.source.max_depth.unwrap_or(8),
            exclude: self.source.exclude.clone().unwrap_or_default(),
            extensions: self
                .source
                .extensions
                .as_ref()
                .map(|exts| {
                    exts.iter()
                        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                        .collect()
                })
                .unwrap_or_else(default_extensions),
        };

        let output_dir = resolve(self.output.dir.as_deref(), "site");
        self.output_resolved = OutputConfig {
            manifest_path: output_dir.join(self.output.manifest.as_deref().unwrap_or("site-map.json")),
            dir: output_dir,
            extension: self
                .output
                .extension
                .clone()
                .unwrap_or_else(|| "html".to_owned()),
        };

        self.types_resolved = TypeTables::from_raw(&self.types);
        self.project_dir = config_dir.join(PROJECT_DIRNAME);
    }
}
