//! Configuration management for patchview.
//!
//! Parses `patchview.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `rietveld.server`
//! - `rietveld.issue`
//! - `rietveld.path_prefix`
//! - `rietveld.base_url`
//! - `test.fixture`
//! - `store.dir`
//! - `files.base_dir`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Read this Rietveld issue (selects the rietveld backend).
    pub issue: Option<String>,
    /// Override the Rietveld server URL.
    pub server: Option<String>,
    /// Serve this fixture file (selects the test backend).
    pub fixture: Option<PathBuf>,
    /// Override the base directory patches are overlaid on.
    pub base_dir: Option<PathBuf>,
    /// Override cache enabled flag.
    pub cache_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "patchview.toml";

/// Default Rietveld server.
const DEFAULT_SERVER: &str = "https://codereview.chromium.org";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Patch source selection.
    pub patcher: PatcherConfig,
    /// Rietveld backend configuration.
    pub rietveld: Option<RietveldConfig>,
    /// Test backend configuration (paths are relative strings from TOML).
    test: Option<TestConfigRaw>,
    /// Cache configuration (paths are relative strings from TOML).
    store: StoreConfigRaw,
    /// Base file system configuration (paths are relative strings from TOML).
    files: FilesConfigRaw,

    /// Resolved test backend configuration (set after loading).
    #[serde(skip)]
    pub test_resolved: TestConfig,
    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: StoreConfig,
    /// Resolved base file system configuration (set after loading).
    #[serde(skip)]
    pub files_resolved: FilesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Which patch source to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatcherBackend {
    /// A Rietveld code review issue.
    Rietveld,
    /// A JSON fixture file.
    Test,
    /// No patch: the base file system as is.
    #[default]
    None,
}

/// Patch source configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Backend to read patches from.
    pub backend: PatcherBackend,
    /// How long a fetched version is trusted before asking the backend again.
    pub version_max_age_secs: u64,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            backend: PatcherBackend::None,
            version_max_age_secs: 30,
        }
    }
}

impl PatcherConfig {
    /// Version freshness window.
    #[must_use]
    pub fn version_max_age(&self) -> Duration {
        Duration::from_secs(self.version_max_age_secs)
    }
}

/// Rietveld backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RietveldConfig {
    /// Server root URL.
    pub server: String,
    /// Issue number.
    pub issue: String,
    /// Only files under this repository prefix are visible, prefix stripped.
    pub path_prefix: Option<String>,
    /// Reject issues whose base URL differs from this one.
    pub base_url: Option<String>,
    /// HTTP deadline per request.
    pub timeout_secs: u64,
}

impl Default for RietveldConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            issue: String::new(),
            path_prefix: None,
            base_url: None,
            timeout_secs: 20,
        }
    }
}

impl RietveldConfig {
    /// Validate Rietveld configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.issue, "rietveld.issue")?;
        require_non_empty(&self.server, "rietveld.server")?;
        require_http_url(&self.server, "rietveld.server")?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "rietveld.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// HTTP deadline per request.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Raw test backend configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TestConfigRaw {
    fixture: Option<String>,
}

/// Resolved test backend configuration.
#[derive(Debug, Default)]
pub struct TestConfig {
    /// JSON fixture describing the patch set.
    pub fixture: Option<PathBuf>,
}

/// Where cached patch data is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In process memory, lost on exit.
    #[default]
    Memory,
    /// Files under [`StoreConfig::dir`].
    File,
    /// No caching.
    None,
}

/// Raw cache configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreConfigRaw {
    backend: Option<StoreBackend>,
    dir: Option<String>,
}

/// Resolved cache configuration with absolute paths.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// Storage backend.
    pub backend: StoreBackend,
    /// Directory for the file backend.
    pub dir: PathBuf,
}

/// Raw base file system configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FilesConfigRaw {
    base_dir: Option<String>,
}

/// Resolved base file system configuration.
#[derive(Debug, Default)]
pub struct FilesConfig {
    /// Directory the patch applies to.
    pub base_dir: PathBuf,
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
        /// Config field path (e.g., "`rietveld.issue`").
        field: String,
        /// Error message.
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

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `patchview.toml` in current directory and
    /// parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the final configuration is invalid.
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
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(issue) = &settings.issue {
            self.rietveld.get_or_insert_with(RietveldConfig::default).issue = issue.clone();
            self.patcher.backend = PatcherBackend::Rietveld;
        }
        if let Some(server) = &settings.server {
            self.rietveld.get_or_insert_with(RietveldConfig::default).server = server.clone();
        }
        if let Some(fixture) = &settings.fixture {
            self.test_resolved.fixture = Some(fixture.clone());
            self.patcher.backend = PatcherBackend::Test;
        }
        if let Some(base_dir) = &settings.base_dir {
            self.files_resolved.base_dir.clone_from(base_dir);
        }
        if settings.cache_enabled == Some(false) {
            self.store_resolved.backend = StoreBackend::None;
        }
    }

    /// Get validated Rietveld configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_rietveld(&self) -> Result<&RietveldConfig, ConfigError> {
        let rietveld = self.rietveld.as_ref().ok_or_else(|| {
            ConfigError::Validation("[rietveld] section required in config".into())
        })?;
        rietveld.validate()?;
        Ok(rietveld)
    }

    /// Get the fixture path of the test backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no fixture is configured.
    pub fn require_fixture(&self) -> Result<&Path, ConfigError> {
        self.test_resolved
            .fixture
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("test.fixture is required".to_owned()))
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
    fn default_with_base(base: &Path) -> Self {
        Self {
            patcher: PatcherConfig::default(),
            rietveld: None,
            test: None,
            store: StoreConfigRaw::default(),
            files: FilesConfigRaw::default(),
            test_resolved: TestConfig::default(),
            store_resolved: StoreConfig {
                backend: StoreBackend::Memory,
                dir: base.join(".pv/cache"),
            },
            files_resolved: FilesConfig {
                base_dir: base.to_path_buf(),
            },
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
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Only the section of the selected backend is checked.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.patcher.backend {
            PatcherBackend::Rietveld => {
                self.require_rietveld()?;
            }
            PatcherBackend::Test => {
                self.require_fixture()?;
            }
            PatcherBackend::None => {}
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref mut rietveld) = self.rietveld {
            rietveld.server = expand::expand_env(&rietveld.server, "rietveld.server")?;
            rietveld.issue = expand::expand_env(&rietveld.issue, "rietveld.issue")?;
            rietveld.path_prefix =
                expand::expand_env_opt(rietveld.path_prefix.as_ref(), "rietveld.path_prefix")?;
            rietveld.base_url =
                expand::expand_env_opt(rietveld.base_url.as_ref(), "rietveld.base_url")?;
        }

        if let Some(ref mut test) = self.test {
            test.fixture = expand::expand_env_opt(test.fixture.as_ref(), "test.fixture")?;
        }

        self.store.dir = expand::expand_env_opt(self.store.dir.as_ref(), "store.dir")?;
        self.files.base_dir = expand::expand_env_opt(self.files.base_dir.as_ref(), "files.base_dir")?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.test_resolved = TestConfig {
            fixture: self
                .test
                .as_ref()
                .and_then(|test| test.fixture.as_deref())
                .map(|fixture| config_dir.join(fixture)),
        };

        self.store_resolved = StoreConfig {
            backend: self.store.backend.unwrap_or_default(),
            dir: resolve(self.store.dir.as_deref(), ".pv/cache"),
        };

        self.files_resolved = FilesConfig {
            base_dir: resolve(self.files.base_dir.as_deref(), "."),
        };
    }
}
