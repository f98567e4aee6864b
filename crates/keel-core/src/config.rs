use std::time::Duration;

use serde::{Deserialize, Serialize};

/// keel.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeelConfig {
    #[serde(default)]
    pub rack: RackConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub aws: AwsConfig,
}

/// Overrides for the `aws` CLI used by release commands. Unset fields fall
/// back to the CLI's own configuration chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackConfig {
    /// Rack name, used as the prefix of release tables and stacks
    #[serde(default = "default_rack_name")]
    pub name: String,
    /// Rack API host (without scheme)
    #[serde(default = "default_host")]
    pub host: String,
    /// Rack API scheme
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// App name (defaults to the project directory name)
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Manifest path sent with every build request
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Build-definition file, always shipped with full tarballs
    #[serde(default = "default_build_file")]
    pub build_file: String,
    /// Project-level ignore file
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
    /// Prefer incremental (content-indexed) uploads
    #[serde(default)]
    pub incremental: bool,
    /// Let the builder reuse cached image layers
    #[serde(default = "default_cache")]
    pub cache: bool,
    /// Seconds between build status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Give up observing a build after this many seconds
    #[serde(default = "default_poll_deadline_secs")]
    pub poll_deadline_secs: u64,
}

impl Default for RackConfig {
    fn default() -> Self {
        Self {
            name: default_rack_name(),
            host: default_host(),
            scheme: default_scheme(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            build_file: default_build_file(),
            ignore_file: default_ignore_file(),
            incremental: false,
            cache: default_cache(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_deadline_secs: default_poll_deadline_secs(),
        }
    }
}

impl BuildConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_secs(self.poll_deadline_secs)
    }
}

impl RackConfig {
    /// Base URL of the rack API, e.g. `https://rack.example.com`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl KeelConfig {
    /// Load from keel.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join("keel.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

fn default_rack_name() -> String {
    "keel".to_owned()
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_scheme() -> String {
    "https".to_owned()
}

fn default_manifest() -> String {
    "docker-compose.yml".to_owned()
}

fn default_build_file() -> String {
    "Dockerfile".to_owned()
}

fn default_ignore_file() -> String {
    ".dockerignore".to_owned()
}

fn default_cache() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_poll_deadline_secs() -> u64 {
    3600
}
