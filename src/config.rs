use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

/// Field network address of the arena server.
pub const DEFAULT_LOCAL_URL: &str = "http://10.0.100.5:8080/display?displayId=";
/// Public internet address of the arena server.
pub const DEFAULT_REMOTE_URL: &str = "https://cheesyarena.com/display?displayId=";
/// Well-known location of an operator-provisioned display identifier.
pub const DEFAULT_DISPLAY_ID_PATH: &str = "/boot/display_id";
pub const DEFAULT_LOG_FILE: &str = "arena-kiosk.log";

/// Which of the two server bases an endpoint refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointKind {
    /// Arena field network.
    Local,
    /// Public internet server.
    Remote,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Local => write!(f, "local"),
            EndpointKind::Remote => write!(f, "remote"),
        }
    }
}

/// Immutable server base URL, already ending in the `displayId=` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub base_url: String,
}

impl Endpoint {
    pub fn new(kind: EndpointKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
        }
    }

    /// Final display URL for the given identifier.
    pub fn display_url(&self, display_id: &str) -> String {
        format!("{}{}", self.base_url, display_id)
    }
}

/// Both candidate server bases, probed local first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(default = "EndpointSettings::default_local")]
    pub local: String,
    #[serde(default = "EndpointSettings::default_remote")]
    pub remote: String,
}

impl EndpointSettings {
    fn default_local() -> String {
        DEFAULT_LOCAL_URL.into()
    }

    fn default_remote() -> String {
        DEFAULT_REMOTE_URL.into()
    }

    /// Endpoints in probe priority order.
    pub fn ordered(&self) -> [Endpoint; 2] {
        [
            Endpoint::new(EndpointKind::Local, self.local.clone()),
            Endpoint::new(EndpointKind::Remote, self.remote.clone()),
        ]
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            local: Self::default_local(),
            remote: Self::default_remote(),
        }
    }
}

/// Optional adjustments to the browser launch command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Use this launcher binary instead of looking one up on `PATH`.
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Where the active settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Built-in defaults; the config location could not be used.
    Defaults { reason: String },
}

/// Top-level kiosk configuration persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskSettings {
    #[serde(default)]
    pub endpoints: EndpointSettings,
    #[serde(default = "KioskSettings::default_display_id_path")]
    pub display_id_path: PathBuf,
    #[serde(default = "KioskSettings::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "KioskSettings::default_poll_period_secs")]
    pub poll_period_secs: u64,
    #[serde(default = "KioskSettings::default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            endpoints: EndpointSettings::default(),
            display_id_path: Self::default_display_id_path(),
            http_timeout_secs: Self::default_http_timeout_secs(),
            poll_period_secs: Self::default_poll_period_secs(),
            log_file: Self::default_log_file(),
            browser: BrowserSettings::default(),
        }
    }
}

impl KioskSettings {
    fn default_display_id_path() -> PathBuf {
        PathBuf::from(DEFAULT_DISPLAY_ID_PATH)
    }

    fn default_http_timeout_secs() -> u64 {
        5
    }

    fn default_poll_period_secs() -> u64 {
        5
    }

    fn default_log_file() -> PathBuf {
        PathBuf::from(DEFAULT_LOG_FILE)
    }

    /// Load settings from disk, writing defaults if missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Unable to read config at {}", path.display()))?;
            let parsed: Self = serde_json::from_str(&raw)
                .with_context(|| format!("Malformed config at {}", path.display()))?;
            Ok(parsed)
        } else {
            let settings = Self::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    /// Load settings from the platform default location.
    ///
    /// A missing config directory, or one that cannot be read or written, falls back to
    /// built-in defaults. A malformed file is still an error.
    pub fn load_from_default_location(path: Result<PathBuf>) -> Result<(Self, ConfigSource)> {
        let path = match path {
            Ok(path) => path,
            Err(err) => return Ok(Self::fallback(err)),
        };
        if path.exists() {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    let err = anyhow::Error::new(err)
                        .context(format!("Unable to read config at {}", path.display()));
                    return Ok(Self::fallback(err));
                }
            };
            let parsed: Self = serde_json::from_str(&raw)
                .with_context(|| format!("Malformed config at {}", path.display()))?;
            return Ok((parsed, ConfigSource::File(path)));
        }
        let settings = Self::default();
        match settings.save(&path) {
            Ok(()) => Ok((settings, ConfigSource::File(path))),
            Err(err) => Ok(Self::fallback(err)),
        }
    }

    fn fallback(err: anyhow::Error) -> (Self, ConfigSource) {
        (
            Self::default(),
            ConfigSource::Defaults {
                reason: format!("{err:#}"),
            },
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let serialised = serde_json::to_string_pretty(self)?;
        fs::write(path, serialised)
            .with_context(|| format!("Failed to persist config to {}", path.display()))
    }

    /// Reject settings the kiosk cannot run with.
    pub fn validate(&self) -> Result<()> {
        for endpoint in self.endpoints.ordered() {
            validate_endpoint(&endpoint)?;
        }
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be greater than zero");
        }
        if self.poll_period_secs == 0 {
            bail!("poll_period_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_secs)
    }
}

fn validate_endpoint(endpoint: &Endpoint) -> Result<()> {
    let parsed = Url::parse(&endpoint.base_url).with_context(|| {
        format!(
            "invalid {} endpoint URL '{}'",
            endpoint.kind, endpoint.base_url
        )
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!(
            "{} endpoint '{}' uses unsupported scheme '{other}'",
            endpoint.kind,
            endpoint.base_url
        ),
    }
}

/// Default location of the kiosk configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "team254", "ArenaKiosk")
        .context("Unable to resolve platform config directory")?;
    Ok(dirs.config_dir().join("kiosk.json"))
}
