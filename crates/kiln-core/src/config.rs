use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::api::PlatformApi;
use crate::client::KilnClient;
use crate::error::KilnError;
use crate::intercept::TracingHooks;
use crate::model::{EnvironmentRecord, SnapshotRecord};
use crate::stub::StubPlatform;

/// Environment variable that overrides `platform.token`.
pub const TOKEN_ENV: &str = "KILN_TOKEN";

#[derive(Debug, Default, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub stub: StubConfig,
}

#[derive(Debug, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            token: None,
        }
    }
}

fn default_provider() -> Provider {
    Provider::Http
}
fn default_base_url() -> String {
    "https://prod1.datalayer.run".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum Provider {
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "stub")]
    Stub,
}

#[derive(Debug, Deserialize)]
pub struct DefaultsConfig {
    pub environment: Option<String>,
    #[serde(default)]
    pub reuse_existing: bool,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            environment: None,
            reuse_existing: false,
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    60_000
}

/// Seed data for `provider = "stub"`.
#[derive(Debug, Default, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub environments: Vec<EnvironmentRecord>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
}

impl KilnConfig {
    pub fn from_file(path: &Path) -> Result<Self, KilnError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| KilnError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Load `path` if given, else the default location if it exists, else
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, KilnError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)
                } else {
                    tracing::debug!(path = %default.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Default config location: ~/.kiln/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kiln")
            .join("config.toml")
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.defaults.wait_timeout_ms)
    }

    pub fn build_platform(&self) -> Result<Arc<dyn PlatformApi>, KilnError> {
        match self.platform.provider {
            Provider::Stub => Ok(Arc::new(
                StubPlatform::new()
                    .with_environments(self.stub.environments.clone())
                    .with_snapshots(self.stub.snapshots.clone()),
            )),
            Provider::Http => self.build_http(),
        }
    }

    #[cfg(feature = "http")]
    fn build_http(&self) -> Result<Arc<dyn PlatformApi>, KilnError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.platform.token.clone())
            .ok_or_else(|| {
                KilnError::Config(format!(
                    "No platform token: set {TOKEN_ENV} or platform.token in the config file"
                ))
            })?;
        Ok(Arc::new(crate::http::HttpPlatform::new(
            self.platform.base_url.clone(),
            token,
        )))
    }

    #[cfg(not(feature = "http"))]
    fn build_http(&self) -> Result<Arc<dyn PlatformApi>, KilnError> {
        Err(KilnError::Config(
            "provider \"http\" requires the `http` feature".into(),
        ))
    }

    /// A client over the configured platform with call tracing installed.
    pub fn build_client(&self) -> Result<KilnClient, KilnError> {
        let platform = self.build_platform()?;
        Ok(KilnClient::with_hooks(platform, Arc::new(TracingHooks))
            .with_ready_timeout(self.wait_timeout()))
    }
}
