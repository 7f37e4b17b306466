//! Server configuration.
//!
//! Defaults, optionally overlaid with a YAML file, then with environment
//! variables:
//!
//! | Variable             | Field                          |
//! |----------------------|--------------------------------|
//! | `LISTEN`             | `server.listen_addr`           |
//! | `KV_MAX_CONNECTIONS` | `server.max_connections`       |
//! | `KV_BUFFER_SIZE`     | `server.buffer_size`           |
//! | `KV_WEB_ROOT`        | `static_files.root`            |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Size of the connection table
    pub max_connections: usize,
    /// Per-connection buffer size; one byte is always kept free
    pub buffer_size: usize,
    /// Readiness events fetched per poll
    pub max_events: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub enabled: bool,
    pub root: PathBuf,
    pub index: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            max_connections: 1000,
            buffer_size: 4096,
            max_events: 64,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("web"),
            index: "index.html".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen_addr))
    }

    /// Replaces the port of `listen_addr`, keeping its host.
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.listen_addr = addr.to_string();
        Ok(())
    }
}

impl Config {
    /// Defaults plus environment overrides.
    pub fn load() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut cfg = Self::from_yaml_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be at least 1");
        }
        if self.server.buffer_size < 16 {
            bail!(
                "server.buffer_size must be at least 16 bytes, got {}",
                self.server.buffer_size
            );
        }
        if self.server.max_events == 0 {
            bail!("server.max_events must be at least 1");
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("LISTEN") {
            self.server.listen_addr = addr;
        }
        if let Some(n) = env_usize("KV_MAX_CONNECTIONS") {
            self.server.max_connections = n;
        }
        if let Some(n) = env_usize("KV_BUFFER_SIZE") {
            self.server.buffer_size = n;
        }
        if let Ok(root) = std::env::var("KV_WEB_ROOT") {
            self.static_files.root = PathBuf::from(root);
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring non-numeric override");
            None
        }
    }
}
