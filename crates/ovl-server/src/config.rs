use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ovl_store::WriteMode;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub store_root: PathBuf,
    pub origin: OriginConfig,
    pub write_mode: WriteMode,
    /// Cap on how much of a local response is buffered before the hit/miss
    /// decision. `None` buffers everything.
    pub max_shadow_bytes: Option<usize>,
    /// Longest a request may take before it is answered with 408, in whole
    /// seconds in TOML.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            store_root: PathBuf::from("/tmp/ovl"),
            origin: OriginConfig::default(),
            write_mode: WriteMode::Direct,
            max_shadow_bytes: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> ServerResult<()> {
        let host = self.origin.host.trim();
        if host.is_empty() {
            return Err(ServerError::Config("origin host is not set".into()));
        }
        if host.contains('/') {
            return Err(ServerError::Config(format!(
                "origin host must be a bare host[:port], got {host:?}"
            )));
        }
        if self.max_shadow_bytes == Some(0) {
            return Err(ServerError::Config("max_shadow_bytes must be positive".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ServerError::Config("request_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote service being overlaid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// `host` or `host:port` every miss is forwarded to.
    pub host: String,
    pub scheme: Scheme,
    /// Skip certificate validation on the forward leg. Origins are usually
    /// addressed by IP, so their certificates rarely match.
    pub insecure_skip_verify: bool,
    /// Forward the client's `Host` header instead of the origin address.
    pub preserve_host: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            scheme: Scheme::Https,
            insecure_skip_verify: true,
            preserve_host: true,
        }
    }
}

impl OriginConfig {
    /// `scheme://host` prefix for forwarded requests.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host.trim())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
