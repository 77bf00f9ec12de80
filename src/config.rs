//! Configuration loading.
//!
//! ```text
//! config.toml
//!     → toml::from_str   (syntax, types, defaults)
//!     → Config::validate (bind address, middleware ids, cors policy)
//!     → Config           (immutable; read once at startup)
//! ```
//!
//! Every section is optional. An empty file yields a server on
//! `0.0.0.0:3000` with request logging as the only global middleware.

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::middleware::MiddlewareId;
use crate::middleware::cors::CorsPolicy;
use crate::middleware::registry::DEFAULT_GUARD;

/// Top-level configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsPolicy,
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Global middleware identifiers, outermost first.
    pub middleware: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_owned(),
            middleware: vec!["log".to_owned()],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_cookie: String,
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { session_cookie: "session_id".to_owned(), tokens: Vec::new() }
    }
}

/// A static bearer token accepted by `guard`.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub subject: String,
    #[serde(default = "default_guard")]
    pub guard: String,
}

fn default_guard() -> String {
    DEFAULT_GUARD.to_owned()
}

impl Config {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        std::fs::read_to_string(path)?.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.global_middleware()?;
        self.cors.validate()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse()
            .map_err(|_| ConfigError::InvalidBind(self.server.bind.clone()))
    }

    pub fn global_middleware(&self) -> Result<Vec<MiddlewareId>, ConfigError> {
        MiddlewareId::parse_all(&self.server.middleware)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
