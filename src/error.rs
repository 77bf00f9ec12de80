//! Error types.
//!
//! Application-level outcomes (404, 401, 429, ...) are expressed as HTTP
//! [`Response`](crate::Response) values, never as errors. The types here cover
//! what can go wrong *around* request handling: building the route table,
//! loading configuration, generating URLs, and binding the listener.

use thiserror::Error;

/// Infrastructure failures surfaced by [`Server`](crate::Server).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A malformed route table, middleware identifier, or configuration file.
///
/// Every variant is fatal at startup: the router refuses to build rather
/// than serve a table that does not mean what it says.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("route `{pattern}` has no parameter named `{param}`")]
    UnknownParameter { pattern: String, param: String },

    #[error("invalid constraint for `{param}`: {source}")]
    InvalidConstraint {
        param: String,
        #[source]
        source: regex::Error,
    },

    #[error("route name `{0}` is already registered")]
    DuplicateRouteName(String),

    #[error("unknown middleware `{0}`")]
    UnknownMiddleware(String),

    #[error("invalid arguments for middleware `{name}`: {reason}")]
    InvalidMiddleware { name: String, reason: String },

    #[error("no authenticator registered for guard `{0}`")]
    UnknownGuard(String),

    #[error("cors: a wildcard origin cannot be combined with credentials")]
    WildcardWithCredentials,

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("invalid bind address `{0}`")]
    InvalidBind(String),

    #[error("reading config: {0}")]
    Read(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reverse URL generation misuse. Recoverable; returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named `{0}`")]
    RouteNotFound(String),

    #[error("route `{route}` requires parameter `{param}`")]
    MissingParameter { route: String, param: String },
}
