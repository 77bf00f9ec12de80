//! Middleware layer.
//!
//! A middleware wraps the rest of the chain. It receives the request and a
//! [`Next`] handle, and decides what happens:
//!
//! - return a response without calling `next` (short-circuit: 401, 429, a
//!   CORS preflight answer),
//! - change the request, then call `next`,
//! - call `next`, then change the response on its way out.
//!
//! The first-declared middleware is the outermost one:
//!
//! ```text
//! [A, B] → A-before → B-before → handler → B-after → A-after
//! ```
//!
//! Routes name their middleware with string identifiers (`"auth"`,
//! `"throttle:5,1"`). Identifiers are parsed into [`MiddlewareId`] and
//! resolved against a [`MiddlewareRegistry`] when the route is registered,
//! so a typo fails at startup instead of at request time.

pub mod auth;
pub mod cors;
pub mod log;
pub mod registry;
pub mod throttle;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use crate::handler::BoxFuture;
pub use registry::MiddlewareRegistry;

use crate::error::ConfigError;
use crate::handler::ErasedHandler;
use crate::request::Request;

/// A composable request/response interceptor.
///
/// ```rust
/// use switchyard::Request;
/// use switchyard::middleware::{BoxFuture, Middleware, Next};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
///         Box::pin(async move {
///             let mut res = next.run(req).await;
///             res.set_header("x-powered-by", "switchyard");
///             res
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a>;
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a (dyn ErasedHandler + Send + Sync),
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        chain: &'a [Arc<dyn Middleware>],
        endpoint: &'a (dyn ErasedHandler + Send + Sync),
    ) -> Self {
        Self { chain, endpoint }
    }

    /// Runs the following link; the last link is the route handler.
    pub fn run(self, req: Request) -> BoxFuture<'a> {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(req, Next { chain: rest, endpoint: self.endpoint }),
            None => self.endpoint.call(req),
        }
    }
}

// ── Identifiers ───────────────────────────────────────────────────────────────

/// A parsed middleware identifier.
///
/// Grammar: `name[:arg[,arg]*]`.
///
/// | text | variant |
/// |---|---|
/// | `auth`, `auth:api,web` | [`Auth`](MiddlewareId::Auth) |
/// | `throttle`, `throttle:5`, `throttle:5,1` | [`Throttle`](MiddlewareId::Throttle) (defaults `60,1`) |
/// | `cors` | [`Cors`](MiddlewareId::Cors) |
/// | `log` | [`LogRequest`](MiddlewareId::LogRequest) |
/// | anything else | [`Custom`](MiddlewareId::Custom), resolved by registered factory |
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MiddlewareId {
    /// Guards are tried in order; empty means the `default` guard.
    Auth { guards: Vec<String> },
    Throttle { max_attempts: u32, window_minutes: u64 },
    Cors,
    LogRequest,
    Custom { name: String, args: Vec<String> },
}

impl MiddlewareId {
    /// Parses every identifier in `ids`, stopping at the first bad one.
    pub fn parse_all<I>(ids: I) -> Result<Vec<Self>, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        ids.into_iter().map(|id| id.as_ref().parse()).collect()
    }
}

impl FromStr for MiddlewareId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args): (&str, Vec<String>) = match s.split_once(':') {
            Some((name, args)) => (name.trim(), args.split(',').map(|a| a.trim().to_owned()).collect()),
            None => (s.trim(), Vec::new()),
        };
        let invalid = |reason: &str| ConfigError::InvalidMiddleware {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        if name.is_empty() {
            return Err(ConfigError::UnknownMiddleware(s.to_owned()));
        }
        if args.iter().any(String::is_empty) {
            return Err(invalid("empty argument"));
        }

        match name {
            "auth" => Ok(Self::Auth { guards: args }),
            "throttle" => {
                let max_attempts = match args.first() {
                    Some(a) => a.parse().map_err(|_| invalid("max attempts must be an integer"))?,
                    None => 60,
                };
                let window_minutes = match args.get(1) {
                    Some(a) => a.parse().map_err(|_| invalid("window must be whole minutes"))?,
                    None => 1,
                };
                if args.len() > 2 {
                    return Err(invalid("expected `throttle:max,minutes`"));
                }
                if max_attempts == 0 || window_minutes == 0 {
                    return Err(invalid("limits must be positive"));
                }
                if window_minutes > throttle::MAX_WINDOW_MINUTES {
                    return Err(invalid("window must not exceed one year"));
                }
                Ok(Self::Throttle { max_attempts, window_minutes })
            }
            "cors" | "log" if !args.is_empty() => Err(invalid("takes no arguments")),
            "cors" => Ok(Self::Cors),
            "log" => Ok(Self::LogRequest),
            _ => Ok(Self::Custom { name: name.to_owned(), args }),
        }
    }
}

impl fmt::Display for MiddlewareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, args): (&str, Vec<String>) = match self {
            Self::Auth { guards } => ("auth", guards.clone()),
            Self::Throttle { max_attempts, window_minutes } => {
                ("throttle", vec![max_attempts.to_string(), window_minutes.to_string()])
            }
            Self::Cors => ("cors", Vec::new()),
            Self::LogRequest => ("log", Vec::new()),
            Self::Custom { name, args } => (name.as_str(), args.clone()),
        };
        f.write_str(name)?;
        if !args.is_empty() {
            write!(f, ":{}", args.join(","))?;
        }
        Ok(())
    }
}
