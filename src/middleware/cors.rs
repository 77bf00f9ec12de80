//! Cross-Origin Resource Sharing.
//!
//! Requests without an `origin` header are not cross-origin and pass
//! through untouched. An `OPTIONS` request with an origin is a preflight and
//! is answered here, never reaching a route. Everything else runs the chain
//! and gets the CORS response headers added on the way out.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{BoxFuture, Middleware, Next};
use crate::error::ConfigError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// What the `cors` middleware allows. `"*"` in `allowed_origins` or
/// `allowed_headers` allows anything.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    /// Seconds a preflight answer may be cached.
    pub max_age: Option<u64>,
    pub allow_credentials: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ],
            allowed_headers: vec![
                "content-type".to_owned(),
                "authorization".to_owned(),
                "x-requested-with".to_owned(),
            ],
            exposed_headers: Vec::new(),
            max_age: Some(86_400),
            allow_credentials: false,
        }
    }
}

impl CorsPolicy {
    /// Browsers refuse `*` together with credentials, so the combination is
    /// rejected up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allow_credentials && self.wildcard_origin() {
            return Err(ConfigError::WildcardWithCredentials);
        }
        Ok(())
    }

    fn wildcard_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Value for `access-control-allow-origin`, or `None` if `origin` is not allowed.
    fn allow_origin(&self, origin: &str) -> Option<String> {
        if self.wildcard_origin() {
            Some("*".to_owned())
        } else if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_owned())
        } else {
            None
        }
    }

    fn allow_headers(&self, requested: Option<&str>) -> String {
        match requested {
            Some(requested) if self.allowed_headers.iter().any(|h| h == "*") => requested.to_owned(),
            _ => self.allowed_headers.join(", "),
        }
    }
}

/// The `cors` middleware.
pub struct Cors {
    policy: Arc<CorsPolicy>,
}

impl Cors {
    pub fn new(policy: Arc<CorsPolicy>) -> Self {
        Self { policy }
    }

    fn preflight(&self, origin: &str, req: &Request) -> Response {
        let Some(allow_origin) = self.policy.allow_origin(origin) else {
            warn!(origin, path = %req.path(), "cors preflight from disallowed origin");
            return Response::error(Status::Forbidden, "Origin not allowed.");
        };
        debug!(origin, path = %req.path(), "cors preflight");

        let methods: Vec<&str> = self.policy.allowed_methods.iter().map(|m| m.as_str()).collect();
        let mut res = Response::status(Status::NoContent);
        res.set_header("access-control-allow-origin", allow_origin);
        res.set_header("access-control-allow-methods", methods.join(", "));
        res.set_header(
            "access-control-allow-headers",
            self.policy.allow_headers(req.header("access-control-request-headers")),
        );
        if let Some(max_age) = self.policy.max_age {
            res.set_header("access-control-max-age", max_age.to_string());
        }
        self.decorate_common(&mut res);
        res
    }

    fn decorate_common(&self, res: &mut Response) {
        if self.policy.allow_credentials {
            res.set_header("access-control-allow-credentials", "true");
        }
        if !self.policy.wildcard_origin() {
            res.append_header("vary", "origin");
        }
    }
}

impl Middleware for Cors {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let Some(origin) = req.header("origin").map(str::to_owned) else {
                return next.run(req).await;
            };

            if req.method() == Method::Options {
                return self.preflight(&origin, &req);
            }

            let mut res = next.run(req).await;
            if let Some(allow_origin) = self.policy.allow_origin(&origin) {
                res.set_header("access-control-allow-origin", allow_origin);
                if !self.policy.exposed_headers.is_empty() {
                    res.set_header("access-control-expose-headers", self.policy.exposed_headers.join(", "));
                }
                self.decorate_common(&mut res);
            }
            res
        })
    }
}
