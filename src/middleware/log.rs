//! Per-request access log.

use std::time::Instant;

use tracing::info;

use super::{BoxFuture, Middleware, Next};
use crate::request::Request;

/// The `log` middleware: one `tracing` event per request with method, path,
/// route name, status and latency. Never short-circuits.
pub struct LogRequest;

impl Middleware for LogRequest {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let method = req.method();
            let path = req.path().to_owned();
            let route = req.route_name().unwrap_or("-").to_owned();
            let started = Instant::now();

            let res = next.run(req).await;

            info!(
                %method,
                %path,
                %route,
                status = res.status_code(),
                duration_ms = started.elapsed().as_millis() as u64,
                "request"
            );
            res
        })
    }
}
