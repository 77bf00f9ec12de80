//! # switchyard
//!
//! Request routing and middleware composition for HTTP CRUD backends.
//!
//! ## What it does
//!
//! - **Routing**: `GET /users/{id}` style patterns, tried in registration
//!   order, with `numeric` / `slug` / `alpha` / regex parameter constraints
//! - **Groups**: shared prefix, middleware and name prefix, nested freely
//! - **Named routes**: reverse URL generation with [`Router::url`]
//! - **Resources**: the seven CRUD routes bound to a [`Controller`] in one call
//! - **Middleware**: `auth`, `throttle:5,1`, `cors`, `log`, plus your own,
//!   composed outermost-first around the handler
//! - **Serving**: hyper (HTTP/1.1 + HTTP/2) on tokio with graceful shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard::middleware::MiddlewareRegistry;
//! use switchyard::middleware::auth::TokenAuthenticator;
//! use switchyard::{Group, Request, Response, Router, Server, Status};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = MiddlewareRegistry::new()
//!         .guard("default", Arc::new(TokenAuthenticator::new().with_token("t0k3n", "alice")));
//!
//!     let mut app = Router::with_registry(registry);
//!     app.global_middleware(["log", "cors"])?;
//!     app.group(Group::new().prefix("api").middleware(["auth", "throttle:60,1"]), |r| {
//!         r.get("/users/{id}", show_user)?.where_number("id")?.name("users.show")?;
//!         r.post("/users", create_user)?.name("users.store")?;
//!         Ok(())
//!     })?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn show_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or_default();
//!     Response::success(serde_json::json!({ "id": id }), None)
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::error(Status::UnprocessableContent, "The name field is required.");
//!     }
//!     Response::success_with(Status::Created, serde_json::json!({ "id": 99 }), Some("User created"))
//! }
//! ```

mod envelope;
mod error;
mod handler;
mod method;
mod pattern;
mod request;
mod resource;
mod response;
mod route;
mod router;
mod server;
mod status;

pub mod config;
pub mod middleware;

pub use config::Config;
pub use envelope::Json;
pub use error::{ConfigError, Error, UrlError};
pub use handler::{Handler, HandlerError};
pub use method::Method;
pub use pattern::{Constraint, Pattern};
pub use request::Request;
pub use resource::{Controller, json_body, require_fields};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::{Action, ResolvedRoute, Route};
pub use router::{Group, RouteBuilder, Router};
pub use server::{Server, serve_listener};
pub use status::Status;
