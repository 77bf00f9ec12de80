//! The route table and request dispatch.
//!
//! Routes are tried in registration order and the first full match wins, so
//! overlapping patterns are resolved by the order you register them in:
//! register `/users/create` before `/users/{id}`. Build the router once at
//! startup; after that it is only read, and is shared as `Arc<Router>`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error};

use crate::error::{ConfigError, UrlError};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareId, MiddlewareRegistry, Next};
use crate::pattern::{self, Constraint, Pattern};
use crate::request::Request;
use crate::response::Response;
use crate::route::{Action, ResolvedRoute, Route};
use crate::status::Status;

/// Methods registered by [`Router::any`] and [`Router::redirect`].
const ANY: [Method; 6] = [
    Method::Get,
    Method::Post,
    Method::Put,
    Method::Patch,
    Method::Delete,
    Method::Options,
];

/// Shared attributes for a set of routes.
///
/// ```rust
/// use switchyard::Group;
///
/// let admin = Group::new().prefix("admin").middleware(["auth"]).name("admin.");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Group {
    prefix: String,
    middleware: Vec<String>,
    name: String,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    pub fn middleware<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.middleware.extend(ids.into_iter().map(|id| id.as_ref().to_owned()));
        self
    }

    /// Prepended to the names of routes registered inside the group.
    pub fn name(mut self, prefix: &str) -> Self {
        self.name = prefix.to_owned();
        self
    }
}

struct Frame {
    prefix: String,
    middleware: Vec<MiddlewareId>,
    name: String,
}

/// The application router.
///
/// ```rust
/// use switchyard::{Group, Request, Response, Router};
///
/// async fn show(req: Request) -> Response {
///     Response::text(req.param("id").unwrap_or_default().to_owned())
/// }
///
/// # fn main() -> Result<(), switchyard::ConfigError> {
/// let mut router = Router::new();
/// router.group(Group::new().prefix("v1"), |r| {
///     r.get("/users/{id}", show)?.where_number("id")?.name("users.show")?;
///     Ok(())
/// })?;
/// assert_eq!(router.url("users.show", [("id", 42)]).unwrap(), "/v1/users/42");
/// # Ok(())
/// # }
/// ```
pub struct Router {
    routes: Vec<Route>,
    names: HashMap<String, usize>,
    fallback: Option<Route>,
    global: Vec<(MiddlewareId, Arc<dyn Middleware>)>,
    frames: Vec<Frame>,
    registry: MiddlewareRegistry,
    not_found: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self::with_registry(MiddlewareRegistry::new())
    }

    pub fn with_registry(registry: MiddlewareRegistry) -> Self {
        Self {
            routes: Vec::new(),
            names: HashMap::new(),
            fallback: None,
            global: Vec::new(),
            frames: Vec::new(),
            registry,
            not_found: not_found.into_boxed_handler(),
        }
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Adds middleware that wraps every request, matched or not.
    pub fn global_middleware<I>(&mut self, ids: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for id in MiddlewareId::parse_all(ids)? {
            let layer = self.registry.resolve(&id)?;
            self.global.push((id, layer));
        }
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Get], path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Post], path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Put], path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Patch], path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Delete], path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&[Method::Options], path, handler)
    }

    pub fn any(&mut self, path: &str, handler: impl Handler) -> Result<RouteBuilder<'_>, ConfigError> {
        self.route(&ANY, path, handler)
    }

    /// Registers `handler` for several methods at once.
    pub fn route(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: impl Handler,
    ) -> Result<RouteBuilder<'_>, ConfigError> {
        self.register(methods, path, handler.into_boxed_handler(), Action::Closure)
    }

    /// Answers every method on `from` with a `302` pointing at `to`.
    pub fn redirect(&mut self, from: &str, to: &str) -> Result<RouteBuilder<'_>, ConfigError> {
        self.redirect_with(from, to, Status::Found)
    }

    /// Same as [`redirect`](Router::redirect) with `301`.
    pub fn permanent_redirect(&mut self, from: &str, to: &str) -> Result<RouteBuilder<'_>, ConfigError> {
        self.redirect_with(from, to, Status::MovedPermanently)
    }

    pub fn redirect_with(
        &mut self,
        from: &str,
        to: &str,
        status: Status,
    ) -> Result<RouteBuilder<'_>, ConfigError> {
        let target = to.to_owned();
        let handler = move |_req: Request| {
            let target = target.clone();
            async move { Response::redirect(status, &target) }
        };
        let action = Action::Redirect { to: to.to_owned(), status: status.code() };
        self.register(&ANY, from, handler.into_boxed_handler(), action)
    }

    /// Handler for requests no route matches, under the current group's
    /// middleware. Replaces any previous fallback.
    pub fn fallback(&mut self, handler: impl Handler) -> Result<(), ConfigError> {
        let (pattern, middleware, layers) = self.prepare("")?;
        self.fallback = Some(Route {
            methods: ANY.to_vec(),
            pattern,
            name: None,
            action: Action::Fallback,
            middleware,
            layers,
            handler: handler.into_boxed_handler(),
        });
        Ok(())
    }

    /// Registers the routes `build` adds with `group`'s prefix, middleware and
    /// name prefix applied. Groups nest.
    pub fn group<F>(&mut self, group: Group, build: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Router) -> Result<(), ConfigError>,
    {
        let middleware = MiddlewareId::parse_all(&group.middleware)?;
        for id in &middleware {
            self.registry.resolve(id)?;
        }
        self.frames.push(Frame { prefix: group.prefix, middleware, name: group.name });
        let result = build(self);
        self.frames.pop();
        result
    }

    pub(crate) fn register(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: BoxedHandler,
        action: Action,
    ) -> Result<RouteBuilder<'_>, ConfigError> {
        let (pattern, middleware, layers) = self.prepare(path)?;
        debug!(methods = ?methods, pattern = %pattern, action = %action, "route registered");
        self.routes.push(Route {
            methods: methods.to_vec(),
            pattern,
            name: None,
            action,
            middleware,
            layers,
            handler,
        });
        let index = self.routes.len() - 1;
        Ok(RouteBuilder { router: self, index })
    }

    /// Applies the group stack to `path`: full pattern plus the inherited
    /// middleware, already resolved.
    fn prepare(
        &self,
        path: &str,
    ) -> Result<(Pattern, Vec<MiddlewareId>, Vec<Arc<dyn Middleware>>), ConfigError> {
        let prefix = self.frames.iter().fold(String::new(), |acc, f| pattern::join(&acc, &f.prefix));
        let pattern = Pattern::parse(&pattern::join(&prefix, path))?;
        let middleware: Vec<MiddlewareId> = self.frames.iter()
            .flat_map(|f| f.middleware.iter().cloned())
            .collect();
        let layers = middleware.iter()
            .map(|id| self.registry.resolve(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((pattern, middleware, layers))
    }

    fn name_prefix(&self) -> String {
        self.frames.iter().map(|f| f.name.as_str()).collect()
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Every registered route in precedence order, fallback last.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().chain(self.fallback.iter())
    }

    /// Finds the route for `method` + `path`: the first registered route that
    /// matches, else the fallback, else `None`.
    pub fn resolve(&self, method: Method, path: &str) -> Option<ResolvedRoute<'_>> {
        self.routes.iter()
            .filter(|r| r.allows(method))
            .find_map(|r| {
                r.pattern.matches(path).map(|params| ResolvedRoute { route: r, params, fallback: false })
            })
            .or_else(|| {
                self.fallback.as_ref().map(|r| ResolvedRoute {
                    route: r,
                    params: HashMap::new(),
                    fallback: true,
                })
            })
    }

    /// Methods for which some route matches `path`.
    fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::new();
        for route in self.routes.iter().filter(|r| r.pattern.matches(path).is_some()) {
            for method in &route.methods {
                if !allowed.contains(method) {
                    allowed.push(*method);
                }
            }
        }
        allowed
    }

    /// Generates the path of the route called `name`.
    ///
    /// Values for the pattern's placeholders are substituted; any other
    /// entries are appended as a query string, in the order given.
    pub fn url<I, K, V>(&self, name: &str, params: I) -> Result<String, UrlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let index = self.names.get(name).ok_or_else(|| UrlError::RouteNotFound(name.to_owned()))?;
        let pattern = &self.routes[*index].pattern;
        let values: Vec<(String, String)> = params.into_iter()
            .map(|(k, v)| (k.as_ref().to_owned(), v.to_string()))
            .collect();

        let mut out = pattern.render(&values)
            .map_err(|param| UrlError::MissingParameter { route: name.to_owned(), param })?;

        let extra: Vec<(&str, &str)> = values.iter()
            .filter(|(k, _)| !pattern.params().any(|p| p == k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !extra.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(extra)
                .finish();
            out.push('?');
            out.push_str(&query);
        }
        Ok(out)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Routes one request through its middleware chain to its handler.
    ///
    /// Never fails: unmatched requests get `404` (or `405` with an `allow`
    /// header when the path exists under other methods), and a panic anywhere
    /// in the chain becomes a `500` error envelope.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let is_head = req.method == Method::Head;
        let mut chain: Vec<Arc<dyn Middleware>> = self.global.iter()
            .map(|(_, layer)| Arc::clone(layer))
            .collect();

        let endpoint = match self.resolve(req.method, &req.path) {
            Some(resolved) => {
                chain.extend(resolved.route.layers.iter().cloned());
                req.route_name = resolved.route.name.clone();
                req.params = resolved.params;
                Arc::clone(&resolved.route.handler)
            }
            None => self.unmatched(&req.path),
        };

        let next = Next::new(&chain, endpoint.as_ref());
        let mut res = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => {
                error!(panic = panic_message(panic.as_ref()), "request handler panicked");
                Response::error(Status::InternalServerError, "Server Error")
            }
        };

        if is_head {
            res.clear_body();
        }
        res
    }

    fn unmatched(&self, path: &str) -> BoxedHandler {
        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            return Arc::clone(&self.not_found);
        }
        let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        let handler = move |_req: Request| {
            let allow = allow.clone();
            async move {
                let mut res = Response::error(Status::MethodNotAllowed, Status::MethodNotAllowed.reason());
                res.set_header("allow", allow);
                res
            }
        };
        handler.into_boxed_handler()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> Response {
    Response::error(Status::NotFound, Status::NotFound.reason())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic.downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ── RouteBuilder ──────────────────────────────────────────────────────────────

/// Refines the route that was just registered.
///
/// Each call consumes and returns the builder so constraints chain:
/// `router.get("/posts/{slug}", show)?.where_slug("slug")?.name("posts.show")?;`
pub struct RouteBuilder<'r> {
    router: &'r mut Router,
    index: usize,
}

impl RouteBuilder<'_> {
    pub fn where_number(self, param: &str) -> Result<Self, ConfigError> {
        self.constrain(param, Constraint::Numeric)
    }

    pub fn where_slug(self, param: &str) -> Result<Self, ConfigError> {
        self.constrain(param, Constraint::Slug)
    }

    pub fn where_alpha(self, param: &str) -> Result<Self, ConfigError> {
        self.constrain(param, Constraint::Alpha)
    }

    /// Custom constraint; `regex` is anchored at both ends.
    pub fn where_pattern(self, param: &str, regex: &str) -> Result<Self, ConfigError> {
        let constraint = Constraint::pattern(param, regex)?;
        self.constrain(param, constraint)
    }

    fn constrain(self, param: &str, constraint: Constraint) -> Result<Self, ConfigError> {
        self.router.routes[self.index].pattern.constrain(param, constraint)?;
        Ok(self)
    }

    /// Names the route (with the enclosing groups' name prefixes) for
    /// [`Router::url`]. Names are unique across the table.
    pub fn name(self, name: &str) -> Result<Self, ConfigError> {
        let full = format!("{}{name}", self.router.name_prefix());
        if self.router.names.contains_key(&full) {
            return Err(ConfigError::DuplicateRouteName(full));
        }
        if let Some(old) = self.router.routes[self.index].name.replace(full.clone()) {
            self.router.names.remove(&old);
        }
        self.router.names.insert(full, self.index);
        Ok(self)
    }

    /// Appends route-level middleware after the inherited group middleware.
    pub fn middleware<I>(self, ids: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for id in MiddlewareId::parse_all(ids)? {
            let layer = self.router.registry.resolve(&id)?;
            let route = &mut self.router.routes[self.index];
            route.middleware.push(id);
            route.layers.push(layer);
        }
        Ok(self)
    }

    pub fn route(&self) -> &Route {
        &self.router.routes[self.index]
    }
}
