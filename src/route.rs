//! Registered routes and match results.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareId};
use crate::pattern::Pattern;

/// What a route runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// An inline handler function or closure.
    Closure,
    /// A named action on a registered [`Controller`](crate::Controller).
    Controller { controller: &'static str, action: &'static str },
    Redirect { to: String, status: u16 },
    Fallback,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure => f.write_str("Closure"),
            Self::Controller { controller, action } => write!(f, "{controller}@{action}"),
            Self::Redirect { to, status } => write!(f, "redirect {status} → {to}"),
            Self::Fallback => f.write_str("Fallback"),
        }
    }
}

/// A registered route. Immutable once the router is built.
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) pattern: Pattern,
    pub(crate) name: Option<String>,
    pub(crate) action: Action,
    pub(crate) middleware: Vec<MiddlewareId>,
    pub(crate) layers: Vec<Arc<dyn Middleware>>,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    pub fn methods(&self) -> &[Method] { &self.methods }
    pub fn pattern(&self) -> &Pattern { &self.pattern }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn action(&self) -> &Action { &self.action }

    /// Group middleware first (outermost group first), then route middleware.
    pub fn middleware(&self) -> &[MiddlewareId] { &self.middleware }

    /// `HEAD` is served by `GET` routes.
    pub(crate) fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method) || (method == Method::Head && self.methods.contains(&Method::Get))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .field("action", &self.action)
            .field("middleware", &self.middleware)
            .finish()
    }
}

/// The outcome of a successful [`Router::resolve`](crate::Router::resolve).
#[derive(Debug)]
pub struct ResolvedRoute<'r> {
    pub(crate) route: &'r Route,
    pub(crate) params: HashMap<String, String>,
    pub(crate) fallback: bool,
}

impl<'r> ResolvedRoute<'r> {
    pub fn route(&self) -> &'r Route { self.route }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// `true` when nothing matched and the fallback route was selected.
    pub fn is_fallback(&self) -> bool { self.fallback }
}
