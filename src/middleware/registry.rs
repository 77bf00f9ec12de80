//! Resolution of middleware identifiers to instances.
//!
//! The registry is the one place that knows the collaborators middleware
//! need: authenticators per guard, the throttle counter store, the CORS
//! policy. They are handed in explicitly when the registry is built; nothing
//! is looked up from global state.

use std::collections::HashMap;
use std::sync::Arc;

use super::MiddlewareId;
use super::Middleware;
use super::auth::{Auth, Authenticator, TokenAuthenticator};
use super::cors::{Cors, CorsPolicy};
use super::log::LogRequest;
use super::throttle::{CounterStore, InMemoryCounterStore, Throttle};
use crate::config::Config;
use crate::error::ConfigError;

/// Guard used by a bare `auth` identifier.
pub const DEFAULT_GUARD: &str = "default";

type Factory = Arc<dyn Fn(&[String]) -> Result<Arc<dyn Middleware>, ConfigError> + Send + Sync>;

/// Builds middleware instances from [`MiddlewareId`]s.
///
/// ```rust
/// use std::sync::Arc;
/// use switchyard::middleware::MiddlewareRegistry;
/// use switchyard::middleware::auth::TokenAuthenticator;
///
/// let registry = MiddlewareRegistry::new()
///     .guard("default", Arc::new(TokenAuthenticator::new().with_token("t0k3n", "alice")));
/// ```
pub struct MiddlewareRegistry {
    guards: HashMap<String, Arc<dyn Authenticator>>,
    session_cookie: String,
    counters: Arc<dyn CounterStore>,
    cors: Arc<CorsPolicy>,
    custom: HashMap<String, Factory>,
}

impl MiddlewareRegistry {
    /// No guards, an in-memory counter store and the default CORS policy.
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
            session_cookie: "session_id".to_owned(),
            counters: Arc::new(InMemoryCounterStore::new()),
            cors: Arc::new(CorsPolicy::default()),
            custom: HashMap::new(),
        }
    }

    /// Token guards and CORS policy from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut by_guard: HashMap<&str, TokenAuthenticator> = HashMap::new();
        for entry in &config.auth.tokens {
            let guard = by_guard.remove(entry.guard.as_str()).unwrap_or_default();
            by_guard.insert(&entry.guard, guard.with_token(&entry.token, &entry.subject));
        }

        let mut registry = Self::new()
            .session_cookie(&config.auth.session_cookie)
            .cors(config.cors.clone())?;
        for (name, authenticator) in by_guard {
            registry = registry.guard(name, Arc::new(authenticator));
        }
        Ok(registry)
    }

    pub fn guard(mut self, name: &str, authenticator: Arc<dyn Authenticator>) -> Self {
        self.guards.insert(name.to_owned(), authenticator);
        self
    }

    pub fn session_cookie(mut self, name: &str) -> Self {
        self.session_cookie = name.to_owned();
        self
    }

    /// Replaces the throttle counter store shared by every `throttle` instance.
    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counters = store;
        self
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        self.cors = Arc::new(policy);
        Ok(self)
    }

    /// Registers an application middleware under `name`. The factory receives
    /// the identifier's arguments (`role:admin` → `["admin"]`).
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&[String]) -> Result<Arc<dyn Middleware>, ConfigError> + Send + Sync + 'static,
    {
        self.custom.insert(name.to_owned(), Arc::new(factory));
        self
    }

    pub fn resolve(&self, id: &MiddlewareId) -> Result<Arc<dyn Middleware>, ConfigError> {
        match id {
            MiddlewareId::Auth { guards } => {
                let names: Vec<&str> = if guards.is_empty() {
                    vec![DEFAULT_GUARD]
                } else {
                    guards.iter().map(String::as_str).collect()
                };
                let resolved = names.into_iter()
                    .map(|name| {
                        self.guards.get(name)
                            .map(|a| (name.to_owned(), Arc::clone(a)))
                            .ok_or_else(|| ConfigError::UnknownGuard(name.to_owned()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(Auth::new(resolved, &self.session_cookie)))
            }
            MiddlewareId::Throttle { max_attempts, window_minutes } => Ok(Arc::new(Throttle::new(
                Arc::clone(&self.counters),
                *max_attempts,
                *window_minutes,
            ))),
            MiddlewareId::Cors => Ok(Arc::new(Cors::new(Arc::clone(&self.cors)))),
            MiddlewareId::LogRequest => Ok(Arc::new(LogRequest)),
            MiddlewareId::Custom { name, args } => {
                let factory = self.custom.get(name)
                    .ok_or_else(|| ConfigError::UnknownMiddleware(name.clone()))?;
                factory(args)
            }
        }
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self { Self::new() }
}
