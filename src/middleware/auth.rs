//! Authentication middleware.
//!
//! Looks for a credential on the request: a bearer token in the
//! `authorization` header first, then the session cookie. Each configured
//! guard gets a chance to turn it into a subject. The first guard that
//! accepts wins and its [`Principal`] is attached to the request; if none
//! does, the chain stops with `401`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// Identity attached to an authenticated request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    pub subject: String,
    /// The guard that accepted the credential.
    pub guard: String,
}

/// A credential presented by the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Credential<'a> {
    Bearer(&'a str),
    Session(&'a str),
}

/// Resolves credentials to subjects.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, credential: &Credential<'_>) -> Option<String>;
}

/// Static bearer tokens, typically loaded from configuration.
#[derive(Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, subject: &str) -> Self {
        self.tokens.insert(token.to_owned(), subject.to_owned());
        self
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, credential: &Credential<'_>) -> Option<String> {
        match credential {
            Credential::Bearer(token) => self.tokens.get(*token).cloned(),
            Credential::Session(_) => None,
        }
    }
}

/// In-memory session id → subject table. Cheap to share; clone the `Arc`.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, subject: &str) {
        self.sessions.insert(session_id.to_owned(), subject.to_owned());
    }

    /// Returns `true` if the session existed.
    pub fn revoke(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }
}

impl Authenticator for SessionStore {
    fn authenticate(&self, credential: &Credential<'_>) -> Option<String> {
        match credential {
            Credential::Session(id) => self.sessions.get(*id).map(|s| s.value().clone()),
            Credential::Bearer(_) => None,
        }
    }
}

/// The `auth` middleware.
pub struct Auth {
    guards: Vec<(String, Arc<dyn Authenticator>)>,
    session_cookie: String,
}

impl Auth {
    pub fn new(guards: Vec<(String, Arc<dyn Authenticator>)>, session_cookie: &str) -> Self {
        Self { guards, session_cookie: session_cookie.to_owned() }
    }

    fn credentials<'r>(&self, req: &'r Request) -> Vec<Credential<'r>> {
        // The scheme name is case-insensitive.
        let bearer = req.header("authorization")
            .and_then(|h| h.trim_start().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|t| !t.is_empty())
            .map(Credential::Bearer);
        let session = req.cookie(&self.session_cookie)
            .filter(|s| !s.is_empty())
            .map(Credential::Session);
        bearer.into_iter().chain(session).collect()
    }

    fn authenticate(&self, req: &Request) -> Option<Principal> {
        let credentials = self.credentials(req);
        self.guards.iter().find_map(|(guard, authenticator)| {
            credentials.iter()
                .find_map(|c| authenticator.authenticate(c))
                .map(|subject| Principal { subject, guard: guard.clone() })
        })
    }
}

impl Middleware for Auth {
    fn handle<'a>(&'a self, mut req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            match self.authenticate(&req) {
                Some(principal) => {
                    debug!(subject = %principal.subject, guard = %principal.guard, "authenticated");
                    req.extensions_mut().insert(principal);
                    next.run(req).await
                }
                None => {
                    warn!(method = %req.method(), path = %req.path(), "unauthenticated request rejected");
                    Response::error(Status::Unauthorized, "Unauthenticated.")
                }
            }
        })
    }
}
