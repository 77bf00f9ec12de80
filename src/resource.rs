//! Resource controllers and the CRUD endpoint convention.
//!
//! A [`Controller`] groups the actions for one entity. [`Router::resource`]
//! binds all seven conventional routes to it in one call:
//!
//! | Method | Path | Action | Name |
//! |---|---|---|---|
//! | GET | `/users` | `index` | `users.index` |
//! | GET | `/users/create` | `create` | `users.create` |
//! | POST | `/users` | `store` | `users.store` |
//! | GET | `/users/{id}` | `show` | `users.show` |
//! | GET | `/users/{id}/edit` | `edit` | `users.edit` |
//! | PUT, PATCH | `/users/{id}` | `update` | `users.update` |
//! | DELETE | `/users/{id}` | `destroy` | `users.destroy` |
//!
//! [`Router::api_resource`] skips `create` and `edit`, which only make sense
//! for HTML forms.
//!
//! Each action follows the same shape: check required fields, look the
//! entity up, answer `404` if it is missing, mutate, answer with an
//! envelope. [`json_body`] and [`require_fields`] cover the first step.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;
use crate::handler::Handler;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::route::Action;
use crate::router::{RouteBuilder, Router};
use crate::status::Status;

/// CRUD actions for one entity. `create` and `edit` default to `404`.
pub trait Controller: Send + Sync + 'static {
    fn index(&self, req: Request) -> impl Future<Output = Response> + Send;
    fn store(&self, req: Request) -> impl Future<Output = Response> + Send;
    fn show(&self, req: Request) -> impl Future<Output = Response> + Send;
    fn update(&self, req: Request) -> impl Future<Output = Response> + Send;
    fn destroy(&self, req: Request) -> impl Future<Output = Response> + Send;

    fn create(&self, _req: Request) -> impl Future<Output = Response> + Send {
        async { Response::error(Status::NotFound, Status::NotFound.reason()) }
    }

    fn edit(&self, _req: Request) -> impl Future<Output = Response> + Send {
        async { Response::error(Status::NotFound, Status::NotFound.reason()) }
    }
}

/// Wraps one controller method as a handler holding its own `Arc`.
macro_rules! action {
    ($controller:expr, $action:ident) => {{
        let controller = Arc::clone($controller);
        move |req: Request| {
            let controller = Arc::clone(&controller);
            async move { controller.$action(req).await }
        }
    }};
}

impl Router {
    /// Registers the seven conventional routes under `base`.
    pub fn resource<C: Controller>(&mut self, base: &str, controller: Arc<C>) -> Result<(), ConfigError> {
        self.register_resource(base, controller, true)
    }

    /// Registers the five API routes (no `create`, no `edit`).
    pub fn api_resource<C: Controller>(&mut self, base: &str, controller: Arc<C>) -> Result<(), ConfigError> {
        self.register_resource(base, controller, false)
    }

    fn register_resource<C: Controller>(
        &mut self,
        base: &str,
        controller: Arc<C>,
        forms: bool,
    ) -> Result<(), ConfigError> {
        let name = base.split('/')
            .filter(|s| !s.is_empty() && !s.starts_with('{'))
            .collect::<Vec<_>>()
            .join(".");
        let type_name = std::any::type_name::<C>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        let c = &controller;
        let item = format!("{base}/{{id}}");

        self.bind(&[Method::Get], base, short, "index", action!(c, index))?
            .name(&format!("{name}.index"))?;
        if forms {
            self.bind(&[Method::Get], &format!("{base}/create"), short, "create", action!(c, create))?
                .name(&format!("{name}.create"))?;
        }
        self.bind(&[Method::Post], base, short, "store", action!(c, store))?
            .name(&format!("{name}.store"))?;
        self.bind(&[Method::Get], &item, short, "show", action!(c, show))?
            .name(&format!("{name}.show"))?;
        if forms {
            self.bind(&[Method::Get], &format!("{item}/edit"), short, "edit", action!(c, edit))?
                .name(&format!("{name}.edit"))?;
        }
        self.bind(&[Method::Put, Method::Patch], &item, short, "update", action!(c, update))?
            .name(&format!("{name}.update"))?;
        self.bind(&[Method::Delete], &item, short, "destroy", action!(c, destroy))?
            .name(&format!("{name}.destroy"))?;
        Ok(())
    }

    fn bind(
        &mut self,
        methods: &[Method],
        path: &str,
        controller: &'static str,
        action: &'static str,
        handler: impl Handler,
    ) -> Result<RouteBuilder<'_>, ConfigError> {
        self.register(
            methods,
            path,
            handler.into_boxed_handler(),
            Action::Controller { controller, action },
        )
    }
}

/// Parses the request body as JSON, answering `400` when it is malformed.
pub fn json_body<T: DeserializeOwned>(req: &Request) -> Result<T, Response> {
    req.json().map_err(|_| Response::error(Status::BadRequest, "Malformed JSON body."))
}

/// Checks that each of `fields` is present, non-null and not an empty
/// string. Answers `422` naming every missing field.
pub fn require_fields(body: &Value, fields: &[&str]) -> Result<(), Response> {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for field in fields {
        let present = match body.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !present {
            errors.insert((*field).to_owned(), vec![format!("The {field} field is required.")]);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Response::validation_error(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_every_missing_field() {
        let body = json!({"name": "Acme", "email": "", "phone": null});
        let res = require_fields(&body, &["name", "email", "phone", "vat"]).unwrap_err();
        assert_eq!(res.status_code(), 422);

        let parsed: Value = serde_json::from_slice(res.body()).unwrap();
        let errors = parsed["errors"].as_object().unwrap();
        let mut missing: Vec<&str> = errors.keys().map(String::as_str).collect();
        missing.sort_unstable();
        assert_eq!(missing, ["email", "phone", "vat"]);
    }

    #[test]
    fn accepts_complete_bodies() {
        let body = json!({"name": "Acme", "active": false, "qty": 0});
        assert!(require_fields(&body, &["name", "active", "qty"]).is_ok());
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let req = Request::new(Method::Post, "/users").with_body("{not json");
        let res = json_body::<Value>(&req).unwrap_err();
        assert_eq!(res.status_code(), 400);
    }
}
