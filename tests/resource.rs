//! Resource controllers: the CRUD endpoint convention end to end.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use switchyard::{Action, Controller, Group, Method, Request, Response, Router, Status, json_body, require_fields};
use tokio::sync::RwLock;

#[derive(Clone, Debug, Deserialize, Serialize)]
struct Customer {
    id: u64,
    name: String,
    email: String,
}

#[derive(Default)]
struct Customers {
    next_id: AtomicU64,
    rows: RwLock<BTreeMap<u64, Customer>>,
}

fn not_found() -> Response {
    Response::error(Status::NotFound, "Customer not found.")
}

fn id_of(req: &Request) -> Option<u64> {
    req.param("id")?.parse().ok()
}

impl Controller for Customers {
    async fn index(&self, _req: Request) -> Response {
        let rows: Vec<Customer> = self.rows.read().await.values().cloned().collect();
        Response::success(rows, None)
    }

    async fn store(&self, req: Request) -> Response {
        let body: Value = match json_body(&req) {
            Ok(body) => body,
            Err(res) => return res,
        };
        if let Err(res) = require_fields(&body, &["name", "email"]) {
            return res;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let customer = Customer {
            id,
            name: body["name"].as_str().unwrap_or_default().to_owned(),
            email: body["email"].as_str().unwrap_or_default().to_owned(),
        };
        self.rows.write().await.insert(id, customer.clone());
        Response::success_with(Status::Created, customer, Some("Customer created."))
    }

    async fn show(&self, req: Request) -> Response {
        let Some(id) = id_of(&req) else { return not_found() };
        match self.rows.read().await.get(&id) {
            Some(customer) => Response::success(customer, None),
            None => not_found(),
        }
    }

    async fn update(&self, req: Request) -> Response {
        let Some(id) = id_of(&req) else { return not_found() };
        let body: Value = match json_body(&req) {
            Ok(body) => body,
            Err(res) => return res,
        };
        let mut rows = self.rows.write().await;
        let Some(customer) = rows.get_mut(&id) else { return not_found() };
        if let Some(name) = body["name"].as_str() {
            customer.name = name.to_owned();
        }
        if let Some(email) = body["email"].as_str() {
            customer.email = email.to_owned();
        }
        Response::success(&*customer, Some("Customer updated."))
    }

    async fn destroy(&self, req: Request) -> Response {
        let Some(id) = id_of(&req) else { return not_found() };
        match self.rows.write().await.remove(&id) {
            Some(_) => Response::success(Value::Null, Some("Customer deleted.")),
            None => not_found(),
        }
    }

    async fn create(&self, _req: Request) -> Response {
        Response::text("<form>new customer</form>")
    }
}

fn parse(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

fn api_router() -> Router {
    let mut router = Router::new();
    router
        .group(Group::new().prefix("api"), |r| r.api_resource("customers", Arc::new(Customers::default())))
        .unwrap();
    router
}

#[tokio::test]
async fn crud_lifecycle() {
    let router = api_router();

    let res = router
        .dispatch(Request::new(Method::Post, "/api/customers").with_body(r#"{"name":"Acme","email":"ops@acme.test"}"#))
        .await;
    assert_eq!(res.status_code(), 201);
    let created = parse(&res);
    assert_eq!(created["success"], true);
    assert_eq!(created["message"], "Customer created.");
    assert_eq!(created["data"]["id"], 1);

    let res = router.dispatch(Request::new(Method::Get, "/api/customers/1")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(parse(&res)["data"]["name"], "Acme");

    let res = router
        .dispatch(Request::new(Method::Patch, "/api/customers/1").with_body(r#"{"name":"Acme Ltd"}"#))
        .await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(parse(&res)["data"]["name"], "Acme Ltd");
    assert_eq!(parse(&res)["data"]["email"], "ops@acme.test");

    let res = router
        .dispatch(Request::new(Method::Put, "/api/customers/1").with_body(r#"{"email":"billing@acme.test"}"#))
        .await;
    assert_eq!(parse(&res)["data"]["email"], "billing@acme.test");

    let res = router.dispatch(Request::new(Method::Get, "/api/customers")).await;
    assert_eq!(parse(&res)["data"].as_array().map(Vec::len), Some(1));

    let res = router.dispatch(Request::new(Method::Delete, "/api/customers/1")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(parse(&res), json!({"success": true, "data": null, "message": "Customer deleted."}));

    let res = router.dispatch(Request::new(Method::Get, "/api/customers/1")).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(parse(&res), json!({"success": false, "error": "Customer not found.", "status": 404}));
}

#[tokio::test]
async fn store_validates_input() {
    let router = api_router();

    let res = router
        .dispatch(Request::new(Method::Post, "/api/customers").with_body(r#"{"name":""}"#))
        .await;
    assert_eq!(res.status_code(), 422);
    let body = parse(&res);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["name"][0], "The name field is required.");
    assert_eq!(body["errors"]["email"][0], "The email field is required.");

    let res = router
        .dispatch(Request::new(Method::Post, "/api/customers").with_body("name=Acme"))
        .await;
    assert_eq!(res.status_code(), 400);
}

#[test]
fn api_resource_registers_five_named_routes() {
    let router = api_router();
    let names: Vec<(&str, &str, String)> = router
        .routes()
        .map(|r| {
            let methods = r.methods().iter().map(|m| m.as_str()).collect::<Vec<_>>().join("|");
            (r.name().unwrap_or("-"), r.pattern().as_str(), methods)
        })
        .collect();

    assert_eq!(
        names,
        [
            ("customers.index", "/api/customers", "GET".to_owned()),
            ("customers.store", "/api/customers", "POST".to_owned()),
            ("customers.show", "/api/customers/{id}", "GET".to_owned()),
            ("customers.update", "/api/customers/{id}", "PUT|PATCH".to_owned()),
            ("customers.destroy", "/api/customers/{id}", "DELETE".to_owned()),
        ]
    );
    let create = router.resolve(Method::Get, "/api/customers/create").unwrap();
    assert_eq!(create.route().name(), Some("customers.show"));
}

#[tokio::test]
async fn full_resource_adds_form_routes() {
    let mut router = Router::new();
    router.resource("admin/customers", Arc::new(Customers::default())).unwrap();

    let create = router.resolve(Method::Get, "/admin/customers/create").unwrap();
    assert_eq!(create.route().name(), Some("admin.customers.create"));
    assert_eq!(
        create.route().action(),
        &Action::Controller { controller: "Customers", action: "create" }
    );
    let res = router.dispatch(Request::new(Method::Get, "/admin/customers/create")).await;
    assert_eq!(res.body(), b"<form>new customer</form>");

    // `edit` is not overridden, so it answers 404.
    let res = router.dispatch(Request::new(Method::Get, "/admin/customers/5/edit")).await;
    assert_eq!(res.status_code(), 404);

    assert_eq!(router.url("admin.customers.edit", [("id", 5)]).unwrap(), "/admin/customers/5/edit");
    assert_eq!(router.routes().count(), 7);
}

#[test]
fn resource_names_collide_like_any_other_route() {
    let mut router = Router::new();
    router.api_resource("customers", Arc::new(Customers::default())).unwrap();
    let err = router.api_resource("customers", Arc::new(Customers::default())).unwrap_err();
    assert!(matches!(err, switchyard::ConfigError::DuplicateRouteName(ref n) if n == "customers.index"));
}
