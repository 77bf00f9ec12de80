//! Route resolution, groups, constraints and URL generation.

use switchyard::middleware::MiddlewareId;
use switchyard::{ConfigError, Group, Method, Request, Response, Router, Status, UrlError};

async fn ok(_req: Request) -> Response {
    Response::text("ok")
}

async fn echo_id(req: Request) -> Response {
    Response::text(req.param("id").unwrap_or("-").to_owned())
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

#[test]
fn numeric_constraint_filters_tokens() {
    let mut router = Router::new();
    router.get("/users/{id}", ok).unwrap().where_number("id").unwrap();

    assert!(router.resolve(Method::Get, "/users/abc").is_none());
    let resolved = router.resolve(Method::Get, "/users/42").unwrap();
    assert_eq!(resolved.param("id"), Some("42"));
    assert!(!resolved.is_fallback());
}

#[test]
fn slug_and_alpha_constraints() {
    let mut router = Router::new();
    router.get("/posts/{slug}", ok).unwrap().where_slug("slug").unwrap().name("posts.show").unwrap();
    router.get("/tags/{tag}", ok).unwrap().where_alpha("tag").unwrap();
    router.get("/currencies/{code}", ok).unwrap().where_pattern("code", "[A-Z]{3}").unwrap();

    assert!(router.resolve(Method::Get, "/posts/hello-world-2").is_some());
    assert!(router.resolve(Method::Get, "/posts/Hello_World").is_none());
    assert!(router.resolve(Method::Get, "/tags/rust").is_some());
    assert!(router.resolve(Method::Get, "/tags/rust2024").is_none());
    assert!(router.resolve(Method::Get, "/currencies/EUR").is_some());
    assert!(router.resolve(Method::Get, "/currencies/eur").is_none());
}

#[test]
fn constraint_on_missing_parameter_is_a_configuration_error() {
    let mut router = Router::new();
    let err = router.get("/users/{id}", ok).unwrap().where_number("user").err().unwrap();
    assert!(matches!(err, ConfigError::UnknownParameter { ref param, .. } if param == "user"));
}

#[test]
fn registration_order_decides_overlaps() {
    let mut router = Router::new();
    router.get("/users/create", ok).unwrap().name("users.create").unwrap();
    router.get("/users/{id}", ok).unwrap().name("users.show").unwrap();

    let literal = router.resolve(Method::Get, "/users/create").unwrap();
    assert_eq!(literal.route().name(), Some("users.create"));
    let param = router.resolve(Method::Get, "/users/7").unwrap();
    assert_eq!(param.route().name(), Some("users.show"));
}

#[test]
fn method_must_match_and_head_follows_get() {
    let mut router = Router::new();
    router.post("/orders", ok).unwrap();
    router.get("/orders/{id}", ok).unwrap();

    assert!(router.resolve(Method::Get, "/orders").is_none());
    assert!(router.resolve(Method::Post, "/orders").is_some());
    assert!(router.resolve(Method::Head, "/orders/1").is_some());
}

#[test]
fn trailing_and_duplicate_slashes_are_ignored() {
    let mut router = Router::new();
    router.get("/reports/monthly", ok).unwrap();
    assert!(router.resolve(Method::Get, "/reports/monthly/").is_some());
    assert!(router.resolve(Method::Get, "//reports//monthly").is_some());
    assert!(router.resolve(Method::Get, "/Reports/monthly").is_none());
}

#[test]
fn nested_groups_compose_prefix_and_middleware() {
    let registry = switchyard::middleware::MiddlewareRegistry::new().guard(
        "default",
        std::sync::Arc::new(switchyard::middleware::auth::TokenAuthenticator::new()),
    );
    let mut router = Router::with_registry(registry);
    router
        .group(Group::new().prefix("v1").name("v1."), |r| {
            r.group(Group::new().prefix("api").middleware(["auth"]), |r| {
                r.get("/invoices/{id}", ok)?.middleware(["throttle:5,1"])?.name("invoices.show")?;
                Ok(())
            })
        })
        .unwrap();

    let resolved = router.resolve(Method::Get, "/v1/api/invoices/9").unwrap();
    let route = resolved.route();
    assert_eq!(route.pattern().as_str(), "/v1/api/invoices/{id}");
    assert_eq!(route.name(), Some("v1.invoices.show"));
    assert_eq!(
        route.middleware(),
        [
            MiddlewareId::Auth { guards: vec![] },
            MiddlewareId::Throttle { max_attempts: 5, window_minutes: 1 },
        ]
    );
    assert!(router.resolve(Method::Get, "/api/invoices/9").is_none());
}

#[test]
fn group_stack_is_popped_after_errors() {
    let mut router = Router::new();
    let err = router.group(Group::new().prefix("admin"), |r| {
        r.get("/users/{id", ok)?;
        Ok(())
    });
    assert!(matches!(err, Err(ConfigError::InvalidPattern { .. })));

    router.get("/health", ok).unwrap();
    assert!(router.resolve(Method::Get, "/health").is_some());
    assert!(router.resolve(Method::Get, "/admin/health").is_none());
}

#[test]
fn unknown_group_middleware_fails_at_registration() {
    let mut router = Router::new();
    let err = router.group(Group::new().middleware(["audit"]), |_| Ok(()));
    assert!(matches!(err, Err(ConfigError::UnknownMiddleware(ref n)) if n == "audit"));
}

#[test]
fn url_generation() {
    let mut router = Router::new();
    router.get("/users/{id}", ok).unwrap().name("users.show").unwrap();
    router.get("/", ok).unwrap().name("home").unwrap();

    assert_eq!(router.url("users.show", [("id", 42)]).unwrap(), "/users/42");
    assert_eq!(router.url("home", Vec::<(&str, &str)>::new()).unwrap(), "/");
    assert_eq!(
        router.url("users.show", [("id", "7"), ("tab", "billing history")]).unwrap(),
        "/users/7?tab=billing+history"
    );
    assert_eq!(
        router.url("users.show", Vec::<(&str, &str)>::new()),
        Err(UrlError::MissingParameter { route: "users.show".into(), param: "id".into() })
    );
    assert_eq!(
        router.url("users.edit", [("id", 1)]),
        Err(UrlError::RouteNotFound("users.edit".into()))
    );
}

#[tokio::test]
async fn generated_urls_resolve_back_to_their_route() {
    let mut router = Router::new();
    router
        .get("/files/{name}", |req: Request| async move { Response::text(req.param("name").unwrap_or("-").to_owned()) })
        .unwrap()
        .name("files.show")
        .unwrap();

    let url = router.url("files.show", [("name", "reports/q3 draft.pdf")]).unwrap();
    assert_eq!(url, "/files/reports%2Fq3%20draft.pdf");

    let resolved = router.resolve(Method::Get, &url).unwrap();
    assert_eq!(resolved.route().name(), Some("files.show"));
    assert_eq!(resolved.param("name"), Some("reports/q3 draft.pdf"));

    let res = router.dispatch(Request::new(Method::Get, &url)).await;
    assert_eq!(body(&res), "reports/q3 draft.pdf");
}

#[test]
fn route_names_are_unique() {
    let mut router = Router::new();
    router.get("/a", ok).unwrap().name("dup").unwrap();
    let err = router.get("/b", ok).unwrap().name("dup").err().unwrap();
    assert!(matches!(err, ConfigError::DuplicateRouteName(ref n) if n == "dup"));
}

#[test]
fn fallback_only_when_nothing_matches() {
    let mut router = Router::new();
    router.get("/users/{id}", ok).unwrap().where_number("id").unwrap();
    assert!(router.resolve(Method::Get, "/nowhere").is_none());

    router.fallback(ok).unwrap();
    assert!(router.resolve(Method::Get, "/nowhere").unwrap().is_fallback());
    assert!(!router.resolve(Method::Get, "/users/1").unwrap().is_fallback());
    assert_eq!(router.routes().count(), 2);
}

#[tokio::test]
async fn dispatch_binds_params_and_runs_handler() {
    let mut router = Router::new();
    router.get("/users/{id}", echo_id).unwrap().where_number("id").unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/users/42")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(body(&res), "42");
}

#[tokio::test]
async fn dispatch_answers_404_and_405() {
    let mut router = Router::new();
    router.get("/users", ok).unwrap();
    router.post("/users", ok).unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/missing")).await;
    assert_eq!(res.status_code(), 404);
    let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(json, serde_json::json!({"success": false, "error": "Not Found", "status": 404}));

    let res = router.dispatch(Request::new(Method::Delete, "/users")).await;
    assert_eq!(res.status_code(), 405);
    assert_eq!(res.header("allow"), Some("GET, POST"));
}

#[tokio::test]
async fn dispatch_uses_fallback() {
    let mut router = Router::new();
    router.fallback(|_req: Request| async { Response::error(Status::NotFound, "Page missing") }).unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/anything/at/all")).await;
    assert_eq!(res.status_code(), 404);
    assert!(body(&res).contains("Page missing"));
}

#[tokio::test]
async fn redirects() {
    let mut router = Router::new();
    router.redirect("/home", "/dashboard").unwrap();
    router.permanent_redirect("/old-invoices", "/invoices").unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/home")).await;
    assert_eq!(res.status_code(), 302);
    assert_eq!(res.header("location"), Some("/dashboard"));

    let res = router.dispatch(Request::new(Method::Post, "/old-invoices")).await;
    assert_eq!(res.status_code(), 301);
    assert_eq!(res.header("location"), Some("/invoices"));
}

#[tokio::test]
async fn head_requests_drop_the_body() {
    let mut router = Router::new();
    router.get("/report", ok).unwrap();

    let res = router.dispatch(Request::new(Method::Head, "/report")).await;
    assert_eq!(res.status_code(), 200);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn panics_become_500_envelopes() {
    let mut router = Router::new();
    router.get("/boom", |_req: Request| async {
        if true {
            panic!("database exploded");
        }
        Response::text("unreachable")
    }).unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/boom")).await;
    assert_eq!(res.status_code(), 500);
    let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["status"], 500);
}

#[tokio::test]
async fn handler_errors_become_500_envelopes() {
    let mut router = Router::new();
    router.get("/parse", |_req: Request| async {
        let n: u32 = "forty-two".parse()?;
        Ok::<_, switchyard::HandlerError>(Response::text(n.to_string()))
    }).unwrap();

    let res = router.dispatch(Request::new(Method::Get, "/parse")).await;
    assert_eq!(res.status_code(), 500);
    assert!(body(&res).contains("Server Error"));
}
