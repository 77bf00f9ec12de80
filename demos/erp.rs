//! A small ERP backend: customers and invoices behind token auth, a public
//! product catalogue, and a legacy redirect.
//!
//! Run with:
//!   RUST_LOG=info,switchyard=debug cargo run --example erp -- --config demos/erp.toml
//!
//! Try:
//!   curl http://localhost:3000/api/v1/products
//!   curl http://localhost:3000/api/v1/customers -H 'authorization: Bearer ops-token'
//!   curl -X POST http://localhost:3000/api/v1/customers \
//!        -H 'authorization: Bearer ops-token' \
//!        -d '{"name":"Acme","email":"ops@acme.test"}'
//!   curl -i http://localhost:3000/clients

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use serde_json::{Value, json};
use switchyard::middleware::MiddlewareRegistry;
use switchyard::{
    Config, Controller, Group, Json, Request, Response, Router, Server, Status, json_body, require_fields,
};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "erp", about = "Demo ERP backend")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "erp=info,switchyard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let app = build(&config)?;
    for route in app.routes() {
        tracing::debug!(?route, "route");
    }

    Server::from_config(&config)?.serve(app).await?;
    Ok(())
}

fn build(config: &Config) -> Result<Router, switchyard::ConfigError> {
    let mut app = Router::with_registry(MiddlewareRegistry::from_config(config)?);
    app.global_middleware(&config.server.middleware)?;

    app.get("/", |_req: Request| async { Json(json!({"service": "erp", "version": "1.0"})) })?
        .name("home")?;
    app.permanent_redirect("/clients", "/api/v1/customers")?;

    let customers = Arc::new(Customers::default());
    let invoices = Arc::new(Invoices::default());

    app.group(Group::new().prefix("api/v1").name("api."), |api| {
        api.get("/products", list_products)?.name("products.index")?;
        api.get("/products/{sku}", show_product)?
            .where_pattern("sku", "[A-Z]{3}-[0-9]{4}")?
            .name("products.show")?;

        api.group(Group::new().middleware(["auth", "throttle:60,1"]), |secured| {
            secured.api_resource("customers", customers)?;
            secured.api_resource("invoices", invoices)?;
            Ok(())
        })
    })?;

    app.fallback(|req: Request| async move {
        Response::error(Status::NotFound, &format!("No endpoint at {}.", req.path()))
    })?;
    Ok(app)
}

// ── Products ──────────────────────────────────────────────────────────────────

const PRODUCTS: [(&str, &str, u32); 3] = [
    ("BOL-0001", "Hex bolt M8", 12),
    ("NUT-0001", "Hex nut M8", 4),
    ("WSH-0001", "Washer M8", 1),
];

async fn list_products(_req: Request) -> Response {
    let rows: Vec<Value> = PRODUCTS.iter()
        .map(|(sku, name, cents)| json!({"sku": sku, "name": name, "price_cents": cents}))
        .collect();
    Response::success(rows, None)
}

async fn show_product(req: Request) -> Response {
    let sku = req.param("sku").unwrap_or_default();
    match PRODUCTS.iter().find(|(s, _, _)| *s == sku) {
        Some((sku, name, cents)) => Response::success(json!({"sku": sku, "name": name, "price_cents": cents}), None),
        None => Response::error(Status::NotFound, "Product not found."),
    }
}

// ── In-memory tables ──────────────────────────────────────────────────────────

/// A table of JSON rows keyed by a sequential id.
#[derive(Default)]
struct Table {
    next_id: AtomicU64,
    rows: RwLock<BTreeMap<u64, Value>>,
}

impl Table {
    async fn all(&self) -> Vec<Value> {
        self.rows.read().await.values().cloned().collect()
    }

    async fn get(&self, id: u64) -> Option<Value> {
        self.rows.read().await.get(&id).cloned()
    }

    async fn insert(&self, mut row: Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        row["id"] = json!(id);
        self.rows.write().await.insert(id, row.clone());
        row
    }

    /// Merges the top-level keys of `patch` into the row.
    async fn update(&self, id: u64, patch: &Value) -> Option<Value> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id)?;
        if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in patch.iter().filter(|(k, _)| k.as_str() != "id") {
                row.insert(key.clone(), value.clone());
            }
        }
        Some(row.clone())
    }

    async fn remove(&self, id: u64) -> bool {
        self.rows.write().await.remove(&id).is_some()
    }
}

fn id_param(req: &Request) -> Option<u64> {
    req.param("id")?.parse().ok()
}

/// The shared CRUD flow: validate, look up, 404 when missing, mutate, envelope.
macro_rules! crud_controller {
    ($name:ident, $label:literal, [$($required:literal),*]) => {
        #[derive(Default)]
        struct $name {
            table: Table,
        }

        impl Controller for $name {
            async fn index(&self, _req: Request) -> Response {
                Response::success(self.table.all().await, None)
            }

            async fn store(&self, req: Request) -> Response {
                let body: Value = match json_body(&req) {
                    Ok(body) => body,
                    Err(res) => return res,
                };
                if let Err(res) = require_fields(&body, &[$($required),*]) {
                    return res;
                }
                let row = self.table.insert(body).await;
                Response::success_with(Status::Created, row, Some(concat!($label, " created.")))
            }

            async fn show(&self, req: Request) -> Response {
                match id_param(&req) {
                    Some(id) => match self.table.get(id).await {
                        Some(row) => Response::success(row, None),
                        None => missing($label),
                    },
                    None => missing($label),
                }
            }

            async fn update(&self, req: Request) -> Response {
                let Some(id) = id_param(&req) else { return missing($label) };
                let patch: Value = match json_body(&req) {
                    Ok(body) => body,
                    Err(res) => return res,
                };
                match self.table.update(id, &patch).await {
                    Some(row) => Response::success(row, Some(concat!($label, " updated."))),
                    None => missing($label),
                }
            }

            async fn destroy(&self, req: Request) -> Response {
                let Some(id) = id_param(&req) else { return missing($label) };
                if self.table.remove(id).await {
                    Response::success(Value::Null, Some(concat!($label, " deleted.")))
                } else {
                    missing($label)
                }
            }
        }
    };
}

crud_controller!(Customers, "Customer", ["name", "email"]);
crud_controller!(Invoices, "Invoice", ["customer_id", "total_cents"]);

fn missing(label: &str) -> Response {
    Response::error(Status::NotFound, &format!("{label} not found."))
}
