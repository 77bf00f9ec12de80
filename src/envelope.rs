//! JSON envelopes.
//!
//! Every JSON body the framework produces has one of two shapes:
//!
//! ```text
//! {"success": true,  "data": ..., "message": "..."}   message optional
//! {"success": false, "error": "...", "status": 404}
//! ```
//!
//! Validation failures add an `errors` object keyed by field name.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::error;

use crate::response::{IntoResponse, Response};
use crate::status::Status;

#[derive(Serialize)]
struct Success<'a, T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct Failure<'a> {
    success: bool,
    error: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl Response {
    /// `200 OK` success envelope.
    pub fn success<T: Serialize>(data: T, message: Option<&str>) -> Self {
        Self::success_with(Status::Ok, data, message)
    }

    /// Success envelope with a non-200 status, e.g. `201 Created`.
    pub fn success_with<T: Serialize>(code: Status, data: T, message: Option<&str>) -> Self {
        encode(code, &Success { success: true, data, message })
    }

    /// Error envelope: `{"success":false,"error":message,"status":code}`.
    pub fn error(code: Status, message: &str) -> Self {
        encode(code, &Failure {
            success: false,
            error: message,
            status: code.into(),
            errors: None,
        })
    }

    /// `422` error envelope carrying per-field messages.
    pub fn validation_error(errors: &BTreeMap<String, Vec<String>>) -> Self {
        let code = Status::UnprocessableContent;
        encode(code, &Failure {
            success: false,
            error: "The given data was invalid.",
            status: code.into(),
            errors: Some(errors),
        })
    }
}

fn encode<T: Serialize>(code: Status, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder().status(code).json(bytes),
        Err(e) => {
            error!("envelope serialization failed: {e}");
            Response::status(Status::InternalServerError)
        }
    }
}

/// Serializes `T` as a bare `200 OK` JSON body, without an envelope.
///
/// ```rust
/// use switchyard::{Json, Request};
///
/// async fn version(_req: Request) -> Json<serde_json::Value> {
///     Json(serde_json::json!({"version": "1.0"}))
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => {
                error!("json serialization failed: {e}");
                Response::error(Status::InternalServerError, "Server Error")
            }
        }
    }
}
