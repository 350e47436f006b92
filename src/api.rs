pub(crate) mod search;
pub(crate) mod stats;
pub(crate) mod upload;
pub(crate) mod user;

use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

/// `{status: "error", message}` with the given HTTP status. Every handler
/// funnels its failures through here so the caller always gets a structured
/// body.
pub(crate) fn error_reply(message: &str, code: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({ "status": "error", "message": message })),
        code,
    )
}

pub(crate) fn ok_reply(value: &impl serde::Serialize) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(value), StatusCode::OK)
}
