use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::json;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::api;
use crate::database::Database;
use crate::ingest::SpreadsheetIngester;
use crate::search::SimilaritySearchService;
use crate::stats::StatsReporter;
use crate::users::UserCreator;

/// Uploads above this size are rejected before the multipart parse.
const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const MAX_JSON_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub search: Arc<SimilaritySearchService>,
    pub ingester: Arc<SpreadsheetIngester>,
    pub users: Arc<UserCreator>,
    pub stats: Arc<StatsReporter>,
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn routes(
    state: AppState,
    allowed_origin: Option<String>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "status": "API is running",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });

    let validate_excel = warp::path("validate-excel")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and_then(api::upload::validate_excel);

    let upload_file = warp::path("upload-file")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and_then(api::upload::upload_file);

    let search_tickets = warp::path("search-tickets")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and_then(api::search::search_tickets);

    let create_user = warp::path("create-user")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::content_length_limit(MAX_JSON_BYTES))
        .and(warp::body::json())
        .and_then(api::user::create_user);

    let ticket_stats = warp::path("ticket-stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(api::stats::ticket_stats);

    let cors = {
        let builder = warp::cors()
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_headers(vec!["content-type"]);
        match allowed_origin {
            Some(origin) => builder.allow_origin(origin.as_str()),
            None => builder.allow_any_origin(),
        }
    };

    health
        .or(validate_excel)
        .or(upload_file)
        .or(search_tickets)
        .or(create_user)
        .or(ticket_stats)
        .recover(handle_rejection)
        .with(cors)
}

/// Convert framework-level rejections into the structured error body the
/// rest of the API speaks.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "ressource introuvable".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            format!("corps de requête invalide: {e}"),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            "fichier trop volumineux".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "méthode non autorisée".to_string(),
        )
    } else {
        tracing::error!("unhandled rejection: {err:?}");
        (StatusCode::BAD_REQUEST, "requête invalide".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "status": "error", "message": message })),
        code,
    ))
}

pub async fn serve(state: AppState, addr: SocketAddr, allowed_origin: Option<String>) {
    warp::serve(routes(state, allowed_origin)).run(addr).await;
}
