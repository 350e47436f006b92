use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::api::{error_reply, ok_reply};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct TicketSearchRequest {
    pub ticket_text: String,
}

/// POST /search-tickets
///
/// Errors stay in-body with HTTP 200, matching the contract that the search
/// endpoint never surfaces a transport-level fault.
pub(crate) async fn search_tickets(
    state: AppState,
    request: TicketSearchRequest,
) -> Result<impl Reply, Rejection> {
    match state.search.search(&request.ticket_text).await {
        Ok(report) => {
            // Observability write happens here so the search service itself
            // stays read-only.
            if let Some(top) = report.results.first() {
                let top_score = f64::from(top.similarity_score);
                if let Err(e) = state.db.update_counters(|c| {
                    c.similarity_sum += top_score;
                    c.similarity_count += 1;
                }) {
                    warn!("failed to record search score: {e}");
                }
            }
            Ok(ok_reply(&json!({
                "status": "success",
                "message": format!("{} tickets similaires trouvés", report.results.len()),
                "tickets": report.results,
                "temps_recherche": report.elapsed_seconds,
                "query": report.query,
            })))
        }
        Err(e) => Ok(error_reply(&e.to_string(), StatusCode::OK)),
    }
}
