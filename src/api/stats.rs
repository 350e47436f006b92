use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::api::{error_reply, ok_reply};
use crate::web::AppState;

/// GET /ticket-stats
pub(crate) async fn ticket_stats(state: AppState) -> Result<impl Reply, Rejection> {
    match state.stats.report() {
        Ok(stats) => Ok(ok_reply(&json!({
            "status": "success",
            "total_tickets": stats.total_tickets,
            "processed_tickets": stats.processed_tickets,
            "success_rate": stats.success_rate,
            "average_similarity": stats.average_similarity,
            "last_update": stats.last_update,
        }))),
        Err(e) => Ok(error_reply(
            &format!("Erreur lors de la récupération des statistiques: {e}"),
            StatusCode::OK,
        )),
    }
}
