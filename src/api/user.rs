use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::api::{error_reply, ok_reply};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct UserCreationRequest {
    pub username: String,
    pub email: String,
}

/// POST /create-user
///
/// The generated password travels only through the notifier; the response
/// body never contains it.
pub(crate) async fn create_user(
    state: AppState,
    request: UserCreationRequest,
) -> Result<impl Reply, Rejection> {
    match state.users.create(&request.username, &request.email) {
        Ok(user) => Ok(ok_reply(&json!({
            "status": "success",
            "message": "Utilisateur créé avec succès. Un email a été envoyé avec les informations de connexion.",
            "user": user,
        }))),
        Err(e) => Ok(error_reply(
            &format!("Erreur lors de la création de l'utilisateur: {e}"),
            StatusCode::OK,
        )),
    }
}
