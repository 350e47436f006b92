use std::io::Write;

use bytes::Buf;
use futures_util::TryStreamExt;
use serde_json::json;
use tempfile::NamedTempFile;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{Rejection, Reply};

use crate::api::{error_reply, ok_reply};
use crate::error::ApiError;
use crate::ingest::validate_spreadsheet;
use crate::web::AppState;

/// Drain a part's body into memory. Each part must be consumed before the
/// form stream yields the next one.
async fn read_part(part: Part) -> Result<Vec<u8>, ApiError> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, mut buf| async move {
            while buf.has_remaining() {
                let chunk = buf.chunk();
                acc.extend_from_slice(chunk);
                let advanced = chunk.len();
                buf.advance(advanced);
            }
            Ok(acc)
        })
        .await
        .map_err(|e| ApiError::invalid_input(format!("lecture du fichier impossible: {e}")))
}

/// Spool the `file` part of a multipart form into a named temp file.
///
/// The `NamedTempFile` removes itself on drop, so every exit path of the
/// callers, including parse failures, cleans up the upload.
async fn spool_upload(mut form: FormData) -> Result<(String, NamedTempFile), ApiError> {
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ApiError::invalid_input(format!("formulaire multipart invalide: {e}")))?
    {
        if part.name() != "file" {
            // Consume unrelated parts so the stream can advance.
            read_part(part).await?;
            continue;
        }
        let filename = part
            .filename()
            .map(str::to_string)
            .ok_or_else(|| ApiError::invalid_input("nom de fichier manquant"))?;
        let data = read_part(part).await?;

        let mut temp = NamedTempFile::new()
            .map_err(|e| ApiError::backing_store(format!("création du fichier temporaire: {e}")))?;
        temp.write_all(&data)
            .map_err(|e| ApiError::backing_store(format!("écriture du fichier temporaire: {e}")))?;
        return Ok((filename, temp));
    }

    Err(ApiError::invalid_input("aucun fichier fourni"))
}

/// POST /validate-excel — preflight check, always HTTP 200.
pub(crate) async fn validate_excel(form: FormData) -> Result<impl Reply, Rejection> {
    match spool_upload(form).await {
        Ok((filename, temp)) => {
            let report = validate_spreadsheet(&filename, temp.path());
            Ok(ok_reply(&report))
        }
        Err(e) => Ok(ok_reply(&json!({
            "isValid": false,
            "message": format!("Erreur lors de la validation du fichier: {e}"),
        }))),
    }
}

/// POST /upload-file — committing stage. A rejected extension is the one
/// case reported as HTTP 400; store faults stay in-body.
pub(crate) async fn upload_file(state: AppState, form: FormData) -> Result<impl Reply, Rejection> {
    match spool_upload(form).await {
        Ok((filename, temp)) => match state.ingester.ingest(&filename, temp.path()).await {
            Ok(processed) => Ok(ok_reply(&json!({
                "status": "success",
                "message": format!("Fichier {filename} traité avec succès"),
                "processed_tickets": processed,
                "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            }))),
            Err(ApiError::InvalidInput(message)) => {
                Ok(error_reply(&message, StatusCode::BAD_REQUEST))
            }
            Err(e) => Ok(error_reply(
                &format!("Erreur lors du traitement du fichier: {e}"),
                StatusCode::OK,
            )),
        },
        Err(e) => Ok(error_reply(&e.to_string(), StatusCode::BAD_REQUEST)),
    }
}
