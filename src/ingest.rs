use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Reader};
use serde::Serialize;
use tracing::{info, warn};

use crate::database::{Database, Ticket};
use crate::embedder::TextEmbedder;
use crate::error::ApiError;
use crate::search::TicketIndex;

pub const UNSUPPORTED_FORMAT_MESSAGE: &str =
    "Format de fichier non supporté. Utilisez .xlsx, .xls ou .csv";
pub const ROW_COUNT_MESSAGE: &str =
    "Le fichier doit contenir exactement une ligne de données (plus l'en-tête)";
pub const VALID_FORMAT_MESSAGE: &str = "Format valide";

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub message: String,
}

fn has_supported_extension(filename: &str) -> bool {
    let lowered = filename.to_lowercase();
    lowered.ends_with(".xlsx") || lowered.ends_with(".xls") || lowered.ends_with(".csv")
}

/// Data rows of the first sheet, header row skipped. The extension decides
/// the parser; both paths produce the same row shape.
fn parse_rows(filename: &str, path: &Path) -> Result<Vec<Vec<String>>> {
    if filename.to_lowercase().ends_with(".csv") {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .context("ouverture du fichier CSV")?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("lecture d'une ligne CSV")?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    } else {
        let mut workbook = open_workbook_auto(path).context("ouverture du classeur Excel")?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("le classeur ne contient aucune feuille"))?
            .context("lecture de la première feuille")?;
        let rows = range
            .rows()
            .skip(1)
            .map(|row| row.iter().map(std::string::ToString::to_string).collect())
            .collect();
        Ok(rows)
    }
}

/// Preflight check: supported extension and exactly one data row after the
/// header. Parse faults are reported in the message, never as an error.
pub fn validate_spreadsheet(filename: &str, path: &Path) -> ValidationReport {
    if !has_supported_extension(filename) {
        return ValidationReport {
            is_valid: false,
            message: UNSUPPORTED_FORMAT_MESSAGE.to_string(),
        };
    }
    match parse_rows(filename, path) {
        Ok(rows) if rows.len() == 1 => ValidationReport {
            is_valid: true,
            message: VALID_FORMAT_MESSAGE.to_string(),
        },
        Ok(_) => ValidationReport {
            is_valid: false,
            message: ROW_COUNT_MESSAGE.to_string(),
        },
        Err(e) => ValidationReport {
            is_valid: false,
            message: format!("Erreur lors de la validation du fichier: {e}"),
        },
    }
}

/// Commits spreadsheet rows into the ticket store and refreshes the search
/// index snapshot.
pub struct SpreadsheetIngester {
    db: Database,
    embedder: Arc<dyn TextEmbedder>,
    index: Arc<TicketIndex>,
}

impl SpreadsheetIngester {
    pub fn new(db: Database, embedder: Arc<dyn TextEmbedder>, index: Arc<TicketIndex>) -> Self {
        Self {
            db,
            embedder,
            index,
        }
    }

    /// Parse, embed, and persist every row; returns the number of tickets
    /// stored. Rows without a ticket id or problem text are counted as seen
    /// but skipped. The index snapshot is swapped once, after the store
    /// write completes.
    pub async fn ingest(&self, filename: &str, path: &Path) -> Result<usize, ApiError> {
        if !has_supported_extension(filename) {
            return Err(ApiError::invalid_input(UNSUPPORTED_FORMAT_MESSAGE));
        }

        let rows = parse_rows(filename, path)
            .map_err(|e| ApiError::backing_store(format!("lecture du fichier impossible: {e}")))?;

        let seen = rows.len() as u64;
        let mut stored = 0u64;
        for row in rows {
            let ticket_id = row.first().map(|s| s.trim()).unwrap_or_default();
            let problem = row.get(1).map(|s| s.trim()).unwrap_or_default();
            if ticket_id.is_empty() || problem.is_empty() {
                warn!("skipping row without ticket id or problem text");
                continue;
            }
            let embedding = self
                .embedder
                .embed(problem)
                .map_err(|e| ApiError::backing_store(format!("embedding failed: {e}")))?;
            let ticket = Ticket {
                ticket_id: ticket_id.to_string(),
                problem: problem.to_string(),
                solution: row.get(2).cloned().unwrap_or_default(),
                keywords: row.get(3).cloned().unwrap_or_default(),
                embedding,
            };
            self.db
                .insert_ticket(&ticket)
                .map_err(|e| ApiError::backing_store(format!("storing ticket failed: {e}")))?;
            stored += 1;
        }

        self.db
            .update_counters(|c| {
                c.rows_seen += seen;
                c.rows_stored += stored;
                c.last_update = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            })
            .map_err(|e| ApiError::backing_store(format!("updating counters failed: {e}")))?;

        let corpus = self
            .db
            .select_all_tickets()
            .map_err(|e| ApiError::backing_store(format!("reloading corpus failed: {e}")))?;
        self.index.replace(corpus).await;

        info!("ingested {stored} of {seen} rows from {filename}");
        Ok(stored as usize)
    }
}
