use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::database::{Database, Ticket};
use crate::embedder::{cosine_similarity, TextEmbedder};
use crate::error::ApiError;

/// In-memory corpus snapshot over the ticket store.
///
/// Searches clone the current `Arc` and scan it lock-free; ingestion builds
/// the next corpus and swaps it under the write lock, so a search sees
/// either the pre- or post-ingestion state, never a partial one.
pub struct TicketIndex {
    snapshot: RwLock<Arc<Vec<Ticket>>>,
}

impl TicketIndex {
    pub fn load(db: &Database) -> Result<Self> {
        let tickets = db.select_all_tickets()?;
        tracing::info!("loaded {} tickets into the search index", tickets.len());
        Ok(Self {
            snapshot: RwLock::new(Arc::new(tickets)),
        })
    }

    pub fn empty() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub async fn snapshot(&self) -> Arc<Vec<Ticket>> {
        self.snapshot.read().await.clone()
    }

    pub async fn replace(&self, tickets: Vec<Ticket>) {
        *self.snapshot.write().await = Arc::new(tickets);
    }

    pub async fn len(&self) -> usize {
        self.snapshot.read().await.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub ticket_id: String,
    pub problem: String,
    pub solution: String,
    pub keywords: String,
    pub similarity_score: f32,
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub results: Vec<SearchResult>,
    pub elapsed_seconds: f64,
    pub query: String,
}

pub struct SimilaritySearchService {
    index: Arc<TicketIndex>,
    embedder: Arc<dyn TextEmbedder>,
    top_k: usize,
    min_similarity: f32,
    timeout: Duration,
}

impl SimilaritySearchService {
    pub fn new(
        index: Arc<TicketIndex>,
        embedder: Arc<dyn TextEmbedder>,
        top_k: usize,
        min_similarity: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            top_k,
            min_similarity,
            timeout,
        }
    }

    /// Rank the corpus against `query_text` and return the top matches.
    ///
    /// Read-only against the corpus. The embed-and-scan step runs on a
    /// blocking thread bounded by the configured timeout.
    pub async fn search(&self, query_text: &str) -> Result<SearchReport, ApiError> {
        let query = query_text.trim().to_string();
        if query.is_empty() {
            return Err(ApiError::invalid_input(
                "Le texte du ticket ne peut pas être vide",
            ));
        }

        let started = Instant::now();
        let corpus = self.index.snapshot().await;
        let embedder = self.embedder.clone();
        let top_k = self.top_k;
        let min_similarity = self.min_similarity;
        let scan_query = query.clone();

        let task = tokio::task::spawn_blocking(move || -> Result<Vec<SearchResult>> {
            let query_vec = embedder.embed(&scan_query)?;
            Ok(rank(&corpus, &query_vec, top_k, min_similarity))
        });

        let results = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ApiError::backing_store("La recherche a dépassé le délai imparti"))?
            .map_err(|e| ApiError::backing_store(format!("search task failed: {e}")))?
            .map_err(|e| ApiError::backing_store(format!("embedding failed: {e}")))?;

        Ok(SearchReport {
            results,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            query,
        })
    }
}

/// Score every ticket, drop those below the threshold, and keep the top `k`
/// ordered by score descending with ties broken by `ticket_id` ascending.
fn rank(corpus: &[Ticket], query_vec: &[f32], k: usize, min_similarity: f32) -> Vec<SearchResult> {
    let mut hits: Vec<SearchResult> = corpus
        .iter()
        .map(|ticket| SearchResult {
            ticket_id: ticket.ticket_id.clone(),
            problem: ticket.problem.clone(),
            solution: ticket.solution.clone(),
            keywords: ticket.keywords.clone(),
            similarity_score: cosine_similarity(query_vec, &ticket.embedding),
        })
        .filter(|hit| hit.similarity_score >= min_similarity)
        .collect();

    hits.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticket_id.cmp(&b.ticket_id))
    });
    hits.truncate(k);
    hits
}
