use serde::Serialize;

use crate::database::Database;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct TicketStats {
    pub total_tickets: u64,
    pub processed_tickets: u64,
    pub success_rate: f64,
    pub average_similarity: f64,
    pub last_update: String,
}

/// Aggregate report over the persisted counters.
pub struct StatsReporter {
    db: Database,
}

impl StatsReporter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn report(&self) -> Result<TicketStats, ApiError> {
        let counters = self
            .db
            .counters()
            .map_err(|e| ApiError::backing_store(format!("reading counters failed: {e}")))?;

        let success_rate = if counters.rows_seen > 0 {
            counters.rows_stored as f64 / counters.rows_seen as f64 * 100.0
        } else {
            0.0
        };
        let average_similarity = if counters.similarity_count > 0 {
            counters.similarity_sum / counters.similarity_count as f64
        } else {
            0.0
        };

        Ok(TicketStats {
            total_tickets: counters.rows_seen,
            processed_tickets: counters.rows_stored,
            success_rate,
            average_similarity,
            last_update: counters.last_update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_reports_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let stats = StatsReporter::new(db).report().unwrap();
        assert_eq!(stats.total_tickets, 0);
        assert_eq!(stats.processed_tickets, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_similarity, 0.0);
        assert!(stats.last_update.is_empty());
    }

    #[test]
    fn rates_follow_the_counters() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        db.update_counters(|c| {
            c.rows_seen = 4;
            c.rows_stored = 3;
            c.similarity_sum = 1.5;
            c.similarity_count = 2;
            c.last_update = "2026-08-29 10:00:00".to_string();
        })
        .unwrap();

        let stats = StatsReporter::new(db).report().unwrap();
        assert_eq!(stats.total_tickets, 4);
        assert_eq!(stats.processed_tickets, 3);
        assert!((stats.success_rate - 75.0).abs() < 1e-9);
        assert!((stats.average_similarity - 0.75).abs() < 1e-9);
        assert_eq!(stats.last_update, "2026-08-29 10:00:00");
    }
}
