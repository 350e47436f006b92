use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

/// A historical support ticket, immutable once stored.
///
/// The embedding is computed from `problem` at ingestion time and lives in
/// the same vector space as query embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub ticket_id: String,
    pub problem: String,
    pub solution: String,
    pub keywords: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Persisted counters backing the statistics report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    /// Spreadsheet rows seen by the ingester, including rejected ones.
    pub rows_seen: u64,
    /// Tickets actually stored.
    pub rows_stored: u64,
    /// Running sum of top search scores, for the similarity average.
    pub similarity_sum: f64,
    pub similarity_count: u64,
    /// `YYYY-MM-DD HH:MM:SS` of the last successful ingestion.
    pub last_update: String,
}

const COUNTERS_KEY: &str = "counters";

#[derive(Clone)]
pub struct Database {
    #[allow(unused)]
    db: Db,
    tickets: Tree,
    users: Tree,
    meta: Tree,
}

impl Database {
    pub fn connect(path: impl AsRef<Path>) -> Result<Database> {
        let db = sled::open(path.as_ref())?;
        let tickets = db.open_tree("tickets")?;
        let users = db.open_tree("users")?;
        let meta = db.open_tree("meta")?;
        Ok(Database {
            db,
            tickets,
            users,
            meta,
        })
    }

    pub fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.tickets
            .insert(ticket.ticket_id.as_bytes(), bincode::serialize(ticket)?)?;
        Ok(())
    }

    pub fn select_ticket(&self, ticket_id: &str) -> Result<Ticket> {
        if let Ok(Some(val)) = self.tickets.get(ticket_id) {
            let result: Ticket = bincode::deserialize(&val)?;
            return Ok(result);
        }
        bail!("no ticket with id {ticket_id}");
    }

    /// Every stored ticket, in key order. Rows that fail to decode are
    /// skipped with a log line rather than poisoning the whole corpus.
    pub fn select_all_tickets(&self) -> Result<Vec<Ticket>> {
        let mut all_vec: Vec<Ticket> = Vec::new();
        for entry in self.tickets.iter().filter_map(std::result::Result::ok) {
            let (key, val) = entry;
            match bincode::deserialize::<Ticket>(&val) {
                Ok(ticket) => all_vec.push(ticket),
                Err(e) => tracing::warn!(
                    "skipping undecodable ticket {}: {e}",
                    String::from_utf8_lossy(&key)
                ),
            }
        }
        Ok(all_vec)
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.users
            .insert(user.id.as_bytes(), bincode::serialize(user)?)?;
        Ok(())
    }

    #[allow(unused)]
    pub fn select_user(&self, id: &str) -> Result<User> {
        if let Ok(Some(val)) = self.users.get(id) {
            let result: User = bincode::deserialize(&val)?;
            return Ok(result);
        }
        bail!("no user with id {id}");
    }

    pub fn counters(&self) -> Result<Counters> {
        match self.meta.get(COUNTERS_KEY)? {
            Some(val) => Ok(bincode::deserialize(&val)?),
            None => Ok(Counters::default()),
        }
    }

    /// Read-modify-write of the counters record. Callers serialize through
    /// this; there is one writer per concern (ingestion, search recording).
    pub fn update_counters(&self, apply: impl FnOnce(&mut Counters)) -> Result<Counters> {
        let mut counters = self.counters()?;
        apply(&mut counters);
        self.meta
            .insert(COUNTERS_KEY, bincode::serialize(&counters)?)?;
        Ok(counters)
    }
}
