mod api;
mod database;
mod embedder;
mod error;
mod ingest;
mod notify;
mod search;
mod settings;
mod stats;
mod users;
mod web;

use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use database::Database;
use embedder::{HashingEmbedder, TextEmbedder};
use ingest::SpreadsheetIngester;
use notify::SmtpNotifier;
use search::{SimilaritySearchService, TicketIndex};
use settings::{Args, Settings};
use stats::StatsReporter;
use users::UserCreator;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();
    let settings = match Settings::load(args.config.as_deref()) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while loading settings. {error}");
            exit(1);
        }
    };

    let db = match Database::connect(&settings.database.path) {
        Ok(ret) => ret,
        Err(error) => {
            eprintln!("Problem while opening the ticket store. {error}");
            exit(1);
        }
    };

    let embedder: Arc<dyn TextEmbedder> = match HashingEmbedder::new(settings.search.dimension) {
        Ok(ret) => Arc::new(ret),
        Err(error) => {
            eprintln!("Problem while building the embedder. {error}");
            exit(1);
        }
    };

    let index = match TicketIndex::load(&db) {
        Ok(ret) => Arc::new(ret),
        Err(error) => {
            eprintln!("Problem while loading the search index. {error}");
            exit(1);
        }
    };

    let state = web::AppState {
        db: db.clone(),
        search: Arc::new(SimilaritySearchService::new(
            index.clone(),
            embedder.clone(),
            settings.search.top_k,
            settings.search.min_similarity,
            Duration::from_secs(settings.search.timeout_secs),
        )),
        ingester: Arc::new(SpreadsheetIngester::new(db.clone(), embedder, index)),
        users: Arc::new(UserCreator::new(
            db.clone(),
            Arc::new(SmtpNotifier::new(settings.email.clone())),
        )),
        stats: Arc::new(StatsReporter::new(db)),
    };

    info!("MegSupport API listening on {}", settings.web.address);
    web::serve(state, settings.web.address, settings.web.allowed_origin).await;
}
