mod app;
mod auth;
mod captions;
mod db;
mod handlers;
mod models;
mod publisher;
mod service;
mod state;
mod status;
mod storage;
mod uploads;

use socialflow_common::{bind_listener, env_or, init_tracing, shutdown_signal};
use std::sync::Arc;
use tokio_postgres::NoTls;

use crate::captions::{CaptionConfig, CaptionGenerator};
use crate::publisher::{MockPublisher, PublisherConfig};
use crate::state::AppState;
use crate::storage::{MediaStore, StorageClient, StorageConfig};
use crate::uploads::UploadConfig;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("socialflow-service");

    let port = env_or("PORT", 8080u16);
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::error!("DATABASE_URL is required");
        std::process::exit(1);
    };

    let (db, connection) = match tokio_postgres::connect(&database_url, NoTls).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "connect db failed");
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        // Drive the connection in the background.
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "database connection error");
        }
    });
    if let Err(err) = db::ensure_schema(&db).await {
        tracing::error!(error = %err, "schema setup failed");
        std::process::exit(1);
    }

    let publisher = MockPublisher::new(PublisherConfig::from_env());
    let caption_config = CaptionConfig::from_env();
    let uploads = UploadConfig::from_env();
    let media = build_media_store(&uploads).await;

    let captions = CaptionGenerator::new(caption_config);
    tracing::info!(
        failure_rate = publisher.config().failure_rate,
        latency_max_ms = publisher.config().latency_max_ms,
        ai_enabled = captions.ai_enabled(),
        media_store = media.kind(),
        upload_max_bytes = uploads.max_bytes,
        "socialflow configured"
    );

    let state = AppState {
        db: Arc::new(tokio::sync::Mutex::new(db)),
        publisher: Arc::new(publisher),
        captions: Arc::new(captions),
        media,
        upload_max_bytes: uploads.max_bytes,
    };

    let app = app::build_router(state);
    let listener = match bind_listener(port).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port, "bind failed");
            std::process::exit(1);
        }
    };
    tracing::info!(port, "listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server error");
    }
}

async fn build_media_store(uploads: &UploadConfig) -> MediaStore {
    match StorageConfig::from_env() {
        Some(config) => MediaStore::Bucket(StorageClient::new(config).await),
        None => MediaStore::disk(&uploads.dir),
    }
}
