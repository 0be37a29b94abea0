use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::handlers::{
    add_schedule, connect_account, create_client, create_post, delete_account, delete_client,
    delete_post, disconnect_account, generate_caption, get_client, get_post, healthz,
    list_accounts, list_captions, list_clients, list_posts, publish_post, readyz,
    remove_schedule, update_client, update_post, upload_media,
};
use crate::state::AppState;

/// Room for multipart boundaries and the non-file fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit =
        usize::try_from(state.upload_max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX);
    let disk_root = state.media.disk_root().map(|root| root.to_path_buf());

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/v1/clients", get(list_clients).post(create_client))
        .route(
            "/v1/clients/:id",
            get(get_client).patch(update_client).delete(delete_client),
        )
        .route(
            "/v1/clients/:id/accounts",
            get(list_accounts).post(connect_account),
        )
        .route("/v1/clients/:id/captions", get(list_captions))
        .route("/v1/accounts/:id", delete(delete_account))
        .route("/v1/accounts/:id/disconnect", post(disconnect_account))
        .route("/v1/posts", get(list_posts).post(create_post))
        .route(
            "/v1/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/v1/posts/:id/schedules", post(add_schedule))
        .route(
            "/v1/posts/:id/schedules/:schedule_id",
            delete(remove_schedule),
        )
        .route("/v1/posts/:id/publish", post(publish_post))
        .route("/v1/ai/generate-caption", post(generate_caption))
        .route(
            "/v1/uploads",
            post(upload_media).layer(DefaultBodyLimit::max(upload_limit)),
        );

    let router = match disk_root {
        Some(root) => router.nest_service("/uploads", ServeDir::new(root)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
