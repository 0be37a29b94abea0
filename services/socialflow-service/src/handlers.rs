use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::Session;
use crate::models::{
    ConnectAccountRequest, CreateClientRequest, CreatePostRequest, GenerateCaptionRequest,
    PostListParams, PublishRequest, ScheduleInput, UpdateClientRequest, UpdatePostRequest,
    UploadResponse,
};
use crate::service::{self, ServiceError, UploadInput};
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    let db = state.db.lock().await;
    match db.simple_query("SELECT 1").await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn list_clients(session: Session, State(state): State<AppState>) -> impl IntoResponse {
    match service::list_clients(&state, session).await {
        Ok(clients) => (StatusCode::OK, Json(clients)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn create_client(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> impl IntoResponse {
    match service::create_client(&state, session, payload).await {
        Ok(client) => (StatusCode::CREATED, Json(client)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn get_client(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::get_client(&state, session, id).await {
        Ok(client) => (StatusCode::OK, Json(client)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn update_client(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateClientRequest>,
) -> impl IntoResponse {
    match service::update_client(&state, session, id, payload).await {
        Ok(client) => (StatusCode::OK, Json(client)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn delete_client(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::delete_client(&state, session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_accounts(
    session: Session,
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
) -> impl IntoResponse {
    match service::list_accounts(&state, session, client_id).await {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn connect_account(
    session: Session,
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
    Json(payload): Json<ConnectAccountRequest>,
) -> impl IntoResponse {
    match service::connect_account(&state, session, client_id, payload).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn disconnect_account(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::disconnect_account(&state, session, id).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn delete_account(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::delete_account(&state, session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_posts(
    session: Session,
    State(state): State<AppState>,
    Query(params): Query<PostListParams>,
) -> impl IntoResponse {
    match service::list_posts(&state, session, params).await {
        Ok(posts) => (StatusCode::OK, Json(posts)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn create_post(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> impl IntoResponse {
    match service::create_post(&state, session, payload).await {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn get_post(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::get_post(&state, session, id).await {
        Ok(post) => (StatusCode::OK, Json(post)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn update_post(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> impl IntoResponse {
    match service::update_post(&state, session, id, payload).await {
        Ok(post) => (StatusCode::OK, Json(post)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn delete_post(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match service::delete_post(&state, session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn add_schedule(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ScheduleInput>,
) -> impl IntoResponse {
    match service::add_schedule(&state, session, id, payload).await {
        Ok(post) => (StatusCode::CREATED, Json(post)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn remove_schedule(
    session: Session,
    State(state): State<AppState>,
    Path((id, schedule_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    match service::remove_schedule(&state, session, id, schedule_id).await {
        Ok(post) => (StatusCode::OK, Json(post)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn publish_post(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> impl IntoResponse {
    let payload = match publish_request(&body) {
        Ok(payload) => payload,
        Err(err) => return (err.status, Json(err.body)).into_response(),
    };
    match service::publish_post(&state, session, id, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_caption(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<GenerateCaptionRequest>,
) -> impl IntoResponse {
    match service::generate_caption(&state, session, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_captions(
    session: Session,
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
) -> impl IntoResponse {
    match service::list_captions(&state, session, client_id).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn upload_media(
    session: Session,
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let input = match read_upload(multipart).await {
        Ok(input) => input,
        Err(err) => return (err.status, Json(err.body)).into_response(),
    };
    match service::upload_media(&state, session, input).await {
        Ok(media) => (
            StatusCode::CREATED,
            Json(UploadResponse {
                status: "uploaded",
                media,
            }),
        )
            .into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

/// An empty body publishes everything; anything else must be a valid request.
fn publish_request(body: &[u8]) -> Result<PublishRequest, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PublishRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        ServiceError::with_reasons(
            StatusCode::BAD_REQUEST,
            "invalid_body",
            "request body is not a valid publish request".to_string(),
            vec![err.to_string()],
        )
    })
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadInput, ServiceError> {
    let mut input = UploadInput {
        file_name: None,
        content_type: None,
        bytes: Vec::new(),
        client_id: None,
    };
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                input.file_name = field.file_name().map(str::to_string);
                input.content_type = field.content_type().map(str::to_string);
                input.bytes = field_bytes(field).await?;
                has_file = true;
            }
            Some("client_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                let client_id = text.trim().parse::<i64>().map_err(|_| {
                    ServiceError::bad_request("invalid_client", "client_id must be a number")
                })?;
                input.client_id = Some(client_id);
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(ServiceError::bad_request(
            "missing_file",
            "multipart field \"file\" is required",
        ));
    }
    Ok(input)
}

async fn field_bytes(field: Field<'_>) -> Result<Vec<u8>, ServiceError> {
    field
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(multipart_error)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "file_too_large"
    } else {
        "invalid_multipart"
    };
    ServiceError::new(status, code, err.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_publish_body_means_all_platforms() {
        let bodies: [&[u8]; 2] = [b"", b"  \n"];
        for body in bodies {
            let request = publish_request(body).expect("empty body accepted");
            assert!(request.platforms.is_none());
        }
    }

    #[test]
    fn publish_body_selects_platforms() {
        let request = publish_request(br#"{"platforms": ["instagram"]}"#).expect("parsed");
        assert_eq!(request.platforms, Some(vec!["instagram".to_string()]));
    }

    #[test]
    fn malformed_publish_body_is_rejected() {
        let bodies: [&[u8]; 3] = [br#"{"platforms": "instagram"}"#, b"{not json", b"42"];
        for body in bodies {
            let err = publish_request(body).expect_err("rejected");
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.body.code, "invalid_body");
        }
    }
}
