use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;

use crate::auth::Session;
use crate::captions::{normalize_hashtags, PromptInput, HISTORY_WINDOW};
use crate::db::{self, DbError, NewAccount, NewMedia, NewPost, PostFilter};
use crate::models::{
    CaptionHistoryEntry, Client, ConnectAccountRequest, CreateClientRequest, CreatePostRequest,
    ErrorResponse, GenerateCaptionRequest, GenerateCaptionResponse, MediaFile, Platform,
    PostDetail, PostListParams, PublishRequest, PublishResponse, PublishResult, ScheduleInput,
    Post, SocialAccount, UpdateClientRequest, UpdatePostRequest,
};
use crate::state::AppState;
use crate::status::{aggregate, PostStatus, ScheduleStatus};
use crate::uploads::{self, UploadError};

const CAPTION_HISTORY_PAGE: i64 = 50;

#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message,
                reasons: Vec::new(),
            },
        }
    }

    pub fn with_reasons(
        status: StatusCode,
        code: &'static str,
        message: String,
        reasons: Vec<String>,
    ) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message,
                reasons,
            },
        }
    }

    pub fn bad_request(code: &'static str, message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message.to_string())
    }

    pub fn not_found(code: &'static str, message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message.to_string())
    }

    /// Log the real cause and hand the caller a generic 500.
    pub fn database(context: &'static str, err: DbError) -> Self {
        tracing::error!(error = %err, context, "database operation failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "db_error",
            "database error".to_string(),
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn required_text(value: Option<String>, code: &'static str, message: &str) -> Result<String, ServiceError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::bad_request(code, message))
}

/// Parse platform names, reporting every unknown one.
fn parse_platforms(values: &[String]) -> Result<Vec<Platform>, ServiceError> {
    let mut platforms = Vec::new();
    let mut unknown = Vec::new();
    for value in values {
        match value.parse::<Platform>() {
            Ok(platform) if !platforms.contains(&platform) => platforms.push(platform),
            Ok(_) => {}
            Err(err) => unknown.push(err),
        }
    }
    if !unknown.is_empty() {
        return Err(ServiceError::with_reasons(
            StatusCode::BAD_REQUEST,
            "invalid_platform",
            "unknown platform".to_string(),
            unknown,
        ));
    }
    Ok(platforms)
}

pub async fn list_clients(state: &AppState, session: Session) -> Result<Vec<Client>, ServiceError> {
    let db = state.db.lock().await;
    db::list_clients(&*db, session.user_id)
        .await
        .map_err(|err| ServiceError::database("list clients", err))
}

pub async fn get_client(
    state: &AppState,
    session: Session,
    client_id: i64,
) -> Result<Client, ServiceError> {
    let db = state.db.lock().await;
    db::select_client(&*db, session.user_id, client_id)
        .await
        .map_err(|err| ServiceError::database("select client", err))?
        .ok_or_else(|| ServiceError::not_found("client_not_found", "client not found"))
}

pub async fn create_client(
    state: &AppState,
    session: Session,
    payload: CreateClientRequest,
) -> Result<Client, ServiceError> {
    session.require_mutation()?;
    let name = required_text(payload.name, "missing_name", "name is required")?;
    let brand_tone = payload.brand_tone.unwrap_or_default();

    let db = state.db.lock().await;
    let client = db::insert_client(
        &*db,
        session.user_id,
        &name,
        brand_tone,
        payload.industry.as_deref(),
        payload.description.as_deref(),
    )
    .await
    .map_err(|err| ServiceError::database("insert client", err))?;

    tracing::info!(
        owner_id = session.user_id,
        client_id = client.id,
        brand_tone = brand_tone.as_str(),
        "client created"
    );
    Ok(client)
}

pub async fn update_client(
    state: &AppState,
    session: Session,
    client_id: i64,
    mut payload: UpdateClientRequest,
) -> Result<Client, ServiceError> {
    session.require_mutation()?;
    if let Some(name) = payload.name.take() {
        payload.name = Some(required_text(Some(name), "missing_name", "name cannot be blank")?);
    }

    let db = state.db.lock().await;
    db::update_client(&*db, session.user_id, client_id, &payload)
        .await
        .map_err(|err| ServiceError::database("update client", err))?
        .ok_or_else(|| ServiceError::not_found("client_not_found", "client not found"))
}

pub async fn delete_client(
    state: &AppState,
    session: Session,
    client_id: i64,
) -> Result<(), ServiceError> {
    session.require_mutation()?;
    let db = state.db.lock().await;
    let deleted = db::delete_client(&*db, session.user_id, client_id)
        .await
        .map_err(|err| ServiceError::database("delete client", err))?;
    if !deleted {
        return Err(ServiceError::not_found("client_not_found", "client not found"));
    }
    tracing::info!(owner_id = session.user_id, client_id, "client deleted");
    Ok(())
}

pub async fn list_accounts(
    state: &AppState,
    session: Session,
    client_id: i64,
) -> Result<Vec<SocialAccount>, ServiceError> {
    let db = state.db.lock().await;
    ensure_client(&*db, session, client_id).await?;
    db::list_accounts(&*db, session.user_id, client_id)
        .await
        .map_err(|err| ServiceError::database("list accounts", err))
}

pub async fn connect_account(
    state: &AppState,
    session: Session,
    client_id: i64,
    payload: ConnectAccountRequest,
) -> Result<SocialAccount, ServiceError> {
    session.require_mutation()?;
    let platform = required_text(payload.platform, "missing_platform", "platform is required")?;
    let platform = parse_platforms(&[platform])?
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::bad_request("missing_platform", "platform is required"))?;
    let account_name = required_text(
        payload.account_name,
        "missing_account_name",
        "account_name is required",
    )?;
    let access_token = payload.access_token.filter(|token| !token.trim().is_empty());

    let db = state.db.lock().await;
    ensure_client(&*db, session, client_id).await?;
    let account = db::insert_account(
        &*db,
        &NewAccount {
            client_id,
            platform,
            account_name: &account_name,
            access_token: access_token.as_deref(),
            refresh_token: payload.refresh_token.as_deref(),
            token_expires_at: payload.token_expires_at,
        },
    )
    .await
    .map_err(|err| {
        if err.is_unique_violation() {
            return ServiceError::new(
                StatusCode::CONFLICT,
                "account_exists",
                format!("{} account already connected", platform.label()),
            );
        }
        ServiceError::database("insert account", err)
    })?;

    tracing::info!(
        client_id,
        account_id = account.id,
        platform = platform.as_str(),
        connected = account.is_connected,
        "social account connected"
    );
    Ok(account)
}

pub async fn disconnect_account(
    state: &AppState,
    session: Session,
    account_id: i64,
) -> Result<SocialAccount, ServiceError> {
    session.require_mutation()?;
    let db = state.db.lock().await;
    let account = db::disconnect_account(&*db, session.user_id, account_id)
        .await
        .map_err(|err| ServiceError::database("disconnect account", err))?
        .ok_or_else(|| ServiceError::not_found("account_not_found", "account not found"))?;
    tracing::info!(account_id, platform = account.platform.as_str(), "social account disconnected");
    Ok(account)
}

pub async fn delete_account(
    state: &AppState,
    session: Session,
    account_id: i64,
) -> Result<(), ServiceError> {
    session.require_mutation()?;
    let mut db = state.db.lock().await;
    let transaction = db.transaction().await.map_err(|err| {
        ServiceError::database("start transaction", DbError::from(err))
    })?;
    // Collected first: the delete cascades to these schedules.
    let affected = db::account_post_ids(&transaction, account_id)
        .await
        .map_err(|err| ServiceError::database("account posts", err))?;
    let deleted = db::delete_account(&transaction, session.user_id, account_id)
        .await
        .map_err(|err| ServiceError::database("delete account", err))?;
    if !deleted {
        return Err(ServiceError::not_found("account_not_found", "account not found"));
    }
    for post_id in &affected {
        refresh_post_status(&transaction, *post_id).await?;
    }
    transaction
        .commit()
        .await
        .map_err(|err| ServiceError::database("commit account delete", DbError::from(err)))?;

    tracing::info!(account_id, posts_refreshed = affected.len(), "social account deleted");
    Ok(())
}

pub async fn list_posts(
    state: &AppState,
    session: Session,
    params: PostListParams,
) -> Result<Vec<Post>, ServiceError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<PostStatus>)
        .transpose()
        .map_err(|err| {
            ServiceError::with_reasons(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                "unknown post status".to_string(),
                vec![err.to_string()],
            )
        })?;
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from >= to {
            return Err(ServiceError::bad_request(
                "invalid_range",
                "from must be before to",
            ));
        }
    }

    let filter = PostFilter {
        client_id: params.client_id,
        status,
        from: params.from,
        to: params.to,
    };
    let db = state.db.lock().await;
    db::list_posts(&*db, session.user_id, &filter)
        .await
        .map_err(|err| ServiceError::database("list posts", err))
}

pub async fn get_post(
    state: &AppState,
    session: Session,
    post_id: i64,
) -> Result<PostDetail, ServiceError> {
    let db = state.db.lock().await;
    let post = find_post(&*db, session, post_id).await?;
    post_detail(&*db, post).await
}

pub async fn create_post(
    state: &AppState,
    session: Session,
    payload: CreatePostRequest,
) -> Result<PostDetail, ServiceError> {
    session.require_mutation()?;
    let client_id = payload
        .client_id
        .ok_or_else(|| ServiceError::bad_request("missing_client", "client_id is required"))?;
    let title = required_text(payload.title, "missing_title", "title is required")?;
    let caption = payload.caption.unwrap_or_default().trim().to_string();
    let hashtags = normalize_hashtags(payload.hashtags.unwrap_or_default());
    let schedules = payload.schedules.unwrap_or_default();
    let media_type = payload.media_type.unwrap_or_default();

    let mut db = state.db.lock().await;
    ensure_client(&*db, session, client_id).await?;
    let mut planned = Vec::with_capacity(schedules.len());
    for input in &schedules {
        planned.push(resolve_schedule(&*db, session, client_id, input).await?);
    }
    reject_duplicate_accounts(planned.iter().map(|(account, _)| account.id))?;

    // Fresh schedules are all pending, so this is DRAFT or SCHEDULED.
    let status = aggregate(planned.iter().map(|_| ScheduleStatus::Scheduled));

    let transaction = db.transaction().await.map_err(|err| {
        ServiceError::database("start transaction", DbError::from(err))
    })?;
    let post = db::insert_post(
        &transaction,
        &NewPost {
            client_id,
            title: &title,
            caption: &caption,
            hashtags: &hashtags,
            media_type,
            media_url: payload.media_url.as_deref(),
            status,
        },
    )
    .await
    .map_err(|err| ServiceError::database("insert post", err))?;

    let mut created = Vec::with_capacity(planned.len());
    for (account, scheduled_at) in &planned {
        let schedule = db::insert_schedule(&transaction, post.id, account, *scheduled_at)
            .await
            .map_err(|err| ServiceError::database("insert schedule", err))?;
        created.push(schedule);
    }

    transaction
        .commit()
        .await
        .map_err(|err| ServiceError::database("commit post", DbError::from(err)))?;

    tracing::info!(
        client_id,
        post_id = post.id,
        schedules = created.len(),
        status = status.as_str(),
        "post created"
    );
    Ok(PostDetail {
        post,
        schedules: created,
    })
}

pub async fn update_post(
    state: &AppState,
    session: Session,
    post_id: i64,
    mut payload: UpdatePostRequest,
) -> Result<Post, ServiceError> {
    session.require_mutation()?;
    if let Some(title) = payload.title.take() {
        payload.title = Some(required_text(Some(title), "missing_title", "title cannot be blank")?);
    }
    payload.hashtags = payload.hashtags.map(normalize_hashtags);

    let db = state.db.lock().await;
    db::update_post(&*db, session.user_id, post_id, &payload)
        .await
        .map_err(|err| ServiceError::database("update post", err))?
        .ok_or_else(|| ServiceError::not_found("post_not_found", "post not found"))
}

pub async fn delete_post(
    state: &AppState,
    session: Session,
    post_id: i64,
) -> Result<(), ServiceError> {
    session.require_mutation()?;
    let db = state.db.lock().await;
    let deleted = db::delete_post(&*db, session.user_id, post_id)
        .await
        .map_err(|err| ServiceError::database("delete post", err))?;
    if !deleted {
        return Err(ServiceError::not_found("post_not_found", "post not found"));
    }
    tracing::info!(post_id, "post deleted");
    Ok(())
}

pub async fn add_schedule(
    state: &AppState,
    session: Session,
    post_id: i64,
    input: ScheduleInput,
) -> Result<PostDetail, ServiceError> {
    session.require_mutation()?;
    let mut db = state.db.lock().await;
    let post = find_post(&*db, session, post_id).await?;
    let (account, scheduled_at) = resolve_schedule(&*db, session, post.client_id, &input).await?;

    let transaction = db.transaction().await.map_err(|err| {
        ServiceError::database("start transaction", DbError::from(err))
    })?;
    db::insert_schedule(&transaction, post.id, &account, scheduled_at)
        .await
        .map_err(|err| {
            if err.is_unique_violation() {
                return ServiceError::new(
                    StatusCode::CONFLICT,
                    "schedule_exists",
                    format!("post already scheduled on {}", account.platform.label()),
                );
            }
            if err.is_foreign_key_violation() {
                return ServiceError::bad_request("invalid_account", "account no longer exists");
            }
            ServiceError::database("insert schedule", err)
        })?;
    let status = refresh_post_status(&transaction, post.id).await?;
    transaction
        .commit()
        .await
        .map_err(|err| ServiceError::database("commit schedule", DbError::from(err)))?;

    tracing::info!(
        post_id,
        account_id = account.id,
        platform = account.platform.as_str(),
        status = status.as_str(),
        "schedule added"
    );
    let post = find_post(&*db, session, post_id).await?;
    post_detail(&*db, post).await
}

pub async fn remove_schedule(
    state: &AppState,
    session: Session,
    post_id: i64,
    schedule_id: i64,
) -> Result<PostDetail, ServiceError> {
    session.require_mutation()?;
    let mut db = state.db.lock().await;
    let post = find_post(&*db, session, post_id).await?;

    let transaction = db.transaction().await.map_err(|err| {
        ServiceError::database("start transaction", DbError::from(err))
    })?;
    let deleted = db::delete_pending_schedule(&transaction, post.id, schedule_id)
        .await
        .map_err(|err| ServiceError::database("delete schedule", err))?;
    if !deleted {
        let existing = db::list_schedules(&transaction, post.id)
            .await
            .map_err(|err| ServiceError::database("list schedules", err))?;
        return Err(match existing.iter().find(|schedule| schedule.id == schedule_id) {
            Some(schedule) => ServiceError::new(
                StatusCode::CONFLICT,
                "schedule_final",
                format!("schedule already {}", schedule.status),
            ),
            None => ServiceError::not_found("schedule_not_found", "schedule not found"),
        });
    }
    let status = refresh_post_status(&transaction, post.id).await?;
    transaction
        .commit()
        .await
        .map_err(|err| ServiceError::database("commit schedule", DbError::from(err)))?;

    tracing::info!(post_id, schedule_id, status = status.as_str(), "schedule removed");
    let post = find_post(&*db, session, post_id).await?;
    post_detail(&*db, post).await
}

/// Publish every pending schedule of a post (or only the requested platforms).
///
/// Per-platform failures are recorded on the schedule and reported in the
/// results; they never fail the request.
pub async fn publish_post(
    state: &AppState,
    session: Session,
    post_id: i64,
    payload: PublishRequest,
) -> Result<PublishResponse, ServiceError> {
    session.require_mutation()?;
    let wanted = payload
        .platforms
        .as_deref()
        .map(parse_platforms)
        .transpose()?;

    let (post, targets) = {
        let db = state.db.lock().await;
        let post = find_post(&*db, session, post_id).await?;
        let targets = db::publish_targets(&*db, post.id)
            .await
            .map_err(|err| ServiceError::database("load publish targets", err))?;
        (post, targets)
    };
    if targets.is_empty() {
        return Err(ServiceError::bad_request(
            "no_schedules",
            "post has no platform schedules",
        ));
    }

    let mut results = Vec::new();
    let mut failure = None;
    for target in targets {
        if let Some(wanted) = &wanted {
            if !wanted.contains(&target.platform) {
                continue;
            }
        }

        if target.status.is_final() {
            results.push(PublishResult {
                schedule_id: target.schedule_id,
                platform: target.platform,
                success: target.status == ScheduleStatus::Posted,
                skipped: true,
                platform_post_id: None,
                error_message: None,
            });
            continue;
        }

        // The connection stays free while the publisher waits on the platform.
        let outcome = state
            .publisher
            .publish(
                target.platform,
                target.access_token.as_deref(),
                &post.caption,
                &post.hashtags,
            )
            .await;
        let status = match target.status.apply_publish(outcome.is_ok()) {
            Ok(status) => status,
            Err(err) => {
                failure = Some(ServiceError::new(
                    StatusCode::CONFLICT,
                    "schedule_final",
                    err.to_string(),
                ));
                break;
            }
        };
        let (external_id, error_message) = match outcome {
            Ok(external_id) => (Some(external_id), None),
            Err(err) => (None, Some(err.to_string())),
        };

        let recorded = match record_attempt(
            state,
            post.id,
            target.schedule_id,
            status,
            external_id.as_deref(),
            error_message.as_deref(),
        )
        .await
        {
            Ok(recorded) => recorded,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };

        if recorded {
            tracing::info!(
                post_id,
                schedule_id = target.schedule_id,
                platform = target.platform.as_str(),
                status = status.as_str(),
                error = error_message.as_deref().unwrap_or(""),
                "publish attempt recorded"
            );
        } else {
            tracing::warn!(
                post_id,
                schedule_id = target.schedule_id,
                "schedule finalized by another request"
            );
        }
        results.push(PublishResult {
            schedule_id: target.schedule_id,
            platform: target.platform,
            success: recorded && status == ScheduleStatus::Posted,
            skipped: !recorded,
            platform_post_id: if recorded { external_id } else { None },
            error_message: if recorded { error_message } else { None },
        });
    }

    // Runs even after a failed attempt so the post matches what was recorded.
    let status = {
        let db = state.db.lock().await;
        refresh_post_status(&*db, post.id).await?
    };
    if let Some(err) = failure {
        return Err(err);
    }

    tracing::info!(
        post_id,
        publisher = state.publisher.name(),
        attempted = results.iter().filter(|result| !result.skipped).count(),
        status = status.as_str(),
        "publish finished"
    );
    Ok(PublishResponse {
        post_id,
        status,
        results,
    })
}

pub async fn generate_caption(
    state: &AppState,
    session: Session,
    payload: GenerateCaptionRequest,
) -> Result<GenerateCaptionResponse, ServiceError> {
    session.require_mutation()?;
    let client_id = payload
        .client_id
        .ok_or_else(|| ServiceError::bad_request("missing_client", "client_id is required"))?;
    let mut platforms = parse_platforms(payload.platforms.as_deref().unwrap_or_default())?;
    if platforms.is_empty() {
        platforms = Platform::ALL.to_vec();
    }
    let language = payload
        .language
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "English".to_string());

    let (client, previous) = {
        let db = state.db.lock().await;
        let client = ensure_client(&*db, session, client_id).await?;
        let previous = db::recent_captions(&*db, client.id, HISTORY_WINDOW as i64)
            .await
            .map_err(|err| ServiceError::database("recent captions", err))?;
        (client, previous)
    };

    let input = PromptInput {
        client_name: &client.name,
        client_description: client.description.as_deref(),
        industry: client.industry.as_deref(),
        tone: client.brand_tone,
        platforms: &platforms,
        topic: payload.topic.as_deref(),
        image_description: payload.image_description.as_deref(),
        language: &language,
        previous_captions: &previous,
    };
    let generated = state.captions.generate(&input).await;

    {
        let db = state.db.lock().await;
        db::insert_caption_history(
            &*db,
            client.id,
            &generated.caption,
            &generated.hashtags,
            &platforms,
        )
        .await
        .map_err(|err| ServiceError::database("insert caption history", err))?;
    }

    tracing::info!(
        client_id,
        source = generated.source.as_str(),
        platforms = platforms.len(),
        "caption generated"
    );
    Ok(GenerateCaptionResponse {
        caption: generated.caption,
        hashtags: generated.hashtags,
        source: generated.source.as_str(),
    })
}

pub async fn list_captions(
    state: &AppState,
    session: Session,
    client_id: i64,
) -> Result<Vec<CaptionHistoryEntry>, ServiceError> {
    let db = state.db.lock().await;
    ensure_client(&*db, session, client_id).await?;
    db::list_caption_history(&*db, session.user_id, client_id, CAPTION_HISTORY_PAGE)
        .await
        .map_err(|err| ServiceError::database("list caption history", err))
}

/// A file pulled out of a multipart upload.
pub struct UploadInput {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub client_id: Option<i64>,
}

pub async fn upload_media(
    state: &AppState,
    session: Session,
    input: UploadInput,
) -> Result<MediaFile, ServiceError> {
    session.require_mutation()?;
    let content_type = input.content_type.unwrap_or_default();
    let size = input.bytes.len() as u64;
    let ext = uploads::validate_upload(&content_type, size, state.upload_max_bytes).map_err(
        |err| {
            let status = match err {
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            ServiceError::new(status, err.code(), err.to_string())
        },
    )?;

    if let Some(client_id) = input.client_id {
        let db = state.db.lock().await;
        ensure_client(&*db, session, client_id).await?;
    }

    let file_name = uploads::clean_file_name(input.file_name.as_deref());
    let sha256 = uploads::sha256_hex(&input.bytes);
    let key = uploads::storage_key(ext);
    let url = state
        .media
        .put(&key, &content_type, input.bytes)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, store = state.media.kind(), "store upload failed");
            ServiceError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "could not store file".to_string(),
            )
        })?;

    let inserted = {
        let db = state.db.lock().await;
        db::insert_media(
            &*db,
            &NewMedia {
                owner_id: session.user_id,
                client_id: input.client_id,
                file_name: &file_name,
                content_type: &content_type,
                size_bytes: size as i64,
                sha256: &sha256,
                storage_key: &key,
                url: &url,
            },
        )
        .await
    };
    let media = match inserted {
        Ok(media) => media,
        Err(err) => {
            if let Err(cleanup) = state.media.remove(&key).await {
                tracing::warn!(error = %cleanup, key = key.as_str(), "orphaned upload left behind");
            }
            return Err(ServiceError::database("insert media", err));
        }
    };

    tracing::info!(
        media_id = media.id,
        size_bytes = size,
        content_type = content_type.as_str(),
        store = state.media.kind(),
        "media uploaded"
    );
    Ok(media)
}

async fn ensure_client(
    db: &tokio_postgres::Client,
    session: Session,
    client_id: i64,
) -> Result<Client, ServiceError> {
    db::select_client(db, session.user_id, client_id)
        .await
        .map_err(|err| ServiceError::database("select client", err))?
        .ok_or_else(|| ServiceError::not_found("client_not_found", "client not found"))
}

async fn find_post(
    db: &tokio_postgres::Client,
    session: Session,
    post_id: i64,
) -> Result<Post, ServiceError> {
    db::select_post(db, session.user_id, post_id)
        .await
        .map_err(|err| ServiceError::database("select post", err))?
        .ok_or_else(|| ServiceError::not_found("post_not_found", "post not found"))
}

async fn post_detail(db: &tokio_postgres::Client, post: Post) -> Result<PostDetail, ServiceError> {
    let schedules = db::list_schedules(db, post.id)
        .await
        .map_err(|err| ServiceError::database("list schedules", err))?;
    Ok(PostDetail { post, schedules })
}

/// Validate a schedule request against the post's client and return its account.
async fn resolve_schedule(
    db: &tokio_postgres::Client,
    session: Session,
    client_id: i64,
    input: &ScheduleInput,
) -> Result<(SocialAccount, chrono::DateTime<chrono::Utc>), ServiceError> {
    let account_id = input.social_account_id.ok_or_else(|| {
        ServiceError::bad_request("missing_account", "social_account_id is required")
    })?;
    let scheduled_at = input.scheduled_at.ok_or_else(|| {
        ServiceError::bad_request("missing_scheduled_at", "scheduled_at is required")
    })?;
    let account = db::select_account(db, session.user_id, account_id)
        .await
        .map_err(|err| ServiceError::database("select account", err))?
        .filter(|account| account.client_id == client_id)
        .ok_or_else(|| {
            ServiceError::bad_request("invalid_account", "account does not belong to this client")
        })?;
    Ok((account, scheduled_at))
}

fn reject_duplicate_accounts<I>(account_ids: I) -> Result<(), ServiceError>
where
    I: IntoIterator<Item = i64>,
{
    let mut seen = HashSet::new();
    for account_id in account_ids {
        if !seen.insert(account_id) {
            return Err(ServiceError::bad_request(
                "duplicate_schedule",
                "each social account can be scheduled once per post",
            ));
        }
    }
    Ok(())
}

/// Finalize one schedule and refresh its post in the same transaction.
async fn record_attempt(
    state: &AppState,
    post_id: i64,
    schedule_id: i64,
    status: ScheduleStatus,
    external_id: Option<&str>,
    error_message: Option<&str>,
) -> Result<bool, ServiceError> {
    let mut db = state.db.lock().await;
    let transaction = db.transaction().await.map_err(|err| {
        ServiceError::database("start transaction", DbError::from(err))
    })?;
    let recorded = db::record_publish(&transaction, schedule_id, status, external_id, error_message)
        .await
        .map_err(|err| ServiceError::database("record publish", err))?;
    if recorded {
        refresh_post_status(&transaction, post_id).await?;
    }
    transaction
        .commit()
        .await
        .map_err(|err| ServiceError::database("commit publish", DbError::from(err)))?;
    Ok(recorded)
}

/// Recompute the aggregate from stored schedules and persist it.
async fn refresh_post_status(
    db: &impl tokio_postgres::GenericClient,
    post_id: i64,
) -> Result<PostStatus, ServiceError> {
    let statuses = db::schedule_statuses(db, post_id)
        .await
        .map_err(|err| ServiceError::database("load schedule statuses", err))?;
    let status = aggregate(statuses);
    db::update_post_status(db, post_id, status)
        .await
        .map_err(|err| ServiceError::database("update post status", err))?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(
            required_text(Some("  Acme ".to_string()), "missing_name", "x").ok(),
            Some("Acme".to_string())
        );
        let err = required_text(Some("   ".to_string()), "missing_name", "x").err();
        assert_eq!(err.map(|err| err.body.code), Some("missing_name"));
        assert!(required_text(None, "missing_name", "x").is_err());
    }

    #[test]
    fn platform_parsing_reports_unknown_names() {
        let parsed = parse_platforms(&["instagram".to_string(), "INSTAGRAM".to_string()]);
        assert_eq!(parsed.ok(), Some(vec![Platform::Instagram]));

        let err = parse_platforms(&["tiktok".to_string(), "myspace".to_string()])
            .err()
            .expect("rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "invalid_platform");
        assert_eq!(err.body.reasons.len(), 2);
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        assert!(reject_duplicate_accounts([1, 2, 3]).is_ok());
        let err = reject_duplicate_accounts([1, 2, 1]).err().expect("rejected");
        assert_eq!(err.body.code, "duplicate_schedule");
    }

    #[test]
    fn service_error_renders_status_and_body() {
        let response = ServiceError::not_found("post_not_found", "post not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    use crate::auth::Role;
    use crate::captions::{CaptionConfig, CaptionGenerator};
    use crate::publisher::{MockPublisher, PublishFuture, Publisher, PublisherConfig};
    use crate::storage::MediaStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::{sync::Arc, time::Duration};
    use tokio::sync::Mutex;

    // Database-backed cases run only when DATABASE_URL points at a scratch Postgres.
    static SCHEMA_READY: Mutex<bool> = Mutex::const_new(false);

    async fn db_state(
        publisher: Arc<dyn Publisher + Send + Sync>,
    ) -> Option<(AppState, tempfile::TempDir)> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };
        let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
            .await
            .expect("connect");
        tokio::spawn(async move {
            let _ = connection.await;
        });
        {
            let mut ready = SCHEMA_READY.lock().await;
            if !*ready {
                db::ensure_schema(&client).await.expect("schema");
                *ready = true;
            }
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState {
            db: Arc::new(Mutex::new(client)),
            publisher,
            captions: Arc::new(CaptionGenerator::new(CaptionConfig {
                api_key: None,
                api_base: String::new(),
                model: String::new(),
                timeout: Duration::from_secs(1),
            })),
            media: MediaStore::disk(dir.path()),
            upload_max_bytes: 1024,
        };
        Some((state, dir))
    }

    fn instant_publisher() -> Arc<dyn Publisher + Send + Sync> {
        Arc::new(MockPublisher::new(PublisherConfig {
            failure_rate: 0.0,
            latency_min_ms: 0,
            latency_max_ms: 0,
        }))
    }

    fn operator() -> Session {
        Session {
            user_id: i64::from(rand::random::<u32>()) + 1,
            role: Role::Admin,
        }
    }

    struct Fixture {
        client_id: i64,
        instagram: i64,
        linkedin: i64,
    }

    /// A client with a tokened Instagram account and a token-less LinkedIn one.
    async fn fixture(state: &AppState, session: Session) -> Fixture {
        let client = create_client(
            state,
            session,
            CreateClientRequest {
                name: Some("Acme Coffee".to_string()),
                brand_tone: None,
                industry: None,
                description: None,
            },
        )
        .await
        .expect("client");
        let connect = |platform: &str, token: Option<&str>| ConnectAccountRequest {
            platform: Some(platform.to_string()),
            account_name: Some(format!("acme-{platform}")),
            access_token: token.map(str::to_string),
            refresh_token: None,
            token_expires_at: None,
        };
        let instagram = connect_account(state, session, client.id, connect("instagram", Some("tok")))
            .await
            .expect("instagram");
        let linkedin = connect_account(state, session, client.id, connect("linkedin", None))
            .await
            .expect("linkedin");
        Fixture {
            client_id: client.id,
            instagram: instagram.id,
            linkedin: linkedin.id,
        }
    }

    fn at(account_id: i64, hours: i64) -> ScheduleInput {
        ScheduleInput {
            social_account_id: Some(account_id),
            scheduled_at: Some(Utc::now() + ChronoDuration::hours(hours)),
        }
    }

    async fn new_post(
        state: &AppState,
        session: Session,
        client_id: i64,
        schedules: Vec<ScheduleInput>,
    ) -> PostDetail {
        create_post(
            state,
            session,
            CreatePostRequest {
                client_id: Some(client_id),
                title: Some("Autumn blend".to_string()),
                caption: Some("New beans are in".to_string()),
                hashtags: Some(vec!["coffee".to_string()]),
                media_type: None,
                media_url: None,
                schedules: Some(schedules),
            },
        )
        .await
        .expect("post")
    }

    /// Stored post status alongside the aggregate of its stored schedules.
    async fn stored_status(state: &AppState, session: Session, post_id: i64) -> (PostStatus, PostStatus) {
        let detail = get_post(state, session, post_id).await.expect("post");
        let db = state.db.lock().await;
        let statuses = db::schedule_statuses(&*db, post_id).await.expect("statuses");
        (detail.post.status, aggregate(statuses))
    }

    fn only(platform: &str) -> PublishRequest {
        PublishRequest {
            platforms: Some(vec![platform.to_string()]),
        }
    }

    #[tokio::test]
    async fn post_status_tracks_added_and_removed_schedules() {
        let Some((state, _dir)) = db_state(instant_publisher()).await else {
            return;
        };
        let session = operator();
        let fx = fixture(&state, session).await;

        let draft = new_post(&state, session, fx.client_id, Vec::new()).await;
        assert_eq!(draft.post.status, PostStatus::Draft);
        assert!(draft.schedules.is_empty());

        let scheduled = add_schedule(&state, session, draft.post.id, at(fx.instagram, 1))
            .await
            .expect("add");
        assert_eq!(scheduled.post.status, PostStatus::Scheduled);

        let duplicate = add_schedule(&state, session, draft.post.id, at(fx.instagram, 2))
            .await
            .err()
            .expect("duplicate");
        assert_eq!(duplicate.status, StatusCode::CONFLICT);

        let schedule_id = scheduled.schedules[0].id;
        let back = remove_schedule(&state, session, draft.post.id, schedule_id)
            .await
            .expect("remove");
        assert_eq!(back.post.status, PostStatus::Draft);

        let with_two = new_post(&state, session, fx.client_id, vec![at(fx.instagram, 1), at(fx.linkedin, 2)]).await;
        assert_eq!(with_two.post.status, PostStatus::Scheduled);
        assert_eq!(with_two.schedules.len(), 2);
    }

    #[tokio::test]
    async fn publishing_instagram_then_tokenless_linkedin() {
        let Some((state, _dir)) = db_state(instant_publisher()).await else {
            return;
        };
        let session = operator();
        let fx = fixture(&state, session).await;
        let detail = new_post(&state, session, fx.client_id, vec![at(fx.instagram, 1), at(fx.linkedin, 2)]).await;
        let post_id = detail.post.id;

        let first = publish_post(&state, session, post_id, only("instagram"))
            .await
            .expect("publish instagram");
        assert_eq!(first.status, PostStatus::Scheduled);
        assert_eq!(first.results.len(), 1);
        assert!(first.results[0].success);
        assert!(first.results[0]
            .platform_post_id
            .as_deref()
            .is_some_and(|id| id.starts_with("ig_")));
        assert_eq!(
            stored_status(&state, session, post_id).await,
            (PostStatus::Scheduled, PostStatus::Scheduled)
        );

        let second = publish_post(&state, session, post_id, only("linkedin"))
            .await
            .expect("publish linkedin");
        assert_eq!(second.status, PostStatus::Failed);
        assert!(!second.results[0].success);
        assert_eq!(
            second.results[0].error_message.as_deref(),
            Some("LinkedIn account not connected")
        );
        assert_eq!(
            stored_status(&state, session, post_id).await,
            (PostStatus::Failed, PostStatus::Failed)
        );

        let again = publish_post(&state, session, post_id, PublishRequest::default())
            .await
            .expect("publish again");
        assert!(again.results.iter().all(|result| result.skipped));
        assert_eq!(again.status, PostStatus::Failed);
    }

    #[tokio::test]
    async fn deleting_an_account_refreshes_its_posts() {
        let Some((state, _dir)) = db_state(instant_publisher()).await else {
            return;
        };
        let session = operator();
        let fx = fixture(&state, session).await;
        let both = new_post(&state, session, fx.client_id, vec![at(fx.instagram, 1), at(fx.linkedin, 2)]).await;
        let linkedin_only = new_post(&state, session, fx.client_id, vec![at(fx.linkedin, 1)]).await;

        publish_post(&state, session, both.post.id, only("instagram"))
            .await
            .expect("publish instagram");
        delete_account(&state, session, fx.linkedin).await.expect("delete");

        assert_eq!(
            stored_status(&state, session, both.post.id).await,
            (PostStatus::Posted, PostStatus::Posted)
        );
        assert_eq!(
            stored_status(&state, session, linkedin_only.post.id).await,
            (PostStatus::Draft, PostStatus::Draft)
        );

        let missing = delete_account(&state, session, fx.linkedin).await.err().expect("gone");
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    /// Returns an id Postgres refuses to store for every platform but Instagram.
    struct UnstorableIdPublisher;

    impl Publisher for UnstorableIdPublisher {
        fn name(&self) -> &'static str {
            "unstorable"
        }

        fn publish<'a>(
            &'a self,
            platform: Platform,
            _access_token: Option<&'a str>,
            _caption: &'a str,
            _hashtags: &'a [String],
        ) -> PublishFuture<'a> {
            Box::pin(async move {
                match platform {
                    Platform::Instagram => Ok("ig_stored".to_string()),
                    _ => Ok("li_\u{0}".to_string()),
                }
            })
        }
    }

    #[tokio::test]
    async fn failed_recording_keeps_post_status_consistent() {
        let Some((state, _dir)) = db_state(Arc::new(UnstorableIdPublisher)).await else {
            return;
        };
        let session = operator();
        let fx = fixture(&state, session).await;
        let detail = new_post(&state, session, fx.client_id, vec![at(fx.instagram, 1), at(fx.linkedin, 2)]).await;

        let err = publish_post(&state, session, detail.post.id, PublishRequest::default())
            .await
            .err()
            .expect("recording fails");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let db = state.db.lock().await;
        let statuses = db::schedule_statuses(&*db, detail.post.id).await.expect("statuses");
        drop(db);
        assert!(statuses.contains(&ScheduleStatus::Posted));
        assert!(statuses.contains(&ScheduleStatus::Scheduled));
        let (stored, expected) = stored_status(&state, session, detail.post.id).await;
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn client_role_reads_operator_rows_but_cannot_write() {
        let Some((state, _dir)) = db_state(instant_publisher()).await else {
            return;
        };
        let session = operator();
        let fx = fixture(&state, session).await;
        let viewer = Session {
            user_id: session.user_id,
            role: Role::Client,
        };

        let clients = list_clients(&state, viewer).await.expect("list");
        assert_eq!(clients.iter().map(|client| client.id).collect::<Vec<_>>(), vec![fx.client_id]);

        let denied = delete_client(&state, viewer, fx.client_id).await.err().expect("denied");
        assert_eq!(denied.status, StatusCode::FORBIDDEN);

        let stranger = Session {
            user_id: session.user_id + 1,
            role: Role::Admin,
        };
        let hidden = get_client(&state, stranger, fx.client_id).await.err().expect("hidden");
        assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_is_removed_when_metadata_insert_fails() {
        let Some((state, dir)) = db_state(instant_publisher()).await else {
            return;
        };
        let session = operator();
        let input = UploadInput {
            file_name: Some("bad\u{0}.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: vec![1, 2, 3],
            client_id: None,
        };
        let err = upload_media(&state, session, input).await.err().expect("insert fails");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let leftovers = std::fs::read_dir(dir.path()).expect("dir").count();
        assert_eq!(leftovers, 0);
    }
}
