use chrono::{DateTime, Utc};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use tokio_postgres::{error::SqlState, GenericClient, Row};

use crate::models::{
    CaptionHistoryEntry, Client, MediaFile, PlatformSchedule, Post, PublishTarget, SocialAccount,
    UpdateClientRequest, UpdatePostRequest,
};
use crate::models::{BrandTone, MediaType, Platform};
use crate::status::{PostStatus, ScheduleStatus};

pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

const CLIENT_COLUMNS: &str =
    "c.id, c.owner_id, c.name, c.brand_tone, c.industry, c.description, c.created_at, c.updated_at";
const ACCOUNT_COLUMNS: &str = "a.id, a.client_id, a.platform, a.account_name, a.access_token, \
a.refresh_token, a.token_expires_at, a.is_connected, a.created_at";
const POST_COLUMNS: &str = "p.id, p.client_id, p.title, p.caption, p.hashtags, p.media_type, \
p.media_url, p.status, p.created_at, p.updated_at";
const SCHEDULE_COLUMNS: &str = "s.id, s.post_id, s.social_account_id, s.platform, s.scheduled_at, \
s.status, s.platform_post_id, s.error_message, s.published_at";

const SQL_INSERT_CLIENT: &str = "INSERT INTO clients AS c (owner_id, name, brand_tone, industry, description) \
VALUES ($1, $2, $3, $4, $5) \
RETURNING c.id, c.owner_id, c.name, c.brand_tone, c.industry, c.description, c.created_at, c.updated_at";
const SQL_UPDATE_CLIENT: &str = "UPDATE clients AS c SET \
name = COALESCE($3, c.name), \
brand_tone = COALESCE($4, c.brand_tone), \
industry = COALESCE($5, c.industry), \
description = COALESCE($6, c.description), \
updated_at = NOW() \
WHERE c.id = $2 AND c.owner_id = $1 \
RETURNING c.id, c.owner_id, c.name, c.brand_tone, c.industry, c.description, c.created_at, c.updated_at";
const SQL_DELETE_CLIENT: &str = "DELETE FROM clients WHERE id = $2 AND owner_id = $1";

const SQL_INSERT_ACCOUNT: &str = "INSERT INTO social_accounts AS a \
(client_id, platform, account_name, access_token, refresh_token, token_expires_at, is_connected) \
VALUES ($1, $2, $3, $4, $5, $6, $7) \
RETURNING a.id, a.client_id, a.platform, a.account_name, a.access_token, a.refresh_token, \
a.token_expires_at, a.is_connected, a.created_at";
const SQL_DISCONNECT_ACCOUNT: &str = "UPDATE social_accounts AS a SET \
access_token = NULL, refresh_token = NULL, token_expires_at = NULL, is_connected = FALSE \
FROM clients c \
WHERE a.id = $2 AND a.client_id = c.id AND c.owner_id = $1 \
RETURNING a.id, a.client_id, a.platform, a.account_name, a.access_token, a.refresh_token, \
a.token_expires_at, a.is_connected, a.created_at";
const SQL_DELETE_ACCOUNT: &str = "DELETE FROM social_accounts a USING clients c \
WHERE a.id = $2 AND a.client_id = c.id AND c.owner_id = $1";

const SQL_ACCOUNT_POSTS: &str =
    "SELECT DISTINCT post_id FROM platform_schedules WHERE social_account_id = $1 ORDER BY post_id";

const SQL_INSERT_POST: &str = "INSERT INTO posts AS p \
(client_id, title, caption, hashtags, media_type, media_url, status) \
VALUES ($1, $2, $3, $4, $5, $6, $7) \
RETURNING p.id, p.client_id, p.title, p.caption, p.hashtags, p.media_type, p.media_url, \
p.status, p.created_at, p.updated_at";
const SQL_UPDATE_POST: &str = "UPDATE posts AS p SET \
title = COALESCE($3, p.title), \
caption = COALESCE($4, p.caption), \
hashtags = COALESCE($5, p.hashtags), \
media_type = COALESCE($6, p.media_type), \
media_url = COALESCE($7, p.media_url), \
updated_at = NOW() \
FROM clients c \
WHERE p.id = $2 AND p.client_id = c.id AND c.owner_id = $1 \
RETURNING p.id, p.client_id, p.title, p.caption, p.hashtags, p.media_type, p.media_url, \
p.status, p.created_at, p.updated_at";
const SQL_UPDATE_POST_STATUS: &str =
    "UPDATE posts SET status = $2, updated_at = NOW() WHERE id = $1";
const SQL_DELETE_POST: &str = "DELETE FROM posts p USING clients c \
WHERE p.id = $2 AND p.client_id = c.id AND c.owner_id = $1";

const SQL_INSERT_SCHEDULE: &str = "INSERT INTO platform_schedules AS s \
(post_id, social_account_id, platform, scheduled_at) \
VALUES ($1, $2, $3, $4) \
RETURNING s.id, s.post_id, s.social_account_id, s.platform, s.scheduled_at, s.status, \
s.platform_post_id, s.error_message, s.published_at";
const SQL_DELETE_PENDING_SCHEDULE: &str =
    "DELETE FROM platform_schedules WHERE id = $2 AND post_id = $1 AND status = 'SCHEDULED'";
const SQL_SCHEDULE_STATUSES: &str = "SELECT status FROM platform_schedules WHERE post_id = $1";
const SQL_PUBLISH_TARGETS: &str = "SELECT s.id, s.platform, s.status, a.access_token \
FROM platform_schedules s JOIN social_accounts a ON a.id = s.social_account_id \
WHERE s.post_id = $1 ORDER BY s.scheduled_at, s.id";
// Only pending rows move; a concurrently finished schedule is left alone.
const SQL_RECORD_PUBLISH: &str = "UPDATE platform_schedules SET \
status = $2, platform_post_id = $3, error_message = $4, \
published_at = CASE WHEN $2 = 'POSTED' THEN NOW() ELSE NULL END \
WHERE id = $1 AND status = 'SCHEDULED'";

const SQL_RECENT_CAPTIONS: &str =
    "SELECT caption FROM caption_history WHERE client_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2";
const SQL_LIST_CAPTIONS: &str = "SELECT h.id, h.client_id, h.caption, h.hashtags, h.platforms, h.created_at \
FROM caption_history h JOIN clients c ON c.id = h.client_id \
WHERE c.owner_id = $1 AND h.client_id = $2 ORDER BY h.created_at DESC, h.id DESC LIMIT $3";
const SQL_INSERT_CAPTION: &str =
    "INSERT INTO caption_history (client_id, caption, hashtags, platforms) VALUES ($1, $2, $3, $4)";

const SQL_INSERT_MEDIA: &str = "INSERT INTO media_files \
(owner_id, client_id, file_name, content_type, size_bytes, sha256, storage_key, url) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
RETURNING id, owner_id, client_id, file_name, content_type, size_bytes, sha256, storage_key, url, created_at";

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
    #[error("unreadable column {column}: {reason}")]
    Column { column: &'static str, reason: String },
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
    }

    fn sql_state(&self) -> Option<&SqlState> {
        match self {
            DbError::Postgres(err) => err.as_db_error().map(|db_err| db_err.code()),
            DbError::Column { .. } => None,
        }
    }
}

/// Filters for the post listing; all optional.
#[derive(Default)]
pub struct PostFilter {
    pub client_id: Option<i64>,
    pub status: Option<PostStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn ensure_schema(db: &tokio_postgres::Client) -> Result<(), DbError> {
    db.batch_execute(SCHEMA_SQL).await?;
    Ok(())
}

fn parse_column<T>(row: &Row, column: &'static str) -> Result<T, DbError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|err| DbError::Column {
        column,
        reason: err.to_string(),
    })
}

fn client_from_row(row: &Row) -> Result<Client, DbError> {
    Ok(Client {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        brand_tone: parse_column::<BrandTone>(row, "brand_tone")?,
        industry: row.try_get("industry")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn account_from_row(row: &Row) -> Result<SocialAccount, DbError> {
    Ok(SocialAccount {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        platform: parse_column::<Platform>(row, "platform")?,
        account_name: row.try_get("account_name")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        token_expires_at: row.try_get("token_expires_at")?,
        is_connected: row.try_get("is_connected")?,
        created_at: row.try_get("created_at")?,
    })
}

fn post_from_row(row: &Row) -> Result<Post, DbError> {
    Ok(Post {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        title: row.try_get("title")?,
        caption: row.try_get("caption")?,
        hashtags: row.try_get("hashtags")?,
        media_type: parse_column::<MediaType>(row, "media_type")?,
        media_url: row.try_get("media_url")?,
        status: parse_column::<PostStatus>(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn schedule_from_row(row: &Row) -> Result<PlatformSchedule, DbError> {
    Ok(PlatformSchedule {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        social_account_id: row.try_get("social_account_id")?,
        platform: parse_column::<Platform>(row, "platform")?,
        scheduled_at: row.try_get("scheduled_at")?,
        status: parse_column::<ScheduleStatus>(row, "status")?,
        platform_post_id: row.try_get("platform_post_id")?,
        error_message: row.try_get("error_message")?,
        published_at: row.try_get("published_at")?,
    })
}

fn collect<T>(rows: Vec<Row>, map: fn(&Row) -> Result<T, DbError>) -> Result<Vec<T>, DbError> {
    rows.iter().map(map).collect()
}

pub async fn list_clients(db: &impl GenericClient, owner_id: i64) -> Result<Vec<Client>, DbError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.owner_id = $1 ORDER BY c.name, c.id");
    let rows = db.query(sql.as_str(), &[&owner_id]).await?;
    collect(rows, client_from_row)
}

pub async fn select_client(
    db: &impl GenericClient,
    owner_id: i64,
    client_id: i64,
) -> Result<Option<Client>, DbError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients c WHERE c.owner_id = $1 AND c.id = $2");
    let row = db.query_opt(sql.as_str(), &[&owner_id, &client_id]).await?;
    row.as_ref().map(client_from_row).transpose()
}

pub async fn insert_client(
    db: &impl GenericClient,
    owner_id: i64,
    name: &str,
    brand_tone: BrandTone,
    industry: Option<&str>,
    description: Option<&str>,
) -> Result<Client, DbError> {
    let row = db
        .query_one(
            SQL_INSERT_CLIENT,
            &[&owner_id, &name, &brand_tone.as_str(), &industry, &description],
        )
        .await?;
    client_from_row(&row)
}

pub async fn update_client(
    db: &impl GenericClient,
    owner_id: i64,
    client_id: i64,
    changes: &UpdateClientRequest,
) -> Result<Option<Client>, DbError> {
    let tone = changes.brand_tone.map(|tone| tone.as_str());
    let row = db
        .query_opt(
            SQL_UPDATE_CLIENT,
            &[
                &owner_id,
                &client_id,
                &changes.name,
                &tone,
                &changes.industry,
                &changes.description,
            ],
        )
        .await?;
    row.as_ref().map(client_from_row).transpose()
}

pub async fn delete_client(
    db: &impl GenericClient,
    owner_id: i64,
    client_id: i64,
) -> Result<bool, DbError> {
    let deleted = db.execute(SQL_DELETE_CLIENT, &[&owner_id, &client_id]).await?;
    Ok(deleted > 0)
}

pub async fn list_accounts(
    db: &impl GenericClient,
    owner_id: i64,
    client_id: i64,
) -> Result<Vec<SocialAccount>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts a JOIN clients c ON c.id = a.client_id \
WHERE c.owner_id = $1 AND a.client_id = $2 ORDER BY a.platform"
    );
    let rows = db.query(sql.as_str(), &[&owner_id, &client_id]).await?;
    collect(rows, account_from_row)
}

pub async fn select_account(
    db: &impl GenericClient,
    owner_id: i64,
    account_id: i64,
) -> Result<Option<SocialAccount>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts a JOIN clients c ON c.id = a.client_id \
WHERE c.owner_id = $1 AND a.id = $2"
    );
    let row = db.query_opt(sql.as_str(), &[&owner_id, &account_id]).await?;
    row.as_ref().map(account_from_row).transpose()
}

pub struct NewAccount<'a> {
    pub client_id: i64,
    pub platform: Platform,
    pub account_name: &'a str,
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

pub async fn insert_account(
    db: &impl GenericClient,
    account: &NewAccount<'_>,
) -> Result<SocialAccount, DbError> {
    let is_connected = account.access_token.is_some();
    let row = db
        .query_one(
            SQL_INSERT_ACCOUNT,
            &[
                &account.client_id,
                &account.platform.as_str(),
                &account.account_name,
                &account.access_token,
                &account.refresh_token,
                &account.token_expires_at,
                &is_connected,
            ],
        )
        .await?;
    account_from_row(&row)
}

pub async fn disconnect_account(
    db: &impl GenericClient,
    owner_id: i64,
    account_id: i64,
) -> Result<Option<SocialAccount>, DbError> {
    let row = db
        .query_opt(SQL_DISCONNECT_ACCOUNT, &[&owner_id, &account_id])
        .await?;
    row.as_ref().map(account_from_row).transpose()
}

pub async fn delete_account(
    db: &impl GenericClient,
    owner_id: i64,
    account_id: i64,
) -> Result<bool, DbError> {
    let deleted = db
        .execute(SQL_DELETE_ACCOUNT, &[&owner_id, &account_id])
        .await?;
    Ok(deleted > 0)
}

/// Posts with a schedule on this account; their status moves when it goes away.
pub async fn account_post_ids(db: &impl GenericClient, account_id: i64) -> Result<Vec<i64>, DbError> {
    let rows = db.query(SQL_ACCOUNT_POSTS, &[&account_id]).await?;
    rows.iter()
        .map(|row| row.try_get::<_, i64>("post_id").map_err(DbError::from))
        .collect()
}

pub async fn list_posts(
    db: &impl GenericClient,
    owner_id: i64,
    filter: &PostFilter,
) -> Result<Vec<Post>, DbError> {
    // A time window matches posts with at least one schedule inside it.
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p JOIN clients c ON c.id = p.client_id \
WHERE c.owner_id = $1 \
AND ($2::BIGINT IS NULL OR p.client_id = $2) \
AND ($3::TEXT IS NULL OR p.status = $3) \
AND (($4::TIMESTAMPTZ IS NULL AND $5::TIMESTAMPTZ IS NULL) OR EXISTS ( \
SELECT 1 FROM platform_schedules s WHERE s.post_id = p.id \
AND ($4::TIMESTAMPTZ IS NULL OR s.scheduled_at >= $4) \
AND ($5::TIMESTAMPTZ IS NULL OR s.scheduled_at < $5))) \
ORDER BY p.created_at DESC, p.id DESC"
    );
    let status = filter.status.map(|status| status.as_str());
    let rows = db
        .query(
            sql.as_str(),
            &[&owner_id, &filter.client_id, &status, &filter.from, &filter.to],
        )
        .await?;
    collect(rows, post_from_row)
}

pub async fn select_post(
    db: &impl GenericClient,
    owner_id: i64,
    post_id: i64,
) -> Result<Option<Post>, DbError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p JOIN clients c ON c.id = p.client_id \
WHERE c.owner_id = $1 AND p.id = $2"
    );
    let row = db.query_opt(sql.as_str(), &[&owner_id, &post_id]).await?;
    row.as_ref().map(post_from_row).transpose()
}

pub struct NewPost<'a> {
    pub client_id: i64,
    pub title: &'a str,
    pub caption: &'a str,
    pub hashtags: &'a [String],
    pub media_type: MediaType,
    pub media_url: Option<&'a str>,
    pub status: PostStatus,
}

pub async fn insert_post(db: &impl GenericClient, post: &NewPost<'_>) -> Result<Post, DbError> {
    let row = db
        .query_one(
            SQL_INSERT_POST,
            &[
                &post.client_id,
                &post.title,
                &post.caption,
                &post.hashtags,
                &post.media_type.as_str(),
                &post.media_url,
                &post.status.as_str(),
            ],
        )
        .await?;
    post_from_row(&row)
}

pub async fn update_post(
    db: &impl GenericClient,
    owner_id: i64,
    post_id: i64,
    changes: &UpdatePostRequest,
) -> Result<Option<Post>, DbError> {
    let media_type = changes.media_type.map(|media| media.as_str());
    let row = db
        .query_opt(
            SQL_UPDATE_POST,
            &[
                &owner_id,
                &post_id,
                &changes.title,
                &changes.caption,
                &changes.hashtags,
                &media_type,
                &changes.media_url,
            ],
        )
        .await?;
    row.as_ref().map(post_from_row).transpose()
}

pub async fn update_post_status(
    db: &impl GenericClient,
    post_id: i64,
    status: PostStatus,
) -> Result<(), DbError> {
    db.execute(SQL_UPDATE_POST_STATUS, &[&post_id, &status.as_str()])
        .await?;
    Ok(())
}

pub async fn delete_post(
    db: &impl GenericClient,
    owner_id: i64,
    post_id: i64,
) -> Result<bool, DbError> {
    let deleted = db.execute(SQL_DELETE_POST, &[&owner_id, &post_id]).await?;
    Ok(deleted > 0)
}

pub async fn list_schedules(
    db: &impl GenericClient,
    post_id: i64,
) -> Result<Vec<PlatformSchedule>, DbError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM platform_schedules s WHERE s.post_id = $1 \
ORDER BY s.scheduled_at, s.id"
    );
    let rows = db.query(sql.as_str(), &[&post_id]).await?;
    collect(rows, schedule_from_row)
}

pub async fn insert_schedule(
    db: &impl GenericClient,
    post_id: i64,
    account: &SocialAccount,
    scheduled_at: DateTime<Utc>,
) -> Result<PlatformSchedule, DbError> {
    let row = db
        .query_one(
            SQL_INSERT_SCHEDULE,
            &[&post_id, &account.id, &account.platform.as_str(), &scheduled_at],
        )
        .await?;
    schedule_from_row(&row)
}

pub async fn delete_pending_schedule(
    db: &impl GenericClient,
    post_id: i64,
    schedule_id: i64,
) -> Result<bool, DbError> {
    let deleted = db
        .execute(SQL_DELETE_PENDING_SCHEDULE, &[&post_id, &schedule_id])
        .await?;
    Ok(deleted > 0)
}

pub async fn schedule_statuses(
    db: &impl GenericClient,
    post_id: i64,
) -> Result<Vec<ScheduleStatus>, DbError> {
    let rows = db.query(SQL_SCHEDULE_STATUSES, &[&post_id]).await?;
    rows.iter()
        .map(|row| parse_column::<ScheduleStatus>(row, "status"))
        .collect()
}

pub async fn publish_targets(
    db: &impl GenericClient,
    post_id: i64,
) -> Result<Vec<PublishTarget>, DbError> {
    let rows = db.query(SQL_PUBLISH_TARGETS, &[&post_id]).await?;
    rows.iter()
        .map(|row| -> Result<PublishTarget, DbError> {
            Ok(PublishTarget {
                schedule_id: row.try_get("id")?,
                platform: parse_column::<Platform>(row, "platform")?,
                status: parse_column::<ScheduleStatus>(row, "status")?,
                access_token: row.try_get("access_token")?,
            })
        })
        .collect()
}

/// Returns false when the schedule was no longer pending.
pub async fn record_publish(
    db: &impl GenericClient,
    schedule_id: i64,
    status: ScheduleStatus,
    platform_post_id: Option<&str>,
    error_message: Option<&str>,
) -> Result<bool, DbError> {
    let updated = db
        .execute(
            SQL_RECORD_PUBLISH,
            &[&schedule_id, &status.as_str(), &platform_post_id, &error_message],
        )
        .await?;
    Ok(updated > 0)
}

pub async fn recent_captions(
    db: &impl GenericClient,
    client_id: i64,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    let rows = db.query(SQL_RECENT_CAPTIONS, &[&client_id, &limit]).await?;
    rows.iter()
        .map(|row| row.try_get::<_, String>("caption").map_err(DbError::from))
        .collect()
}

pub async fn list_caption_history(
    db: &impl GenericClient,
    owner_id: i64,
    client_id: i64,
    limit: i64,
) -> Result<Vec<CaptionHistoryEntry>, DbError> {
    let rows = db
        .query(SQL_LIST_CAPTIONS, &[&owner_id, &client_id, &limit])
        .await?;
    rows.iter()
        .map(|row| -> Result<CaptionHistoryEntry, DbError> {
            Ok(CaptionHistoryEntry {
                id: row.try_get("id")?,
                client_id: row.try_get("client_id")?,
                caption: row.try_get("caption")?,
                hashtags: row.try_get("hashtags")?,
                platforms: row.try_get("platforms")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

pub async fn insert_caption_history(
    db: &impl GenericClient,
    client_id: i64,
    caption: &str,
    hashtags: &[String],
    platforms: &[Platform],
) -> Result<(), DbError> {
    let platforms: Vec<&str> = platforms.iter().map(|platform| platform.as_str()).collect();
    db.execute(
        SQL_INSERT_CAPTION,
        &[&client_id, &caption, &hashtags, &platforms],
    )
    .await?;
    Ok(())
}

pub struct NewMedia<'a> {
    pub owner_id: i64,
    pub client_id: Option<i64>,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub sha256: &'a str,
    pub storage_key: &'a str,
    pub url: &'a str,
}

pub async fn insert_media(db: &impl GenericClient, media: &NewMedia<'_>) -> Result<MediaFile, DbError> {
    let row = db
        .query_one(
            SQL_INSERT_MEDIA,
            &[
                &media.owner_id,
                &media.client_id,
                &media.file_name,
                &media.content_type,
                &media.size_bytes,
                &media.sha256,
                &media.storage_key,
                &media.url,
            ],
        )
        .await?;
    Ok(MediaFile {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        client_id: row.try_get("client_id")?,
        file_name: row.try_get("file_name")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        sha256: row.try_get("sha256")?,
        storage_key: row.try_get("storage_key")?,
        url: row.try_get("url")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_every_table() {
        for table in [
            "clients",
            "social_accounts",
            "posts",
            "platform_schedules",
            "caption_history",
            "media_files",
        ] {
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "{table}"
            );
        }
    }

    #[test]
    fn publish_update_only_touches_pending_rows() {
        assert!(SQL_RECORD_PUBLISH.contains("status = 'SCHEDULED'"));
        assert!(SQL_DELETE_PENDING_SCHEDULE.contains("status = 'SCHEDULED'"));
    }

    #[test]
    fn column_errors_name_the_column() {
        let err = DbError::Column {
            column: "status",
            reason: "unknown status \"ARCHIVED\"".to_string(),
        };
        assert!(err.to_string().contains("status"));
        assert!(!err.is_unique_violation());
    }
}
