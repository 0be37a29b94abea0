use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::status::{PostStatus, ScheduleStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Instagram,
    Facebook,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Facebook, Platform::Linkedin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "INSTAGRAM",
            Platform::Facebook => "FACEBOOK",
            Platform::Linkedin => "LINKEDIN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Linkedin => "LinkedIn",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSTAGRAM" => Ok(Platform::Instagram),
            "FACEBOOK" => Ok(Platform::Facebook),
            "LINKEDIN" => Ok(Platform::Linkedin),
            _ => Err(format!("unknown platform {s:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrandTone {
    #[default]
    Professional,
    Casual,
    Friendly,
    Humorous,
    Inspirational,
    Luxurious,
    Educational,
}

impl BrandTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrandTone::Professional => "PROFESSIONAL",
            BrandTone::Casual => "CASUAL",
            BrandTone::Friendly => "FRIENDLY",
            BrandTone::Humorous => "HUMOROUS",
            BrandTone::Inspirational => "INSPIRATIONAL",
            BrandTone::Luxurious => "LUXURIOUS",
            BrandTone::Educational => "EDUCATIONAL",
        }
    }
}

impl FromStr for BrandTone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROFESSIONAL" => Ok(BrandTone::Professional),
            "CASUAL" => Ok(BrandTone::Casual),
            "FRIENDLY" => Ok(BrandTone::Friendly),
            "HUMOROUS" => Ok(BrandTone::Humorous),
            "INSPIRATIONAL" => Ok(BrandTone::Inspirational),
            "LUXURIOUS" => Ok(BrandTone::Luxurious),
            "EDUCATIONAL" => Ok(BrandTone::Educational),
            _ => Err(format!("unknown brand tone {s:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Carousel,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "IMAGE",
            MediaType::Video => "VIDEO",
            MediaType::Carousel => "CAROUSEL",
            MediaType::Text => "TEXT",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => Ok(MediaType::Image),
            "VIDEO" => Ok(MediaType::Video),
            "CAROUSEL" => Ok(MediaType::Carousel),
            "TEXT" => Ok(MediaType::Text),
            _ => Err(format!("unknown media type {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub brand_tone: BrandTone,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialAccount {
    pub id: i64,
    pub client_id: i64,
    pub platform: Platform,
    pub account_name: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_connected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub client_id: i64,
    pub title: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub media_type: MediaType,
    pub media_url: Option<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformSchedule {
    pub id: i64,
    pub post_id: i64,
    pub social_account_id: i64,
    pub platform: Platform,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A pending schedule joined with the token of the account it publishes through.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub schedule_id: i64,
    pub platform: Platform,
    pub status: ScheduleStatus,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptionHistoryEntry {
    pub id: i64,
    pub client_id: i64,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub platforms: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub id: i64,
    pub owner_id: i64,
    pub client_id: Option<i64>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub storage_key: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub brand_tone: Option<BrandTone>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub brand_tone: Option<BrandTone>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct ConnectAccountRequest {
    pub platform: Option<String>,
    pub account_name: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Clone)]
pub struct ScheduleInput {
    pub social_account_id: Option<i64>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub client_id: Option<i64>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub media_type: Option<MediaType>,
    pub media_url: Option<String>,
    pub schedules: Option<Vec<ScheduleInput>>,
}

#[derive(Deserialize, Default)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub media_type: Option<MediaType>,
    pub media_url: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PostListParams {
    pub client_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PublishRequest {
    pub platforms: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct GenerateCaptionRequest {
    pub client_id: Option<i64>,
    pub platforms: Option<Vec<String>>,
    pub topic: Option<String>,
    pub image_description: Option<String>,
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub schedules: Vec<PlatformSchedule>,
}

#[derive(Serialize)]
pub struct PublishResult {
    pub schedule_id: i64,
    pub platform: Platform,
    pub success: bool,
    pub skipped: bool,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub post_id: i64,
    pub status: PostStatus,
    pub results: Vec<PublishResult>,
}

#[derive(Serialize)]
pub struct GenerateCaptionResponse {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub source: &'static str,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub media: MediaFile,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_names_round_trip_through_json() {
        let json = serde_json::to_string(&Platform::Linkedin).expect("serialize");
        assert_eq!(json, "\"LINKEDIN\"");
        assert_eq!("linkedin".parse::<Platform>(), Ok(Platform::Linkedin));
        assert!("tiktok".parse::<Platform>().is_err());
    }

    #[test]
    fn social_account_hides_tokens() {
        let account = SocialAccount {
            id: 1,
            client_id: 2,
            platform: Platform::Instagram,
            account_name: "@acme".to_string(),
            access_token: Some("secret".to_string()),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: None,
            is_connected: true,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&account).expect("serialize");
        assert!(value.get("access_token").is_none());
        assert!(value.get("refresh_token").is_none());
        assert_eq!(value["is_connected"], true);
    }

    #[test]
    fn brand_tone_defaults_to_professional() {
        assert_eq!(BrandTone::default(), BrandTone::Professional);
        assert_eq!("casual".parse::<BrandTone>(), Ok(BrandTone::Casual));
    }
}
