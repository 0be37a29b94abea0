use sha2::{Digest, Sha256};
use socialflow_common::{env_or, env_or_string};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted MIME types and the extension stored files get.
pub static ALLOWED_CONTENT_TYPES: [(&str, &str); 5] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
];

#[derive(Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: u64,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self {
            dir: PathBuf::from(env_or_string("UPLOAD_DIR", "./uploads")),
            max_bytes: env_or("UPLOAD_MAX_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("file type {0} is not allowed")]
    UnsupportedType(String),
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("file is empty")]
    Empty,
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::UnsupportedType(_) => "unsupported_type",
            UploadError::TooLarge { .. } => "file_too_large",
            UploadError::Empty => "empty_file",
        }
    }
}

/// Check type and size; returns the extension for the stored file.
pub fn validate_upload(content_type: &str, size: u64, limit: u64) -> Result<&'static str, UploadError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some((_, ext)) = ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == essence)
    else {
        return Err(UploadError::UnsupportedType(essence));
    };
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > limit {
        return Err(UploadError::TooLarge { size, limit });
    }
    Ok(*ext)
}

pub fn storage_key(ext: &str) -> String {
    format!("{}.{ext}", uuid::Uuid::new_v4().simple())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Keep only the final path component of a client-supplied file name.
pub fn clean_file_name(name: Option<&str>) -> String {
    name.and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string()
}
