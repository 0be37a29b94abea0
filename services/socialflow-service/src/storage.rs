use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, config::Region, primitives::ByteStream, Client};
use socialflow_common::{env_opt, env_or_string};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
}

impl StorageConfig {
    /// Present only when endpoint and both keys are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            endpoint: env_opt("MINIO_ENDPOINT")?,
            access_key: env_opt("MINIO_ACCESS_KEY")?,
            secret_key: env_opt("MINIO_SECRET_KEY")?,
            bucket: env_or_string("MINIO_BUCKET", "socialflow-media"),
            region: env_or_string("MINIO_REGION", "us-east-1"),
            force_path_style: env_opt("MINIO_FORCE_PATH_STYLE")
                .map(|value| value != "0")
                .unwrap_or(true),
        })
    }
}

/// S3-compatible bucket client for uploaded media.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    public_base: String,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "socialflow",
        );
        let public_base = format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            public_base,
        }
    }

    pub async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String, String> {
        self.ensure_bucket().await?;
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| format!("put object failed: {err}"))?;
        Ok(format!("{}/{}", self.public_base, key))
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(|err| format!("delete object failed: {err}"))?;
        Ok(())
    }

    async fn ensure_bucket(&self) -> Result<(), String> {
        let exists = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .is_ok();
        if !exists {
            tracing::info!(bucket = self.bucket.as_str(), "creating media bucket");
            self.client
                .create_bucket()
                .bucket(self.bucket.as_str())
                .send()
                .await
                .map_err(|err| format!("create bucket failed: {err}"))?;
        }
        Ok(())
    }
}

/// Where uploaded media bytes end up.
#[derive(Clone)]
pub enum MediaStore {
    Disk { root: PathBuf, public_prefix: String },
    Bucket(StorageClient),
}

impl MediaStore {
    pub fn disk(root: impl Into<PathBuf>) -> Self {
        MediaStore::Disk {
            root: root.into(),
            public_prefix: "/uploads".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MediaStore::Disk { .. } => "disk",
            MediaStore::Bucket(_) => "s3",
        }
    }

    pub fn disk_root(&self) -> Option<&Path> {
        match self {
            MediaStore::Disk { root, .. } => Some(root.as_path()),
            MediaStore::Bucket(_) => None,
        }
    }

    /// Store `body` under `key` and return the URL it is reachable at.
    pub async fn put(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<String, String> {
        match self {
            MediaStore::Disk {
                root,
                public_prefix,
            } => {
                tokio::fs::create_dir_all(root)
                    .await
                    .map_err(|err| format!("create upload dir failed: {err}"))?;
                tokio::fs::write(root.join(key), body)
                    .await
                    .map_err(|err| format!("write upload failed: {err}"))?;
                Ok(format!("{public_prefix}/{key}"))
            }
            MediaStore::Bucket(client) => client.put_object(key, content_type, body).await,
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), String> {
        match self {
            MediaStore::Disk { root, .. } => tokio::fs::remove_file(root.join(key))
                .await
                .map_err(|err| format!("remove upload failed: {err}")),
            MediaStore::Bucket(client) => client.delete_object(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_store_writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("media");
        let store = MediaStore::disk(&root);
        let url = store
            .put("abc.png", "image/png", vec![1, 2, 3])
            .await
            .expect("put");
        assert_eq!(url, "/uploads/abc.png");
        assert_eq!(std::fs::read(root.join("abc.png")).expect("read"), vec![1, 2, 3]);
        assert_eq!(store.kind(), "disk");

        store.remove("abc.png").await.expect("remove");
        assert!(!root.join("abc.png").exists());
        assert!(store.remove("abc.png").await.is_err());
    }
}
