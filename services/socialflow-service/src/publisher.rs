use rand::Rng;
use socialflow_common::env_or;
use std::{future::Future, pin::Pin, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Platform;

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<String, PublishError>> + Send + 'a>>;

/// Publishes a caption to one platform and returns the external post id.
pub trait Publisher {
    fn name(&self) -> &'static str;
    fn publish<'a>(
        &'a self,
        platform: Platform,
        access_token: Option<&'a str>,
        caption: &'a str,
        hashtags: &'a [String],
    ) -> PublishFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("{} account not connected", .0.label())]
    NotConnected(Platform),
    #[error("{} API rate limit exceeded, try again later", .0.label())]
    RateLimited(Platform),
    #[error("{} access token expired, reconnect the account", .0.label())]
    TokenExpired(Platform),
    #[error("{} rejected the post for violating its content policy", .0.label())]
    PolicyViolation(Platform),
}

impl PublishError {
    /// Canned failures the mock draws from when a publish is rolled as failed.
    pub fn simulated(platform: Platform) -> [PublishError; 3] {
        [
            PublishError::RateLimited(platform),
            PublishError::TokenExpired(platform),
            PublishError::PolicyViolation(platform),
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PublisherConfig {
    pub failure_rate: f64,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.1,
            latency_min_ms: 500,
            latency_max_ms: 1000,
        }
    }
}

impl PublisherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_rate: env_or("PUBLISH_FAILURE_RATE", defaults.failure_rate),
            latency_min_ms: env_or("PUBLISH_LATENCY_MIN_MS", defaults.latency_min_ms),
            latency_max_ms: env_or("PUBLISH_LATENCY_MAX_MS", defaults.latency_max_ms),
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        self.failure_rate = if self.failure_rate.is_finite() {
            self.failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.latency_max_ms = self.latency_max_ms.max(self.latency_min_ms);
        self
    }
}

/// Stand-in for the platform SDKs: waits, then fails or hands back a fake id.
#[derive(Clone, Debug)]
pub struct MockPublisher {
    config: PublisherConfig,
}

impl MockPublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    pub async fn publish(
        &self,
        platform: Platform,
        access_token: Option<&str>,
        caption: &str,
        hashtags: &[String],
    ) -> Result<String, PublishError> {
        // ThreadRng is !Send, so draw everything before the first await.
        let (latency_ms, fails, pick) = {
            let mut rng = rand::thread_rng();
            let latency_ms = rng.gen_range(self.config.latency_min_ms..=self.config.latency_max_ms);
            let fails = rng.gen_bool(self.config.failure_rate);
            let pick = rng.gen_range(0..3usize);
            (latency_ms, fails, pick)
        };

        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        let connected = access_token.is_some_and(|token| !token.trim().is_empty());
        if !connected {
            return Err(PublishError::NotConnected(platform));
        }

        if fails {
            let err = PublishError::simulated(platform)[pick].clone();
            tracing::warn!(platform = platform.as_str(), error = %err, "simulated publish failure");
            return Err(err);
        }

        let external_id = format!("{}_{}", external_prefix(platform), Uuid::new_v4().simple());
        tracing::info!(
            platform = platform.as_str(),
            external_id = external_id.as_str(),
            caption_len = caption.len(),
            hashtags = hashtags.len(),
            latency_ms,
            "mock publish succeeded"
        );
        Ok(external_id)
    }
}

impl Publisher for MockPublisher {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn publish<'a>(
        &'a self,
        platform: Platform,
        access_token: Option<&'a str>,
        caption: &'a str,
        hashtags: &'a [String],
    ) -> PublishFuture<'a> {
        Box::pin(MockPublisher::publish(self, platform, access_token, caption, hashtags))
    }
}

fn external_prefix(platform: Platform) -> &'static str {
    match platform {
        Platform::Instagram => "ig",
        Platform::Facebook => "fb",
        Platform::Linkedin => "li",
    }
}
