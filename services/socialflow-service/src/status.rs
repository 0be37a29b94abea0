use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Aggregate status of a post, derived from its platform schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Posted,
    Failed,
}

/// Status of one (post, social account) publish slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Scheduled,
    Posted,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("schedule already {0}")]
    AlreadyFinal(ScheduleStatus),
    #[error("unknown status {0:?}")]
    Unknown(String),
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Scheduled => "SCHEDULED",
            PostStatus::Posted => "POSTED",
            PostStatus::Failed => "FAILED",
        }
    }
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "SCHEDULED",
            ScheduleStatus::Posted => "POSTED",
            ScheduleStatus::Failed => "FAILED",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, ScheduleStatus::Scheduled)
    }

    /// SCHEDULED moves to POSTED or FAILED; both of those are final.
    pub fn apply_publish(self, succeeded: bool) -> Result<ScheduleStatus, StatusError> {
        if self.is_final() {
            return Err(StatusError::AlreadyFinal(self));
        }
        Ok(if succeeded {
            ScheduleStatus::Posted
        } else {
            ScheduleStatus::Failed
        })
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "SCHEDULED" => Ok(PostStatus::Scheduled),
            "POSTED" => Ok(PostStatus::Posted),
            "FAILED" => Ok(PostStatus::Failed),
            _ => Err(StatusError::Unknown(s.to_string())),
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(ScheduleStatus::Scheduled),
            "POSTED" => Ok(ScheduleStatus::Posted),
            "FAILED" => Ok(ScheduleStatus::Failed),
            _ => Err(StatusError::Unknown(s.to_string())),
        }
    }
}

/// Compute a post's status from the statuses of all of its schedules.
///
/// No schedules means DRAFT. Every schedule POSTED means POSTED. Any FAILED
/// with nothing left pending means FAILED. Anything still pending keeps the
/// post SCHEDULED.
pub fn aggregate<I>(schedules: I) -> PostStatus
where
    I: IntoIterator<Item = ScheduleStatus>,
{
    let mut total = 0usize;
    let mut posted = 0usize;
    let mut failed = 0usize;
    for status in schedules {
        total += 1;
        match status {
            ScheduleStatus::Posted => posted += 1,
            ScheduleStatus::Failed => failed += 1,
            ScheduleStatus::Scheduled => {}
        }
    }

    if total == 0 {
        PostStatus::Draft
    } else if posted == total {
        PostStatus::Posted
    } else if failed > 0 && posted + failed == total {
        PostStatus::Failed
    } else {
        PostStatus::Scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use crate::publisher::{MockPublisher, PublisherConfig};

    const ALL: [ScheduleStatus; 3] = [
        ScheduleStatus::Scheduled,
        ScheduleStatus::Posted,
        ScheduleStatus::Failed,
    ];

    fn combinations(len: usize) -> Vec<Vec<ScheduleStatus>> {
        let mut out = vec![Vec::new()];
        for _ in 0..len {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    ALL.iter().map(move |status| {
                        let mut next = prefix.clone();
                        next.push(*status);
                        next
                    })
                })
                .collect();
        }
        out
    }

    #[test]
    fn empty_post_is_draft() {
        assert_eq!(aggregate(Vec::new()), PostStatus::Draft);
    }

    #[test]
    fn first_schedule_moves_draft_to_scheduled() {
        assert_eq!(aggregate([ScheduleStatus::Scheduled]), PostStatus::Scheduled);
    }

    #[test]
    fn posted_iff_every_schedule_posted() {
        for len in 1..=4 {
            for statuses in combinations(len) {
                let all_posted = statuses.iter().all(|s| *s == ScheduleStatus::Posted);
                let status = aggregate(statuses.iter().copied());
                assert_eq!(status == PostStatus::Posted, all_posted, "{statuses:?}");
            }
        }
    }

    #[test]
    fn failed_iff_some_failed_and_none_pending() {
        for len in 1..=4 {
            for statuses in combinations(len) {
                let any_failed = statuses.contains(&ScheduleStatus::Failed);
                let any_pending = statuses.contains(&ScheduleStatus::Scheduled);
                let status = aggregate(statuses.iter().copied());
                assert_eq!(
                    status == PostStatus::Failed,
                    any_failed && !any_pending,
                    "{statuses:?}"
                );
            }
        }
    }

    #[test]
    fn pending_schedule_keeps_post_scheduled() {
        let status = aggregate([ScheduleStatus::Posted, ScheduleStatus::Scheduled]);
        assert_eq!(status, PostStatus::Scheduled);
        let status = aggregate([ScheduleStatus::Failed, ScheduleStatus::Scheduled]);
        assert_eq!(status, PostStatus::Scheduled);
    }

    #[test]
    fn final_schedules_reject_publish() {
        assert_eq!(
            ScheduleStatus::Posted.apply_publish(true),
            Err(StatusError::AlreadyFinal(ScheduleStatus::Posted))
        );
        assert_eq!(
            ScheduleStatus::Failed.apply_publish(true),
            Err(StatusError::AlreadyFinal(ScheduleStatus::Failed))
        );
        assert_eq!(
            ScheduleStatus::Scheduled.apply_publish(false),
            Ok(ScheduleStatus::Failed)
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("posted".parse::<PostStatus>(), Ok(PostStatus::Posted));
        assert_eq!("Failed".parse::<ScheduleStatus>(), Ok(ScheduleStatus::Failed));
        assert!("ARCHIVED".parse::<PostStatus>().is_err());
        assert!("DRAFT".parse::<ScheduleStatus>().is_err());
    }

    #[tokio::test]
    async fn partial_publish_then_disconnected_platform_fails_post() {
        let publisher = MockPublisher::new(PublisherConfig {
            failure_rate: 0.0,
            latency_min_ms: 0,
            latency_max_ms: 0,
        });
        let hashtags = vec!["#launch".to_string()];
        let mut instagram = ScheduleStatus::Scheduled;
        let mut linkedin = ScheduleStatus::Scheduled;
        assert_eq!(aggregate([instagram, linkedin]), PostStatus::Scheduled);

        let outcome = publisher
            .publish(Platform::Instagram, Some("ig-token"), "Hello", &hashtags)
            .await;
        instagram = instagram.apply_publish(outcome.is_ok()).expect("pending");
        assert_eq!(instagram, ScheduleStatus::Posted);
        assert_eq!(linkedin, ScheduleStatus::Scheduled);
        assert_eq!(aggregate([instagram, linkedin]), PostStatus::Scheduled);

        let outcome = publisher
            .publish(Platform::Linkedin, None, "Hello", &hashtags)
            .await;
        linkedin = linkedin.apply_publish(outcome.is_ok()).expect("pending");
        assert_eq!(linkedin, ScheduleStatus::Failed);
        assert_eq!(aggregate([instagram, linkedin]), PostStatus::Failed);
    }
}
