use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::StatusCode};
use std::str::FromStr;

use crate::service::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Moderator,
    Client,
}

impl Role {
    pub fn can_mutate(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MODERATOR" => Ok(Role::Moderator),
            "CLIENT" => Ok(Role::Client),
            _ => Err(()),
        }
    }
}

/// Caller identity handed over by the upstream auth provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub role: Role,
}

impl Session {
    pub fn require_mutation(&self) -> Result<(), ServiceError> {
        if self.role.can_mutate() {
            return Ok(());
        }
        tracing::warn!(user_id = self.user_id, role = ?self.role, "mutation denied");
        Err(ServiceError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "operator role required".to_string(),
        ))
    }

    pub fn from_parts(parts: &Parts) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };

        let user_id = header(USER_ID_HEADER)
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|id| *id > 0);
        let role = header(USER_ROLE_HEADER).and_then(|value| value.parse::<Role>().ok());

        match (user_id, role) {
            (Some(user_id), Some(role)) => Ok(Session { user_id, role }),
            _ => Err(ServiceError::new(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid session".to_string(),
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Session::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/clients");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn reads_session_headers() {
        let parts = parts(&[(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "moderator")]);
        let session = Session::from_parts(&parts).expect("session");
        assert_eq!(session.user_id, 7);
        assert_eq!(session.role, Role::Moderator);
        assert!(session.require_mutation().is_ok());
    }

    #[test]
    fn missing_or_bad_headers_are_unauthorized() {
        for headers in [
            vec![],
            vec![(USER_ID_HEADER, "7")],
            vec![(USER_ID_HEADER, "abc"), (USER_ROLE_HEADER, "ADMIN")],
            vec![(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "owner")],
        ] {
            let err = Session::from_parts(&parts(&headers)).expect_err("rejected");
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn client_role_cannot_mutate() {
        let session = Session {
            user_id: 3,
            role: Role::Client,
        };
        let err = session.require_mutation().expect_err("forbidden");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
