//! Caller identity supplied by the trusted gateway.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::domain::User;
use crate::error::ChallengeError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// `X-User-Id` is required; `X-User-Name` defaults to the id.
pub struct CurrentUser(pub User);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ChallengeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ChallengeError::Validation("missing X-User-Id header".into()))?;
        let name = header(parts, USER_NAME_HEADER).unwrap_or(id);
        Ok(CurrentUser(User::new(id, name)))
    }
}
