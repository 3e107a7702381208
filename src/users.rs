use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Organiser,
    Admin,
}

/// Public slice of a user record. Safe to snapshot into messages and to put
/// on the wire; never carries credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeUser {
    pub id: i64,
    pub email: String,
    pub roles: Vec<Role>,
}

/// Requester identity, injected by the perimeter as an `x-user-id` header.
pub struct CurrentUser(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(CurrentUser)
            .ok_or_else(|| AppError::forbidden("missing or malformed x-user-id header"))
    }
}
