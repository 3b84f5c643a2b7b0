use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::net::error::{self, ApiErrorKind};
use crate::state::ArcShared;

use super::token::{Claims, TokenError, TrustLevel};

fn bearer_token(parts: &Parts) -> Result<&str, error::Error> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Err(error::Error::api(ApiErrorKind::Unauthorized)
            .message("authorization not provided"));
    };

    let Some(token) = value.to_str()?.strip_prefix("Bearer ") else {
        return Err(error::Error::api(ApiErrorKind::Unauthorized)
            .message("unsupported authorization scheme"));
    };

    Ok(token.trim())
}

fn token_rejection(err: TokenError) -> error::Error {
    match err {
        TokenError::Expired => error::Error::api(ApiErrorKind::Unauthorized)
            .message("token has expired"),
        err => error::Error::api(ApiErrorKind::Unauthorized)
            .source(err),
    }
}

/// The fully verified caller behind a request.
///
/// Extraction demands a live `authenticated` token; a pending one is refused
/// outright so handlers never need to re-check the trust level themselves.
pub struct Initiator {
    claims: Claims,
}

impl Initiator {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }
}

#[async_trait]
impl FromRequestParts<ArcShared> for Initiator {
    type Rejection = error::Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ArcShared,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.auth().tokens()
            .validate(token, true)
            .map_err(token_rejection)?;

        if claims.auth_status == TrustLevel::PendingMfa {
            return Err(error::Error::api(ApiErrorKind::PermissionDenied)
                .message("second factor verification is required"));
        }

        Ok(Initiator { claims })
    }
}

/// A caller still inside the enrollment or verification window.
///
/// Accepts both trust levels so the setup endpoints can be reached with
/// nothing more than the pending token handed out at registration.
pub struct EnrollmentInitiator {
    claims: Claims,
}

impl EnrollmentInitiator {
    pub fn email(&self) -> &str {
        &self.claims.email
    }
}

#[async_trait]
impl FromRequestParts<ArcShared> for EnrollmentInitiator {
    type Rejection = error::Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ArcShared,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.auth().tokens()
            .validate(token, true)
            .map_err(token_rejection)?;

        Ok(EnrollmentInitiator { claims })
    }
}
