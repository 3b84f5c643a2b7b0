use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::Level;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed response kinds for the auth API.
///
/// Every failure the orchestrator can raise maps onto exactly one of these.
/// The unauthorized kinds share a single generic message so a caller cannot
/// distinguish an unknown account from a bad credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    AccountLocked,
    PermissionDenied,
    InvalidArgument,
    AlreadyExists,
    MfaNotConfigured,
    NotFound,
    InternalFailure,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::Unauthorized => "Unauthorized",
            ApiErrorKind::AccountLocked => "AccountLocked",
            ApiErrorKind::PermissionDenied => "PermissionDenied",
            ApiErrorKind::InvalidArgument => "InvalidArgument",
            ApiErrorKind::AlreadyExists => "AlreadyExists",
            ApiErrorKind::MfaNotConfigured => "MfaNotConfigured",
            ApiErrorKind::NotFound => "NotFound",
            ApiErrorKind::InternalFailure => "InternalFailure",
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            ApiErrorKind::Unauthorized => "invalid credentials",
            ApiErrorKind::AccountLocked => "account is temporarily locked",
            ApiErrorKind::PermissionDenied => "additional verification required",
            ApiErrorKind::InvalidArgument => "invalid request",
            ApiErrorKind::AlreadyExists => "email is already registered",
            ApiErrorKind::MfaNotConfigured => "mfa is not configured for this account",
            ApiErrorKind::NotFound => "requested resource was not found",
            ApiErrorKind::InternalFailure => "error when processing the request",
        }
    }
}

impl From<&ApiErrorKind> for StatusCode {
    fn from(kind: &ApiErrorKind) -> Self {
        match kind {
            ApiErrorKind::Unauthorized |
            ApiErrorKind::AccountLocked => StatusCode::UNAUTHORIZED,
            ApiErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ApiErrorKind::InvalidArgument |
            ApiErrorKind::MfaNotConfigured => StatusCode::BAD_REQUEST,
            ApiErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ApiErrorKind::NotFound => StatusCode::NOT_FOUND,
            ApiErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

#[derive(Debug)]
pub struct Error {
    kind: ApiErrorKind,
    msg: Option<String>,
    context: Option<String>,
    src: Option<BoxDynError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new() -> Self {
        Error {
            kind: ApiErrorKind::InternalFailure,
            msg: None,
            context: None,
            src: None,
        }
    }

    pub fn api(kind: ApiErrorKind) -> Self {
        Error {
            kind,
            msg: None,
            context: None,
            src: None,
        }
    }

    pub fn kind(mut self, kind: ApiErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Overrides the kind's fixed user-visible message.
    pub fn message<M>(mut self, msg: M) -> Self
    where
        M: Into<String>
    {
        self.msg = Some(msg.into());
        self
    }

    pub fn context<C>(mut self, ctx: C) -> Self
    where
        C: Into<String>
    {
        self.context = Some(ctx.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Self
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.context, &self.src) {
            (kind, Some(cxt), Some(err)) => write!(f, "kind: {kind}\ncxt: {cxt}\nerr: {err:?}"),
            (kind, Some(cxt), None) => write!(f, "kind: {kind}\ncxt: {cxt}"),
            (kind, None, Some(err)) => write!(f, "kind: {kind}\nerr: {err:?}"),
            (kind, None, None) => write!(f, "kind: {kind}")
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_ref().map(|v| & **v as _)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Some(err) = self.src.as_ref() {
            tracing::event!(
                Level::ERROR,
                "unhandled error when processing request: {:#?}",
                err
            );
        }

        let status = StatusCode::from(&self.kind);
        let body = ErrorBody {
            error: self.kind.as_str(),
            message: self.msg.as_deref()
                .unwrap_or_else(|| self.kind.default_message()),
        };

        (status, axum::Json(body)).into_response()
    }
}

macro_rules! simple_from {
    ($e:path) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .source(err)
            }
        }
    };
    ($e:path, $k:expr) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .kind($k)
                    .source(err)
            }
        }
    };
}

simple_from!(tokio_postgres::Error);
simple_from!(
    axum::http::header::ToStrError,
    ApiErrorKind::Unauthorized
);

impl From<crate::sec::authn::flow::AuthError> for Error {
    fn from(err: crate::sec::authn::flow::AuthError) -> Self {
        use crate::sec::authn::flow::AuthError;

        match err {
            AuthError::InvalidCredentials => Error::api(ApiErrorKind::Unauthorized),
            AuthError::Locked { minutes } => Error::api(ApiErrorKind::AccountLocked)
                .message(format!(
                    "account is temporarily locked, retry after {minutes} minutes"
                )),
            AuthError::PasswordMismatch => Error::api(ApiErrorKind::InvalidArgument)
                .message("passwords do not match"),
            AuthError::EmailTaken => Error::api(ApiErrorKind::AlreadyExists),
            AuthError::MfaNotConfigured => Error::api(ApiErrorKind::MfaNotConfigured),
            err => Error::new().source(err),
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Error::new()
            .context("failed to retrieve database connection")
            .source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_kinds_share_status() {
        assert_eq!(
            StatusCode::from(&ApiErrorKind::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StatusCode::from(&ApiErrorKind::AccountLocked),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn message_override_wins() {
        let err = Error::api(ApiErrorKind::AccountLocked)
            .message("account locked, retry after 15 minutes");

        assert_eq!(
            err.msg.as_deref(),
            Some("account locked, retry after 15 minutes")
        );
    }
}
