use chrono::{DateTime, Utc};

/// Sentinel recorded in place of a code when a password check fails.
pub const FAILED_PASSWORD: &str = "failed_password";

/// Append-only audit record of an authentication attempt.
///
/// `created` feeds the lockout counter; `code_expires` bounds how long a
/// consumed one-time code blocks replay. The two are distinct on purpose.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub code: String,
    pub code_expires: DateTime<Utc>,
    pub validated: bool,
    pub created: Option<DateTime<Utc>>,
}

impl Attempt {
    /// Entry for a failed password check.
    pub fn failed_password(user_id: &str, window: chrono::Duration) -> Self {
        Attempt {
            id: nanoid::nanoid!(),
            user_id: user_id.to_owned(),
            code: FAILED_PASSWORD.to_owned(),
            code_expires: Utc::now() + window,
            validated: false,
            created: None,
        }
    }

    /// Entry for a rejected one-time code.
    pub fn failed_code(user_id: &str, code: &str, window: chrono::Duration) -> Self {
        Attempt {
            id: nanoid::nanoid!(),
            user_id: user_id.to_owned(),
            code: code.to_owned(),
            code_expires: Utc::now() + window,
            validated: false,
            created: None,
        }
    }
}
