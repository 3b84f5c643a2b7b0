use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full identity record as held by the credential store.
///
/// `password_hash` and `mfa_secret` never leave the server; responses carry
/// the [`PublicUser`] projection instead.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl User {
    pub fn create(name: String, email: String, password_hash: String, mfa_secret: String) -> Self {
        let now = Utc::now();

        User {
            id: nanoid::nanoid!(),
            name,
            email,
            password_hash,
            mfa_secret: Some(mfa_secret),
            mfa_enabled: false,
            created: now,
            updated: now,
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            email: self.email.clone(),
            mfa_enabled: Some(self.mfa_enabled),
        }
    }
}

/// Sanitized projection returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<bool>,
}

impl PublicUser {
    /// Recovery responses expose the email and nothing else.
    pub fn email_only(email: String) -> Self {
        PublicUser {
            id: None,
            name: None,
            email,
            mfa_enabled: None,
        }
    }
}
