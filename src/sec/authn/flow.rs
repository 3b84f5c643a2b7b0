use chrono::Utc;
use serde::Serialize;

use crate::config;
use crate::store::{CredentialStore, StoreError};
use crate::user::{PublicUser, User};

use super::attempt::Attempt;
use super::password::{self, PasswordError};
use super::token::{TokenError, TokenIssuer, TrustLevel};
use super::totp::{self, Totp};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown account, bad password, bad code, and bad token all collapse
    /// into this so a caller cannot probe which one it was.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is temporarily locked after repeated failed attempts, retry after {minutes} minutes")]
    Locked { minutes: i64 },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("email is already registered")]
    EmailTaken,

    #[error("mfa is not configured for this account")]
    MfaNotConfigured,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Hash(#[from] argon2::Error),

    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error("failed issuing token")]
    Token(#[source] TokenError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            err => AuthError::Store(err),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Rand(e) => AuthError::Rand(e),
            PasswordError::Argon2(e) => AuthError::Hash(e),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub requires_mfa: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_uri: Option<String>,

    pub message: String,
}

/// The verification state machine.
///
/// Drives a principal from unauthenticated through `pending_mfa` to
/// `authenticated` over the credential store, the one-time-code engine, and
/// the token issuer. Stateless per request; lockout is derived from the
/// attempt ledger on every call rather than stored on the user.
pub struct Authenticator<S> {
    store: S,
    tokens: TokenIssuer,
    totp: Totp,
    lockout: config::Lockout,
}

impl<S> Authenticator<S>
where
    S: CredentialStore
{
    pub fn new(store: S, tokens: TokenIssuer, totp: Totp, lockout: config::Lockout) -> Self {
        Authenticator {
            store,
            tokens,
            totp,
            lockout,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            tracing::warn!(email, "login attempt for unknown email");

            return Err(AuthError::InvalidCredentials);
        };

        self.check_lockout(&user.id).await?;

        if !password::verify(&user.password_hash, password)? {
            tracing::warn!(email, "invalid password");

            self.store.append_attempt(
                Attempt::failed_password(&user.id, self.lockout.window)
            ).await?;

            return Err(AuthError::InvalidCredentials);
        }

        if user.mfa_enabled {
            let token = self.tokens.issue(&user, TrustLevel::PendingMfa, None)
                .map_err(AuthError::Token)?;

            return Ok(AuthResponse {
                token: Some(token),
                requires_mfa: true,
                user: None,
                provisioning_uri: None,
                message: "additional verification required".into(),
            });
        }

        let token = self.tokens.issue(&user, TrustLevel::Authenticated, None)
            .map_err(AuthError::Token)?;

        Ok(AuthResponse {
            token: Some(token),
            requires_mfa: false,
            user: Some(user.public()),
            provisioning_uri: None,
            message: "login successful".into(),
        })
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<AuthResponse, AuthError> {
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        if self.store.user_exists(email).await? {
            return Err(AuthError::EmailTaken);
        }

        let hash = password::hash_password(password)?;
        let secret = totp::encode_secret(&totp::create_secret()?);

        let user = self.store.insert_user(User::create(
            name.to_owned(),
            email.to_owned(),
            hash,
            secret.clone(),
        )).await?;

        tracing::info!(email, "registered new user");

        let token = self.tokens.issue(&user, TrustLevel::PendingMfa, None)
            .map_err(AuthError::Token)?;

        Ok(AuthResponse {
            token: Some(token),
            requires_mfa: true,
            user: None,
            provisioning_uri: Some(self.totp.provisioning_uri(&secret, &user.email)),
            message: "user registered, configure mfa to continue".into(),
        })
    }

    pub async fn verify_otp(
        &self,
        token: &str,
        email: &str,
        code: &str,
    ) -> Result<AuthResponse, AuthError> {
        let mut user = self.user_from_token(token, email).await?;

        let Some(secret) = user.mfa_secret.clone() else {
            return Err(AuthError::MfaNotConfigured);
        };

        self.check_lockout(&user.id).await?;

        self.consume_code(&user, &secret, code).await?;

        // first successful validation completes enrollment
        if !user.mfa_enabled {
            user.mfa_enabled = true;

            self.store.replace_user(&mut user).await?;
        }

        let token = self.tokens.issue(&user, TrustLevel::Authenticated, None)
            .map_err(AuthError::Token)?;

        tracing::info!(email, "second factor verified");

        Ok(AuthResponse {
            token: Some(token),
            requires_mfa: false,
            user: Some(user.public()),
            provisioning_uri: None,
            message: "authentication successful".into(),
        })
    }

    /// Ensures the user has a secret and re-issues the provisioning data.
    /// Safe to call repeatedly; an existing secret is never replaced here.
    pub async fn setup_mfa(&self, email: &str) -> Result<AuthResponse, AuthError> {
        let Some(mut user) = self.store.find_user_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret = match &user.mfa_secret {
            Some(secret) => secret.clone(),
            None => {
                let secret = totp::encode_secret(&totp::create_secret()?);

                user.mfa_secret = Some(secret.clone());

                self.store.replace_user(&mut user).await?;

                secret
            }
        };

        let token = self.tokens.issue(&user, TrustLevel::PendingMfa, None)
            .map_err(AuthError::Token)?;

        Ok(AuthResponse {
            token: Some(token),
            requires_mfa: true,
            user: None,
            provisioning_uri: Some(self.totp.provisioning_uri(&secret, &user.email)),
            message: "configure mfa with the provisioning data".into(),
        })
    }

    /// Starts the recovery path by rotating the second-factor secret.
    ///
    /// Both fields probe the email key; the old secret stops validating the
    /// moment the new one is stored.
    pub async fn recover_password(
        &self,
        name: &str,
        additional_info: &str,
    ) -> Result<AuthResponse, AuthError> {
        let found = match self.store.find_user_by_email(name).await? {
            Some(user) => Some(user),
            None => self.store.find_user_by_email(additional_info).await?,
        };

        let Some(mut user) = found else {
            tracing::warn!("password recovery attempt matched no account");

            return Err(AuthError::InvalidCredentials);
        };

        let secret = totp::encode_secret(&totp::create_secret()?);

        user.mfa_secret = Some(secret.clone());

        self.store.replace_user(&mut user).await?;

        tracing::info!(email = user.email.as_str(), "rotated mfa secret for recovery");

        let token = self.tokens.issue(&user, TrustLevel::PendingMfa, None)
            .map_err(AuthError::Token)?;
        let uri = self.totp.provisioning_uri(&secret, &user.email);

        Ok(AuthResponse {
            token: Some(token),
            requires_mfa: true,
            user: Some(PublicUser::email_only(user.email)),
            provisioning_uri: Some(uri),
            message: "configure the new mfa secret to reset the password".into(),
        })
    }

    pub async fn reset_password(
        &self,
        token: &str,
        email: &str,
        code: &str,
        new_password: &str,
        confirm_new_password: &str,
    ) -> Result<AuthResponse, AuthError> {
        if new_password != confirm_new_password {
            return Err(AuthError::PasswordMismatch);
        }

        let mut user = self.user_from_token(token, email).await?;

        let Some(secret) = user.mfa_secret.clone() else {
            return Err(AuthError::MfaNotConfigured);
        };

        self.check_lockout(&user.id).await?;

        self.consume_code(&user, &secret, code).await?;

        user.password_hash = password::hash_password(new_password)?;

        self.store.replace_user(&mut user).await?;

        tracing::info!(email, "password reset");

        Ok(AuthResponse {
            token: None,
            requires_mfa: false,
            user: None,
            provisioning_uri: None,
            message: "password reset successful, log in with the new password".into(),
        })
    }

    /// Public projection of the account a verified session belongs to.
    pub async fn profile(&self, user_id: &str) -> Result<PublicUser, AuthError> {
        let Some(user) = self.store.find_user_by_id(user_id).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        Ok(user.public())
    }

    /// Recovers the account a token speaks for.
    ///
    /// Signature, issuer, and audience must verify but expiry is not
    /// enforced: a pending token at the very end of its window is still good
    /// enough to name the account being verified.
    async fn user_from_token(&self, token: &str, email: &str) -> Result<User, AuthError> {
        let claims = self.tokens.validate(token, false)
            .map_err(|_| AuthError::InvalidCredentials)?;

        if claims.email != email {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        Ok(user)
    }

    async fn check_lockout(&self, user_id: &str) -> Result<(), AuthError> {
        let cutoff = Utc::now() - self.lockout.window;
        let failed = self.store.count_failed_since(user_id, cutoff).await?;

        if failed >= self.lockout.max_failed {
            tracing::warn!(user_id, failed, "account locked after repeated failures");

            return Err(AuthError::Locked {
                minutes: self.lockout.window.num_minutes()
            });
        }

        Ok(())
    }

    /// Validates a submitted code and claims it so it cannot be replayed.
    /// Exactly one concurrent submission of the same code can succeed.
    async fn consume_code(&self, user: &User, secret: &str, code: &str) -> Result<(), AuthError> {
        if self.store.find_code_use(&user.id, code, Utc::now()).await?.is_some() {
            tracing::warn!(user_id = user.id.as_str(), "replayed one-time code");

            self.store.append_attempt(
                Attempt::failed_code(&user.id, code, self.lockout.window)
            ).await?;

            return Err(AuthError::InvalidCredentials);
        }

        if !self.totp.verify(secret, code) {
            tracing::warn!(user_id = user.id.as_str(), "invalid one-time code");

            self.store.append_attempt(
                Attempt::failed_code(&user.id, code, self.lockout.window)
            ).await?;

            return Err(AuthError::InvalidCredentials);
        }

        let replay_bound = Utc::now()
            + chrono::Duration::seconds((self.totp.step() * 3) as i64);

        if !self.store.claim_code(&user.id, code, replay_bound).await? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(())
    }
}
