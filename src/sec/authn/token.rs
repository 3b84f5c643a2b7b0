use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::user::User;

/// Whether a token represents a fully verified session or one still waiting
/// on the second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    #[serde(rename = "pending_mfa")]
    PendingMfa,

    #[serde(rename = "authenticated")]
    Authenticated,
}

impl TrustLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::PendingMfa => "pending_mfa",
            TrustLevel::Authenticated => "authenticated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub auth_status: TrustLevel,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,

    #[error("failed encoding token")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// Issues and validates the signed claim tokens carried between requests.
///
/// HS256 over a shared secret, zero clock-skew leeway. Pending tokens default
/// to a short window, authenticated ones to a long one.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    pending_ttl: chrono::Duration,
    authenticated_ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new<S>(
        secret: S,
        issuer: String,
        audience: String,
        pending_ttl: chrono::Duration,
        authenticated_ttl: chrono::Duration,
    ) -> Self
    where
        S: AsRef<[u8]>
    {
        TokenIssuer {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            issuer,
            audience,
            pending_ttl,
            authenticated_ttl,
        }
    }

    pub fn from_settings(settings: &config::Tokens) -> Self {
        Self::new(
            settings.secret.as_bytes(),
            settings.issuer.clone(),
            settings.audience.clone(),
            settings.pending_ttl,
            settings.authenticated_ttl,
        )
    }

    pub fn issue(
        &self,
        user: &User,
        trust: TrustLevel,
        ttl: Option<chrono::Duration>,
    ) -> Result<String, TokenError> {
        let ttl = ttl.unwrap_or(match trust {
            TrustLevel::PendingMfa => self.pending_ttl,
            TrustLevel::Authenticated => self.authenticated_ttl,
        });

        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            auth_status: trust,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encode)
    }

    /// Verifies signature, issuer, and audience. Expiry is only enforced when
    /// `enforce_expiry` is set; the relaxed mode lets a pending token be read
    /// for its email claim at the moment the one-time code is submitted.
    pub fn validate(&self, token: &str, enforce_expiry: bool) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = enforce_expiry;
        validation.leeway = 0;

        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid)
            }
        }
    }

    pub fn email_from(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.validate(token, false)?.email)
    }

    pub fn subject_from(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.validate(token, false)?.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            b"test-secret-key-32-bytes-long!!!",
            "mfa-api".into(),
            "mfa-api".into(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(30),
        )
    }

    fn ana() -> User {
        User::create(
            "Ana".into(),
            "ana@x.com".into(),
            "hash".into(),
            "JBSWY3DPEHPK3PXP".into()
        )
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let issuer = issuer();
        let user = ana();

        let token = issuer.issue(&user, TrustLevel::Authenticated, None).unwrap();
        let claims = issuer.validate(&token, true).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.name, "Ana");
        assert_eq!(claims.auth_status, TrustLevel::Authenticated);
        assert_eq!(claims.iss, "mfa-api");
        assert_eq!(claims.aud, "mfa-api");
    }

    #[test]
    fn trust_level_wire_values() {
        assert_eq!(
            serde_json::to_string(&TrustLevel::PendingMfa).unwrap(),
            r#""pending_mfa""#
        );
        assert_eq!(
            serde_json::to_string(&TrustLevel::Authenticated).unwrap(),
            r#""authenticated""#
        );
    }

    #[test]
    fn expired_token_still_yields_email_claim() {
        let issuer = issuer();
        let user = ana();

        let token = issuer.issue(
            &user,
            TrustLevel::PendingMfa,
            Some(chrono::Duration::minutes(-5))
        ).unwrap();

        assert!(matches!(
            issuer.validate(&token, true),
            Err(TokenError::Expired)
        ));
        assert_eq!(issuer.email_from(&token).unwrap(), "ana@x.com");
        assert_eq!(issuer.subject_from(&token).unwrap(), user.id);
    }

    #[test]
    fn wrong_audience_or_issuer_rejected_even_relaxed() {
        let user = ana();
        let other = TokenIssuer::new(
            b"test-secret-key-32-bytes-long!!!",
            "someone-else".into(),
            "someone-else".into(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(30),
        );

        let token = other.issue(&user, TrustLevel::PendingMfa, None).unwrap();

        assert!(issuer().validate(&token, false).is_err());
    }

    #[test]
    fn tampered_signature_rejected() {
        let issuer = issuer();
        let user = ana();

        let token = issuer.issue(&user, TrustLevel::Authenticated, None).unwrap();
        let tampered = format!("{token}AA");

        assert!(issuer.validate(&tampered, false).is_err());
    }

    #[test]
    fn wrong_key_rejected() {
        let user = ana();
        let other = TokenIssuer::new(
            b"a-completely-different-secret!!!",
            "mfa-api".into(),
            "mfa-api".into(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(30),
        );

        let token = other.issue(&user, TrustLevel::Authenticated, None).unwrap();

        assert!(issuer().validate(&token, true).is_err());
    }
}
