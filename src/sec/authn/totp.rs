use data_encoding::BASE32_NOPAD;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::RngCore;

use crate::config;

pub mod algo;

pub const SECRET_LEN: usize = 20;

// everything except RFC 3986 unreserved characters
const URI_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn create_secret() -> Result<[u8; SECRET_LEN], rand::Error> {
    let mut bytes = [0u8; SECRET_LEN];

    rand::thread_rng().try_fill_bytes(&mut bytes)?;

    Ok(bytes)
}

pub fn encode_secret(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

fn decode_secret(encoded: &str) -> Option<Vec<u8>> {
    let normalized = encoded.trim()
        .trim_end_matches('=')
        .to_ascii_uppercase();

    if normalized.is_empty() {
        return None;
    }

    BASE32_NOPAD.decode(normalized.as_bytes()).ok()
}

/// Time-based one-time-code engine.
///
/// Fixed 30 second steps with a ±1 step acceptance window unless configured
/// otherwise. Verification never errors; anything malformed is just an
/// invalid code.
#[derive(Debug, Clone)]
pub struct Totp {
    issuer: String,
    digits: u32,
    step: u64,
}

impl Totp {
    pub fn new<I>(issuer: I, digits: u32, step: u64) -> Self
    where
        I: Into<String>
    {
        Totp {
            issuer: issuer.into(),
            digits,
            step,
        }
    }

    pub fn from_settings(settings: &config::Totp) -> Self {
        Totp {
            issuer: settings.issuer.clone(),
            digits: settings.digits,
            step: settings.step,
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Enrollment URI consumed by authenticator apps.
    ///
    /// `otpauth://totp/{issuer}:{email}?secret={secret}&issuer={issuer}`
    /// with issuer and email percent-encoded.
    pub fn provisioning_uri(&self, secret: &str, email: &str) -> String {
        let issuer = utf8_percent_encode(&self.issuer, URI_ESCAPE);
        let email = utf8_percent_encode(email, URI_ESCAPE);

        format!("otpauth://totp/{issuer}:{email}?secret={secret}&issuer={issuer}")
    }

    pub fn verify(&self, secret: &str, code: &str) -> bool {
        self.verify_at(secret, code, unix_now())
    }

    pub fn verify_at(&self, secret: &str, code: &str, now: u64) -> bool {
        let code = code.trim();

        if code.len() != self.digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let Some(key) = decode_secret(secret) else {
            return false;
        };

        let current = now / self.step;

        for counter in current.saturating_sub(1)..=current.saturating_add(1) {
            let expected = algo::hotp(&key, counter, self.digits);

            if algo::constant_time_eq(code.as_bytes(), expected.as_bytes()) {
                return true;
            }
        }

        false
    }

    /// Computes the code for a timestamp. Test helper, not part of the
    /// validation surface.
    #[cfg(test)]
    pub fn generate_at(&self, secret: &str, at: u64) -> Option<String> {
        let key = decode_secret(secret)?;

        Some(algo::hotp(&key, at / self.step, self.digits))
    }

    #[cfg(test)]
    pub fn generate(&self, secret: &str) -> Option<String> {
        self.generate_at(secret, unix_now())
    }
}

fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Totp {
        Totp::new("mfa-api", 6, 30)
    }

    #[test]
    fn secret_is_base32_of_twenty_bytes() {
        let secret = create_secret().unwrap();
        let encoded = encode_secret(&secret);

        assert_eq!(secret.len(), SECRET_LEN);
        assert_eq!(decode_secret(&encoded).unwrap(), secret.to_vec());
    }

    #[test]
    fn accepts_within_one_step_of_skew() {
        let totp = engine();
        let secret = encode_secret(&create_secret().unwrap());
        let at = 1_700_000_015;

        let code = totp.generate_at(&secret, at).unwrap();

        assert!(totp.verify_at(&secret, &code, at));
        assert!(totp.verify_at(&secret, &code, at - 30));
        assert!(totp.verify_at(&secret, &code, at + 30));
    }

    #[test]
    fn rejects_outside_the_window() {
        let totp = engine();
        let secret = encode_secret(&create_secret().unwrap());
        // step-aligned so the window edges are exact
        let at = 1_700_000_010 - (1_700_000_010 % 30);

        let code = totp.generate_at(&secret, at).unwrap();

        assert!(!totp.verify_at(&secret, &code, at + 60));
        assert!(!totp.verify_at(&secret, &code, at.saturating_sub(60)));
    }

    #[test]
    fn provisioning_uri_is_bit_exact() {
        let totp = Totp::new("MFA Api", 6, 30);

        let uri = totp.provisioning_uri("JBSWY3DPEHPK3PXP", "ana+test@x.com");

        assert_eq!(
            uri,
            "otpauth://totp/MFA%20Api:ana%2Btest%40x.com\
             ?secret=JBSWY3DPEHPK3PXP&issuer=MFA%20Api"
        );
    }

    #[test]
    fn malformed_input_fails_closed() {
        let totp = engine();
        let secret = encode_secret(&create_secret().unwrap());

        assert!(!totp.verify("not base32!!", "123456"));
        assert!(!totp.verify("", "123456"));
        assert!(!totp.verify(&secret, "12345"));
        assert!(!totp.verify(&secret, "12345a"));
        assert!(!totp.verify(&secret, ""));
    }

    #[test]
    fn lowercase_and_padded_secrets_decode() {
        let secret = encode_secret(&create_secret().unwrap());
        let padded = format!("{}====", secret.to_ascii_lowercase());
        let at = 1_700_000_015;

        let totp = engine();
        let code = totp.generate_at(&secret, at).unwrap();

        assert!(totp.verify_at(&padded, &code, at));
    }
}
