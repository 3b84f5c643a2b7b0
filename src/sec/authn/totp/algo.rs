use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Computes an RFC 4226 HOTP code for the given counter.
///
/// HMAC-SHA1 with dynamic truncation, zero padded to `digits`.
pub fn hotp(secret: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret)
        .expect("hmac accepts keys of any length");

    mac.update(&counter.to_be_bytes());

    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(digits);

    format!("{:0width$}", code, width = digits as usize)
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
