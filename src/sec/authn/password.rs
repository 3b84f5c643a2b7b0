use argon2::Variant;
use rand::RngCore;

pub const SALT_LEN: usize = 32;

pub type Salt = [u8; SALT_LEN];

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error(transparent)]
    Argon2(#[from] argon2::Error),
}

pub fn gen_salt() -> Result<Salt, rand::Error> {
    let mut salt = [0u8; SALT_LEN];

    rand::thread_rng().try_fill_bytes(&mut salt)?;

    Ok(salt)
}

pub fn gen_hash(password: &str, salt: &[u8]) -> Result<String, argon2::Error> {
    let mut config = argon2::Config::default();
    config.mem_cost = 19456;
    config.variant = Variant::Argon2id;

    argon2::hash_encoded(
        password.as_bytes(),
        salt,
        &config
    )
}

/// Hashes a password with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = gen_salt()?;

    Ok(gen_hash(password, &salt)?)
}

pub fn verify<C>(hash: &str, check: C) -> Result<bool, argon2::Error>
where
    C: AsRef<[u8]>
{
    argon2::verify_encoded_ext(hash, check.as_ref(), &[], &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("Secret1A").unwrap();

        assert!(verify(&hash, "Secret1A").unwrap());
        assert!(!verify(&hash, "Secret1B").unwrap());
    }

    #[test]
    fn fresh_salt_per_hash() {
        let first = hash_password("Secret1A").unwrap();
        let second = hash_password("Secret1A").unwrap();

        assert_ne!(first, second);
    }
}
