use std::sync::Arc;

use crate::config;
use crate::db;
use crate::error;
use crate::sec::authn::flow::Authenticator;
use crate::sec::authn::token::TokenIssuer;
use crate::sec::authn::totp::Totp;
use crate::store::pg::PgStore;

pub struct Shared {
    auth: Authenticator<PgStore>,
}

pub type ArcShared = Arc<Shared>;

impl Shared {
    pub fn from_config(config: &config::Config) -> error::Result<Shared> {
        tracing::debug!("creating Shared state");

        let sec = &config.settings.sec;

        Ok(Shared {
            auth: Authenticator::new(
                PgStore::new(db::from_config(config)?),
                TokenIssuer::from_settings(&sec.tokens),
                Totp::from_settings(&sec.totp),
                sec.lockout.clone(),
            ),
        })
    }

    pub fn auth(&self) -> &Authenticator<PgStore> {
        &self.auth
    }
}
