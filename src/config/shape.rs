use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Db {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Totp {
    pub issuer: Option<String>,
    pub digits: Option<u32>,
    pub step: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Tokens {
    pub secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub pending_ttl_minutes: Option<i64>,
    pub authenticated_ttl_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Lockout {
    pub max_failed: Option<i64>,
    pub window_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Sec {
    pub tokens: Option<Tokens>,
    pub lockout: Option<Lockout>,
    pub totp: Option<Totp>,
}

#[derive(Debug, Deserialize)]
pub struct Listener {
    pub addr: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub listeners: Option<HashMap<String, Listener>>,

    pub sec: Option<Sec>,
    pub db: Option<Db>,
}
