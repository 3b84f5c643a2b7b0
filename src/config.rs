use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::{self, Context};

mod shape;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// a config path or directory to load file from
    #[arg(long)]
    config: Vec<PathBuf>
}

#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
}

pub fn get_config() -> error::Result<Config> {
    Config::from_args(CliArgs::parse())
}

impl Config {
    pub fn from_args(args: CliArgs) -> error::Result<Self> {
        let mut settings = Settings::default();

        for config_path in args.config {
            tracing::debug!("loading config file \"{}\"", config_path.display());

            let loaded = Self::load_file(&config_path)?;

            settings.merge(loaded)?;
        }

        if settings.sec.tokens.secret.is_empty() {
            return Err(error::Error::new().message(
                "sec.tokens.secret is required but no config file provided one"
            ));
        }

        tracing::debug!("loaded listeners: {:?}", settings.listeners.keys());

        Ok(Config {
            settings
        })
    }

    fn load_file(path: &PathBuf) -> error::Result<shape::Settings> {
        let ext = path.extension().context(format!(
            "failed to retrieve the file extension for config file: \"{}\"", path.display()
        ))?;

        let ext = ext.to_ascii_lowercase();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .context(format!("failed to open config file: \"{}\"", path.display()))?;
        let reader = std::io::BufReader::new(file);

        if ext.eq("yaml") || ext.eq("yml") {
            serde_yaml::from_reader(reader).context(format!(
                "failed to parse yaml config file: \"{}\"", path.display()
            ))
        } else if ext.eq("json") {
            serde_json::from_reader(reader).context(format!(
                "failed to parse json config file: \"{}\"", path.display()
            ))
        } else {
            Err(error::Error::new().message(format!(
                "unknown type of config file: \"{}\"", path.display()
            )))
        }
    }
}

#[derive(Debug)]
pub struct Listener {
    pub addr: SocketAddr,
}

#[derive(Debug)]
pub struct Settings {
    pub listeners: HashMap<String, Listener>,
    pub sec: Sec,
    pub db: Db,
}

impl Settings {
    fn merge(&mut self, settings: shape::Settings) -> error::Result<()> {
        if let Some(listeners) = settings.listeners {
            for (key, listener) in listeners {
                let addr = SocketAddr::from_str(&listener.addr).context(format!(
                    "listeners.{key}.addr is not a valid socket address: \"{}\"", listener.addr
                ))?;

                self.listeners.insert(key, Listener { addr });
            }
        }

        if let Some(sec) = settings.sec {
            self.sec.merge(sec);
        }

        if let Some(db) = settings.db {
            self.db.merge(db);
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut listeners = HashMap::new();
        listeners.insert(String::from("main"), Listener {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080))
        });

        Settings {
            listeners,
            sec: Sec::default(),
            db: Db::default(),
        }
    }
}

#[derive(Debug)]
pub struct Tokens {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub pending_ttl: chrono::Duration,
    pub authenticated_ttl: chrono::Duration,
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens {
            secret: String::new(),
            issuer: "mfa-api".into(),
            audience: "mfa-api".into(),
            pending_ttl: chrono::Duration::minutes(15),
            authenticated_ttl: chrono::Duration::days(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lockout {
    pub max_failed: i64,
    pub window: chrono::Duration,
}

impl Default for Lockout {
    fn default() -> Self {
        Lockout {
            max_failed: 5,
            window: chrono::Duration::minutes(15),
        }
    }
}

#[derive(Debug)]
pub struct Totp {
    pub issuer: String,
    pub digits: u32,
    pub step: u64,
}

impl Default for Totp {
    fn default() -> Self {
        Totp {
            issuer: "mfa-api".into(),
            digits: 6,
            step: 30,
        }
    }
}

#[derive(Debug, Default)]
pub struct Sec {
    pub tokens: Tokens,
    pub lockout: Lockout,
    pub totp: Totp,
}

impl Sec {
    fn merge(&mut self, sec: shape::Sec) {
        if let Some(tokens) = sec.tokens {
            if let Some(secret) = tokens.secret {
                self.tokens.secret = secret;
            }

            if let Some(issuer) = tokens.issuer {
                self.tokens.issuer = issuer;
            }

            if let Some(audience) = tokens.audience {
                self.tokens.audience = audience;
            }

            if let Some(minutes) = tokens.pending_ttl_minutes {
                self.tokens.pending_ttl = chrono::Duration::minutes(minutes);
            }

            if let Some(days) = tokens.authenticated_ttl_days {
                self.tokens.authenticated_ttl = chrono::Duration::days(days);
            }
        }

        if let Some(lockout) = sec.lockout {
            if let Some(max_failed) = lockout.max_failed {
                self.lockout.max_failed = max_failed;
            }

            if let Some(minutes) = lockout.window_minutes {
                self.lockout.window = chrono::Duration::minutes(minutes);
            }
        }

        if let Some(totp) = sec.totp {
            if let Some(issuer) = totp.issuer {
                self.totp.issuer = issuer;
            }

            if let Some(digits) = totp.digits {
                self.totp.digits = digits;
            }

            if let Some(step) = totp.step {
                self.totp.step = step;
            }
        }
    }
}

#[derive(Debug)]
pub struct Db {
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String
}

impl Db {
    fn merge(&mut self, db: shape::Db) {
        if let Some(user) = db.user {
            self.user = user;
        }

        if let Some(password) = db.password {
            self.password = Some(password);
        }

        if let Some(host) = db.host {
            self.host = host;
        }

        if let Some(port) = db.port {
            self.port = port;
        }

        if let Some(dbname) = db.dbname {
            self.dbname = dbname;
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Db {
            user: "postgres".into(),
            password: None,
            host: "localhost".into(),
            port: 5432,
            dbname: "mfa".into(),
        }
    }
}
