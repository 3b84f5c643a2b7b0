use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::config;
use crate::error;

pub fn from_config(config: &config::Config) -> error::Result<Pool> {
    let mut pg_config = tokio_postgres::Config::new();
    pg_config.user(&config.settings.db.user);
    pg_config.host(&config.settings.db.host);
    pg_config.port(config.settings.db.port);
    pg_config.dbname(&config.settings.db.dbname);

    if let Some(password) = &config.settings.db.password {
        pg_config.password(password);
    }

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast
        }
    );

    let pool = Pool::builder(manager)
        .max_size(16)
        .build()?;

    Ok(pool)
}
