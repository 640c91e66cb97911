use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{config::PortalConfig, web::session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<PortalConfig>,
    sessions: SessionStore,
}

impl AppState {
    pub async fn new(config: PortalConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("invalid DATABASE_URL `{}`", config.database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to open SQLite database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations applied");

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to ensure upload directory at {}",
                    config.upload_dir.display()
                )
            })?;

        let sessions = SessionStore::new(pool.clone());
        Ok(Self::from_parts(pool, config, sessions))
    }

    pub fn from_parts(pool: SqlitePool, config: PortalConfig, sessions: SessionStore) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            sessions,
        }
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{config::AdminCredentials, web::data};

    pub(crate) const TEST_ADMIN_EMAIL: &str = "admin@escola.br";
    pub(crate) const TEST_ADMIN_PIN: &str = "hercul1";

    pub(crate) async fn test_state(upload_dir: PathBuf) -> AppState {
        let pool = data::tests::memory_pool().await;
        let config = PortalConfig {
            database_url: "sqlite::memory:".to_string(),
            upload_dir,
            admin: AdminCredentials::new(TEST_ADMIN_EMAIL, TEST_ADMIN_PIN),
            port: 0,
            max_upload_bytes: 1024 * 1024,
        };
        let sessions = SessionStore::new(pool.clone());
        AppState::from_parts(pool, config, sessions)
    }
}
