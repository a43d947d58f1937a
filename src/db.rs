use std::sync::Arc;

use anyhow::Context;
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::store::{ClassroomStore, MemoryStore, MySqlStore};

pub async fn init_db(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// MySQL when a URL is configured, otherwise a process-local store.
pub async fn init_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn ClassroomStore>> {
    match database_url {
        Some(url) => {
            let pool = init_db(url).await?;
            info!("Using MySQL store");
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
