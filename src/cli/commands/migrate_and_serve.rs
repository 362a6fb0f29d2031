use anyhow::Result;
use tracing::{debug, error, info};

use super::initdb::connect_and_migrate;
use super::serve::run_server;
use crate::config::app_state_from_connection;

/// Migrates and serves over the same connection pool, so in-memory databases keep their schema.
pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    info!("Applying database migrations and starting server");
    debug!("Database URL: {}", database_url);

    let db = connect_and_migrate(database_url).await?;
    let state = match app_state_from_connection(db) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    run_server(state, bind_address).await
}
