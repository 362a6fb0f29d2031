use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use tracing::{debug, error, info, trace};

/// For file-backed SQLite URLs, creates the parent directory and asks SQLite to
/// create the file. Other URLs are returned unchanged.
pub fn prepare_sqlite_url(database_url: &str) -> Result<String> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(database_url.to_string());
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(database_url.to_string());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            debug!("Creating database directory {}", parent.display());
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    Ok(match query {
        Some(query) if query.contains("mode=") => database_url.to_string(),
        Some(query) => format!("sqlite://{}?{}&mode=rwc", path, query),
        None => format!("sqlite://{}?mode=rwc", path),
    })
}

/// Connects to the database and applies every pending migration.
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection> {
    let database_url = prepare_sqlite_url(database_url)?;

    trace!("Attempting to connect to database");
    let db = match Database::connect(&database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }
    info!("Database migrations completed successfully");

    Ok(db)
}

pub async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    connect_and_migrate(database_url).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_sqlite_url_adds_create_mode() {
        let dir = std::env::temp_dir().join("pennywise_prepare_url");
        let path = dir.join("db.sqlite");
        let url = format!("sqlite://{}", path.display());

        let prepared = prepare_sqlite_url(&url).unwrap();
        assert_eq!(prepared, format!("{}?mode=rwc", url));
        assert!(dir.exists());
    }

    #[test]
    fn test_prepare_sqlite_url_leaves_other_urls() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:").unwrap(), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgresql://u:p@localhost/db").unwrap(),
            "postgresql://u:p@localhost/db"
        );
        assert_eq!(
            prepare_sqlite_url("sqlite://data.db?mode=ro").unwrap(),
            "sqlite://data.db?mode=ro"
        );
    }

    #[tokio::test]
    async fn test_init_database_in_memory() {
        init_database("sqlite::memory:").await.unwrap();
    }
}
