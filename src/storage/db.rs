use std::path::Path;
use std::time::Duration;

use log::info;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};

use crate::constants::IN_MEMORY_DATABASE;
use crate::entities::task;
use crate::error::Result;

const KEEP_CONNECTION: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Local storage manager for the per-user task cache
pub struct LocalStorage {
    pub conn: DatabaseConnection,
}

impl LocalStorage {
    /// Open the SQLite cache at `path`, or an in-memory database when `path`
    /// is `None` or `:memory:`. The schema is created when missing.
    pub async fn new(path: Option<&Path>) -> Result<Self> {
        let (database_url, label) = match path {
            Some(path) if path.as_os_str() != IN_MEMORY_DATABASE => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| sea_orm::DbErr::Custom(format!("cannot create {}: {e}", parent.display())))?;
                    }
                }
                (format!("sqlite://{}?mode=rwc", path.display()), path.display().to_string())
            }
            _ => ("sqlite::memory:".to_string(), IN_MEMORY_DATABASE.to_string()),
        };

        // A single long-lived connection: an in-memory database lives and dies with it.
        let mut options = ConnectOptions::new(database_url);
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(KEEP_CONNECTION)
            .max_lifetime(KEEP_CONNECTION)
            .sqlx_logging(false);

        let conn = Database::connect(options).await?;
        let storage = LocalStorage { conn };
        storage.init_schema().await?;

        info!("💾 Opened task cache at {label}");
        Ok(storage)
    }

    /// Create the tasks table and its indexes if they do not exist yet
    async fn init_schema(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(task::Entity);
        table.if_not_exists();
        self.conn.execute(backend.build(&table)).await?;

        for mut index in schema.create_index_from_entity(task::Entity) {
            index.if_not_exists();
            self.conn.execute(backend.build(&index)).await?;
        }

        Ok(())
    }

    /// Check if the cache holds any task
    pub async fn has_data(&self) -> Result<bool> {
        use sea_orm::{EntityTrait, PaginatorTrait};
        Ok(task::Entity::find().count(&self.conn).await? > 0)
    }
}
