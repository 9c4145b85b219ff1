// Profile-scoped blob store backed by SQLite through sea-orm

use anyhow::Context;
use entities::stored_blob;
use migration::MigratorTrait;
use sea_orm::{
    ActiveValue::Set, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    sea_query::OnConflict,
};

use super::BlobStorage;

#[derive(Clone, Debug)]
pub struct SqliteStorage {
    db: DatabaseConnection,
}

impl SqliteStorage {
    /// Connect to `connection_string` (e.g. "sqlite://kosync-profile.sqlite?mode=rwc") and run
    /// migrations.
    #[tracing::instrument(level = "debug")]
    pub async fn connect(connection_string: &str) -> anyhow::Result<Self> {
        let mut options = ConnectOptions::new(connection_string);
        // a single connection keeps `sqlite::memory:` databases coherent
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .with_context(|| "Failed to connect to profile database")?;
        Self::from_connection(db).await
    }

    pub async fn from_connection(db: DatabaseConnection) -> anyhow::Result<Self> {
        migration::Migrator::up(&db, None)
            .await
            .with_context(|| "Failed to run profile database migrations")?;
        Ok(Self { db })
    }
}

#[async_trait::async_trait]
impl BlobStorage for SqliteStorage {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = stored_blob::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await
            .with_context(|| format!("Failed to read blob {key}"))?;
        Ok(row.map(|r| r.payload))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let row = stored_blob::ActiveModel {
            name: Set(key.to_string()),
            payload: Set(value.to_string()),
            updated_at: Set(chrono::Utc::now().timestamp_millis()),
        };
        stored_blob::Entity::insert(row)
            .on_conflict(
                OnConflict::column(stored_blob::Column::Name)
                    .update_columns([stored_blob::Column::Payload, stored_blob::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .with_context(|| format!("Failed to write blob {key}"))?;
        tracing::debug!(%key, "stored blob");
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        stored_blob::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await
            .with_context(|| format!("Failed to delete blob {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_storage_upserts_and_removes() {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        assert_eq!(storage.get("userState").await.unwrap(), None);

        storage.set("userState", "first").await.unwrap();
        storage.set("userState", "second").await.unwrap();
        storage.set("other", "x").await.unwrap();
        assert_eq!(
            storage.get("userState").await.unwrap().as_deref(),
            Some("second")
        );

        storage.remove("userState").await.unwrap();
        assert_eq!(storage.get("userState").await.unwrap(), None);
        assert_eq!(storage.get("other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        storage.set("userState", "kept").await.unwrap();
        let again = SqliteStorage::from_connection(storage.db.clone())
            .await
            .unwrap();
        assert_eq!(again.get("userState").await.unwrap().as_deref(), Some("kept"));
    }
}
