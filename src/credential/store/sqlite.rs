/// SQLite credential store - database layer for persisted backup credentials
use crate::{
    credential::{store::CredentialStore, store::KeyLocks, CredentialKey, Token},
    db,
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// SQLite-backed credential store
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
    locks: KeyLocks,
}

impl SqliteCredentialStore {
    /// Wrap a pool whose schema is already migrated
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: KeyLocks::new(),
        }
    }

    /// Run migrations on the pool and wrap it
    pub async fn open(pool: SqlitePool) -> VaultResult<Self> {
        db::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// When the entry for a key was last written
    pub async fn updated_at(&self, key: &CredentialKey) -> VaultResult<Option<DateTime<Utc>>> {
        let result = sqlx::query("SELECT updated_at FROM backup_credential WHERE target = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.db)
            .await?;

        match result {
            Some(row) => Ok(Some(parse_timestamp(&row.try_get::<String, _>("updated_at")?)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, key: &CredentialKey) -> VaultResult<Option<Token>> {
        let result = sqlx::query(
            r#"
            SELECT token
            FROM backup_credential
            WHERE target = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.db)
        .await?;

        match result {
            Some(row) => Ok(Some(Token::new(row.try_get::<String, _>("token")?))),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &CredentialKey, token: &Token) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO backup_credential (target, token, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(target) DO UPDATE SET
                token = excluded.token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(token.as_str())
        .bind(&now)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &CredentialKey) -> VaultResult<()> {
        let _guard = self.locks.lock(key).await;

        sqlx::query("DELETE FROM backup_credential WHERE target = ?1")
            .bind(key.as_str())
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

/// Parse RFC3339 timestamp
fn parse_timestamp(s: &str) -> VaultResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::Storage(format!("Invalid timestamp: {}", e)))
}
