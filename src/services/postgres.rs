use crate::config::DatabaseSettings;
use crate::models::{PreferenceRecord, QueueEntry};
use crate::services::ports::{
    ContactDirectory, GroupRecord, GroupRepository, HealthProbe, PreferenceQueue, ServiceError,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostgresError {
    /// Connection-level failures that a later attempt may not hit
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PostgresError::SqlxError(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Protocol(_)
            )
        )
    }
}

/// PostgreSQL client for the preference queue, formed groups and user contacts
///
/// Reads pending match preferences joined with the user's profile, writes each
/// formed group together with its membership rows, and removes matched users
/// from the queue.
pub struct PostgresClient {
    pool: PgPool,
}

const QUEUE_QUERY: &str = r#"
    SELECT
        mp.user_id,
        u.gender,
        COALESCE(u.is_trusted, FALSE) AS is_trusted,
        mp.same_gender AS same_gender_only,
        COALESCE(EXTRACT(YEAR FROM age(u.dob))::int4, 0) AS age,
        mp.min_age,
        mp.max_age,
        u.city,
        mp.is_host,
        mp.min_group_size,
        mp.max_group_size,
        mp.interests
    FROM match_preference mp
    JOIN users u ON u.id = mp.user_id
    ORDER BY mp.created_at, mp.user_id
"#;

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        run_migrations: bool,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");
        }

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
            settings.run_migrations,
        )
        .await
    }

    /// Fetch every pending queue entry, oldest first.
    ///
    /// Rows that fail validation are skipped with a warning rather than
    /// failing the whole snapshot.
    pub async fn fetch_queue(&self) -> Result<Vec<PreferenceRecord>, PostgresError> {
        let rows = sqlx::query(QUEUE_QUERY).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = queue_entry_from_row(row)?;
            if let Err(errors) = entry.validate() {
                tracing::warn!("Skipping invalid queue entry for {}: {}", entry.user_id, errors);
                continue;
            }
            records.push(PreferenceRecord::from(entry));
        }

        tracing::debug!("Fetched {} queue entries ({} rows)", records.len(), rows.len());

        Ok(records)
    }

    /// Remove matched users from the queue
    pub async fn remove_from_queue(&self, user_ids: &[String]) -> Result<u64, PostgresError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let query = r#"
            DELETE FROM match_preference
            WHERE user_id = ANY($1)
        "#;

        let result = sqlx::query(query).bind(user_ids).execute(&self.pool).await?;

        tracing::debug!("Removed {} users from the match queue", result.rows_affected());

        Ok(result.rows_affected())
    }

    /// Write a group and its membership rows in one transaction.
    ///
    /// Inserts ignore conflicts so a retried write of the same group id is harmless.
    pub async fn insert_group(&self, record: &GroupRecord<'_>) -> Result<(), PostgresError> {
        let profile = record.group.profile();
        let interests: Vec<String> = profile.interests.iter().cloned().collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO groups (id, name, city, interests, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.group_id)
        .bind(record.name)
        .bind(&profile.city)
        .bind(&interests)
        .execute(&mut *tx)
        .await?;

        for member in record.group.members() {
            sqlx::query(
                r#"
                INSERT INTO user_group (user_id, group_id, is_host)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, group_id) DO NOTHING
                "#,
            )
            .bind(&member.user_id)
            .bind(record.group_id)
            .bind(member.is_host)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Persisted group {} with {} members",
            record.group_id,
            record.group.len()
        );

        Ok(())
    }

    /// Look up a user's e-mail address
    pub async fn get_email(&self, user_id: &str) -> Result<Option<String>, PostgresError> {
        let row = sqlx::query("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("email")?),
            None => Err(PostgresError::NotFound(format!("User {} not found", user_id))),
        }
    }

    /// Number of users currently waiting
    pub async fn queue_length(&self) -> Result<i64, PostgresError> {
        let row = sqlx::query("SELECT COUNT(*) AS waiting FROM match_preference")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("waiting")?)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn queue_entry_from_row(row: &PgRow) -> Result<QueueEntry, sqlx::Error> {
    Ok(QueueEntry {
        user_id: row.try_get("user_id")?,
        gender: row.try_get("gender")?,
        is_trusted: row.try_get("is_trusted")?,
        same_gender_only: row.try_get("same_gender_only")?,
        age: row.try_get("age")?,
        min_age: row.try_get("min_age")?,
        max_age: row.try_get("max_age")?,
        city: row.try_get("city")?,
        is_host: row.try_get("is_host")?,
        min_group_size: row.try_get("min_group_size")?,
        max_group_size: row.try_get("max_group_size")?,
        interests: row.try_get("interests")?,
    })
}

#[async_trait]
impl PreferenceQueue for PostgresClient {
    async fn snapshot(&self) -> Result<Vec<PreferenceRecord>, ServiceError> {
        Ok(self.fetch_queue().await?)
    }

    async fn remove(&self, user_ids: &[String]) -> Result<u64, ServiceError> {
        Ok(self.remove_from_queue(user_ids).await?)
    }
}

#[async_trait]
impl GroupRepository for PostgresClient {
    async fn persist_group(&self, record: &GroupRecord<'_>) -> Result<(), ServiceError> {
        Ok(self.insert_group(record).await?)
    }
}

#[async_trait]
impl ContactDirectory for PostgresClient {
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, ServiceError> {
        match self.get_email(user_id).await {
            Ok(email) => Ok(email.filter(|e| !e.trim().is_empty())),
            Err(PostgresError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HealthProbe for PostgresClient {
    async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}
