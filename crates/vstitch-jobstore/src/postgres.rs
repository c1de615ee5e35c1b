//! PostgreSQL job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use vstitch_models::{JobId, JobKind, JobRecord, JobStatus, NewJob};

use crate::config::JobStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{JobStore, StatusUpdate};

const JOB_COLUMNS: &str = "id, owner_id, kind, status, input_descriptor, output_descriptor, \
                           error_detail, attempts, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    owner_id: String,
    kind: String,
    status: String,
    input_descriptor: Option<String>,
    output_descriptor: Option<String>,
    error_detail: Option<String>,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Decode(format!("job {}: {}", row.id, e)))?;

        Ok(JobRecord {
            id: JobId::from_string(row.id),
            owner_id: row.owner_id,
            kind: row.kind,
            status,
            input_descriptor: row.input_descriptor,
            output_descriptor: row.output_descriptor,
            error_detail: row.error_detail,
            attempts: row.attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Job store backed by a PostgreSQL `jobs` table.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    pub async fn connect(config: &JobStoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to job store"
        );
        Ok(Self::new(pool))
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Job store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn to_record(row: Option<JobRow>) -> StoreResult<Option<JobRecord>> {
        row.map(JobRecord::try_from).transpose()
    }

    /// Explain why a conditional write matched no row.
    async fn rejection(&self, id: &JobId, to: JobStatus) -> StoreError {
        match self.get(id).await {
            Ok(Some(job)) => StoreError::InvalidTransition {
                id: id.clone(),
                from: job.status,
                to,
            },
            Ok(None) => StoreError::NotFound(id.clone()),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim_next(&self) -> StoreResult<Option<JobRecord>> {
        // SKIP LOCKED lets concurrent claimers pass over a row another
        // transaction is already taking.
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = 'PROCESSING', attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'QUEUED'
                ORDER BY created_at ASC, seq ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Self::to_record(row)
    }

    async fn set_status(&self, id: &JobId, update: StatusUpdate) -> StoreResult<JobRecord> {
        let expected = update.expected_current();
        let target = update.target();

        let row = match &update {
            StatusUpdate::Processing => {
                let sql = format!(
                    r#"
                    UPDATE jobs SET status = $2, updated_at = NOW()
                    WHERE id = $1 AND status = $3
                    RETURNING {JOB_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(id.as_str())
                    .bind(target.as_str())
                    .bind(expected.as_str())
                    .fetch_optional(&self.pool)
                    .await?
            }
            StatusUpdate::Completed { output } => {
                let sql = format!(
                    r#"
                    UPDATE jobs
                    SET status = $2, output_descriptor = $4, error_detail = NULL, updated_at = NOW()
                    WHERE id = $1 AND status = $3
                    RETURNING {JOB_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(id.as_str())
                    .bind(target.as_str())
                    .bind(expected.as_str())
                    .bind(output)
                    .fetch_optional(&self.pool)
                    .await?
            }
            StatusUpdate::Failed { error } => {
                let sql = format!(
                    r#"
                    UPDATE jobs
                    SET status = $2, error_detail = $4, updated_at = NOW()
                    WHERE id = $1 AND status = $3
                    RETURNING {JOB_COLUMNS}
                    "#
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(id.as_str())
                    .bind(target.as_str())
                    .bind(expected.as_str())
                    .bind(error)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match Self::to_record(row)? {
            Some(job) => Ok(job),
            None => Err(self.rejection(id, target).await),
        }
    }

    async fn requeue_all_processing(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'QUEUED', updated_at = NOW() WHERE status = 'PROCESSING'",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert(&self, job: NewJob) -> StoreResult<JobRecord> {
        let descriptor = job.descriptor()?;
        let id = JobId::new();

        let sql = format!(
            r#"
            INSERT INTO jobs (id, owner_id, kind, status, input_descriptor)
            VALUES ($1, $2, $3, 'QUEUED', $4)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_str())
            .bind(&job.owner_id)
            .bind(job.kind.as_str())
            .bind(descriptor.encode())
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Self::to_record(row)
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn update_output_text(&self, id: &JobId, text: &str) -> StoreResult<JobRecord> {
        let sql = format!(
            r#"
            UPDATE jobs SET output_descriptor = $2, updated_at = NOW()
            WHERE id = $1 AND kind = $3 AND status = 'COMPLETED'
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_str())
            .bind(text)
            .bind(JobKind::Transcribe.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match Self::to_record(row)? {
            Some(job) => Ok(job),
            None => match self.get(id).await? {
                Some(_) => Err(StoreError::conflict(format!(
                    "job {} is not a completed transcription",
                    id
                ))),
                None => Err(StoreError::NotFound(id.clone())),
            },
        }
    }

    async fn delete(&self, id: &JobId) -> StoreResult<JobRecord> {
        let sql = format!(
            "DELETE FROM jobs WHERE id = $1 AND status <> 'PROCESSING' RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match Self::to_record(row)? {
            Some(job) => Ok(job),
            None => match self.get(id).await? {
                Some(_) => Err(StoreError::conflict(format!("job {} is processing", id))),
                None => Err(StoreError::NotFound(id.clone())),
            },
        }
    }
}
