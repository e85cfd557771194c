//! Entity store: durable, idempotent persistence for the five mirror
//! entity kinds.
//!
//! Writes are insert-if-absent: before every insert the store probes for an
//! existing record using all populated fields of the candidate as an
//! equality filter, so re-running a sync never duplicates rows. Lock
//! contention from concurrent writers is retried with bounded exponential
//! backoff; every other storage failure aborts the enclosing transaction.

use crate::error::StoreError;
use crate::models::Project;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite};
use std::time::{Duration, Instant};

/// Type alias for the SQLite connection pool.
pub use crate::db::pool::DbPool;

/// A scoped unit of work against the store.
pub type StoreTx = sqlx::Transaction<'static, Sqlite>;

/// A value bound into a dynamically built query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A stored entity kind.
///
/// `COLUMNS` and [`Entity::values`] describe the insert shape (local `id`
/// and `created_at` are always database-assigned). [`Entity::probe_filter`]
/// returns only the populated fields — non-zero integers, non-empty
/// strings, `Some` optionals — which form the duplicate-detection filter.
pub trait Entity:
    for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Sync + Unpin
{
    /// Table name.
    const TABLE: &'static str;

    /// Human-readable kind used in error context.
    const KIND: &'static str;

    /// Insert column list, aligned with [`Entity::values`].
    const COLUMNS: &'static [&'static str];

    /// Values for one insert row, aligned with `COLUMNS`.
    fn values(&self) -> Vec<SqlValue>;

    /// Populated fields only, used as the existence-probe filter.
    fn probe_filter(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Equality filter for point and ranged queries.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pairs: Vec<(&'static str, SqlValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `column = value` condition.
    pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.pairs.push((column, value.into()));
        self
    }

    fn pairs(&self) -> &[(&'static str, SqlValue)] {
        &self.pairs
    }
}

/// Whether a write runs standalone or inside a caller-owned transaction.
///
/// Call sites state their atomicity expectation in the type instead of
/// passing an optional transaction handle.
pub enum WriteScope<'t> {
    /// The write is its own atomic unit against the live connection.
    Standalone,
    /// The write joins the given transaction; nothing is visible until the
    /// caller commits it.
    Within(&'t mut StoreTx),
}

/// Backoff schedule for lock-contention retries.
///
/// Pure so the schedule is testable without provoking SQLITE_BUSY: delays
/// start at `base` and double per attempt, capped at `cap`, until `budget`
/// of total elapsed time is spent.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub budget: Duration,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(45),
            base: Duration::from_millis(50),
            cap: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Append `WHERE c1 = ? AND c2 = ?` for the given pairs.
fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, pairs: &[(&'static str, SqlValue)]) {
    for (i, (column, value)) in pairs.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(*column);
        match value {
            SqlValue::Int(v) => {
                qb.push(" = ");
                qb.push_bind(*v);
            }
            SqlValue::Text(s) => {
                qb.push(" = ");
                qb.push_bind(s.clone());
            }
            SqlValue::Null => {
                qb.push(" IS NULL");
            }
        }
    }
}

/// Entity store over the local SQLite mirror.
#[derive(Clone)]
pub struct EntityStore {
    pool: DbPool,
    retry: RetryPolicy,
}

impl EntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the lock-retry schedule.
    pub fn with_retry(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Start a scoped unit of work. Dropping the handle without
    /// [`EntityStore::commit`] rolls every write in it back.
    pub async fn begin(&self) -> Result<StoreTx, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::classify("transaction", "begin", e))
    }

    /// Commit a unit of work.
    pub async fn commit(&self, tx: StoreTx) -> Result<(), StoreError> {
        tx.commit()
            .await
            .map_err(|e| StoreError::classify("transaction", "commit", e))
    }

    /// Insert `record` unless an equal record already exists.
    ///
    /// Returns `true` if a row was written, `false` if an existing match
    /// made the call a no-op. Lock contention is retried under the
    /// configured backoff budget; once the budget is spent it escalates to
    /// a fatal storage error carrying the entity/operation context.
    pub async fn save<E: Entity>(
        &self,
        record: &E,
        scope: &mut WriteScope<'_>,
    ) -> Result<bool, StoreError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match self.try_save(record, scope).await {
                Err(StoreError::Locked) => {
                    if started.elapsed() >= self.retry.budget {
                        return Err(Self::lock_budget_exhausted(E::KIND, "save"));
                    }
                    let delay = self.retry.delay(attempt);
                    log::debug!(
                        "{} save hit a locked database, retrying in {:?}",
                        E::KIND,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn lock_budget_exhausted(entity: &'static str, operation: &'static str) -> StoreError {
        StoreError::Storage {
            entity,
            operation,
            message: "lock retry budget exhausted".to_string(),
        }
    }

    async fn try_save<E: Entity>(
        &self,
        record: &E,
        scope: &mut WriteScope<'_>,
    ) -> Result<bool, StoreError> {
        if self.exists(record, scope).await? {
            return Ok(false);
        }

        let mut qb = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            E::TABLE,
            E::COLUMNS.join(", ")
        ));
        qb.push_values(std::iter::once(record), |mut row, rec| {
            for value in rec.values() {
                match value {
                    SqlValue::Int(v) => {
                        row.push_bind(v);
                    }
                    SqlValue::Text(s) => {
                        row.push_bind(s);
                    }
                    SqlValue::Null => {
                        row.push_bind(None::<String>);
                    }
                }
            }
        });

        let query = qb.build();
        match scope {
            WriteScope::Standalone => query.execute(&self.pool).await,
            WriteScope::Within(tx) => query.execute(&mut ***tx).await,
        }
        .map_err(|e| StoreError::classify(E::KIND, "save", e))?;

        Ok(true)
    }

    /// Insert every record in `records` that does not already exist, as a
    /// single multi-row insert. Returns the number of rows written; a batch
    /// with nothing new is a successful no-op. Lock contention anywhere in
    /// the probe or insert pass is retried like [`EntityStore::save`].
    pub async fn batch_create<E: Entity>(
        &self,
        records: &[E],
        scope: &mut WriteScope<'_>,
    ) -> Result<usize, StoreError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match self.try_batch_create(records, scope).await {
                Err(StoreError::Locked) => {
                    if started.elapsed() >= self.retry.budget {
                        return Err(Self::lock_budget_exhausted(E::KIND, "batch_create"));
                    }
                    let delay = self.retry.delay(attempt);
                    log::debug!(
                        "{} batch insert hit a locked database, retrying in {:?}",
                        E::KIND,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_batch_create<E: Entity>(
        &self,
        records: &[E],
        scope: &mut WriteScope<'_>,
    ) -> Result<usize, StoreError> {
        let mut fresh: Vec<&E> = Vec::with_capacity(records.len());
        let mut seen: Vec<Vec<(&'static str, SqlValue)>> = Vec::new();
        for record in records {
            if self.exists(record, scope).await? {
                continue;
            }
            // Equal records within one batch probe identically against the
            // store, so only the first may insert
            let filter = record.probe_filter();
            if seen.contains(&filter) {
                continue;
            }
            seen.push(filter);
            fresh.push(record);
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        self.insert_rows(&fresh, scope).await?;
        Ok(fresh.len())
    }

    async fn insert_rows<E: Entity>(
        &self,
        rows: &[&E],
        scope: &mut WriteScope<'_>,
    ) -> Result<(), StoreError> {
        let mut qb = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            E::TABLE,
            E::COLUMNS.join(", ")
        ));
        qb.push_values(rows.iter(), |mut row, rec| {
            for value in rec.values() {
                match value {
                    SqlValue::Int(v) => {
                        row.push_bind(v);
                    }
                    SqlValue::Text(s) => {
                        row.push_bind(s);
                    }
                    SqlValue::Null => {
                        row.push_bind(None::<String>);
                    }
                }
            }
        });

        let query = qb.build();
        match scope {
            WriteScope::Standalone => query.execute(&self.pool).await,
            WriteScope::Within(tx) => query.execute(&mut ***tx).await,
        }
        .map_err(|e| StoreError::classify(E::KIND, "batch_create", e))?;

        Ok(())
    }

    /// Probe for a record equal to `record` on all its populated fields.
    async fn exists<E: Entity>(
        &self,
        record: &E,
        scope: &mut WriteScope<'_>,
    ) -> Result<bool, StoreError> {
        let pairs = record.probe_filter();
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
        push_where(&mut qb, &pairs);

        let query = qb.build_query_scalar::<i64>();
        let count = match scope {
            WriteScope::Standalone => query.fetch_one(&self.pool).await,
            WriteScope::Within(tx) => query.fetch_one(&mut ***tx).await,
        }
        .map_err(|e| StoreError::classify(E::KIND, "probe", e))?;

        Ok(count > 0)
    }

    /// Return the most recently created matching record.
    pub async fn query_one<E: Entity>(&self, filter: &Filter) -> Result<E, StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", E::TABLE));
        push_where(&mut qb, filter.pairs());
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT 1");

        qb.build_query_as::<E>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::classify(E::KIND, "query", e))?
            .ok_or(StoreError::NotFound { entity: E::KIND })
    }

    /// Return all matching records, most recent first.
    pub async fn query_many<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>, StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", E::TABLE));
        push_where(&mut qb, filter.pairs());
        qb.push(" ORDER BY created_at DESC, id DESC");

        qb.build_query_as::<E>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::classify(E::KIND, "query", e))
    }

    /// Hard-delete a project and every milestone, issue, merge request, and
    /// branch scoped to its remote project id, in one transaction.
    ///
    /// A missing project is a no-op, not an error; any failure rolls the
    /// whole deletion back.
    pub async fn remove_project_and_related_data(
        &self,
        project_id: i64,
    ) -> Result<(), StoreError> {
        let project = match self
            .query_one::<Project>(&Filter::new().eq("project_id", project_id))
            .await
        {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut tx = self.begin().await?;

        for table in ["milestones", "issues", "merge_requests", "branches"] {
            sqlx::query(&format!("DELETE FROM {} WHERE project_id = ?", table))
                .bind(project_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::classify("project", "cascade_delete", e))?;
        }

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::classify("project", "cascade_delete", e))?;

        self.commit(tx).await
    }
}
