//! Relational store backed by SeaORM (PostgreSQL or SQLite)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::RetryConfig;
use database::relational::{
    DatabaseConnection, DbBackend, RelationalConfig, connect_from_config_with_retry,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

use super::entity::{self, ActiveModel, Entity as Entries};
use super::{StoreKind, WaitlistStore, escape_like};
use crate::error::{WaitlistError, WaitlistResult};
use crate::models::WaitlistEntry;

/// SeaORM implementation of [`WaitlistStore`]
///
/// The `waitlist_entries` table is created on `connect` when missing.
/// `replace_all` runs inside one transaction.
pub struct RelationalWaitlistStore {
    config: RelationalConfig,
    retry: Option<RetryConfig>,
    connection: Mutex<Option<DatabaseConnection>>,
}

impl RelationalWaitlistStore {
    pub fn new(config: RelationalConfig) -> Self {
        Self {
            config,
            retry: None,
            connection: Mutex::new(None),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<DatabaseConnection>> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn db(&self) -> WaitlistResult<DatabaseConnection> {
        self.lock()
            .clone()
            .ok_or_else(|| WaitlistError::Persistence("relational store is not connected".into()))
    }
}

/// Lowercase `pattern` the way the backend's `LOWER()` does
///
/// SQLite folds ASCII only, so non-ASCII letters must match case exactly
/// there; PostgreSQL folds Unicode.
fn fold_case(backend: DbBackend, pattern: &str) -> String {
    match backend {
        DbBackend::Sqlite => pattern.to_ascii_lowercase(),
        _ => pattern.to_lowercase(),
    }
}

#[async_trait]
impl WaitlistStore for RelationalWaitlistStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Relational
    }

    #[instrument(skip(self), fields(dialect = %self.config.dialect))]
    async fn connect(&self) -> WaitlistResult<()> {
        if self.lock().is_some() {
            return Ok(());
        }

        let db = connect_from_config_with_retry(&self.config, self.retry.clone()).await?;
        db.execute_unprepared(entity::create_table_sql(db.get_database_backend()))
            .await?;

        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(db);
        }

        tracing::info!("Relational store connected");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> WaitlistResult<Vec<WaitlistEntry>> {
        let models = Entries::find().all(&self.db()?).await?;
        Ok(models.into_iter().map(WaitlistEntry::from).collect())
    }

    #[instrument(skip(self, entry), fields(email = %entry.email))]
    async fn create(&self, entry: &WaitlistEntry) -> WaitlistResult<()> {
        Entries::insert(ActiveModel::from(entry))
            .exec_without_returning(&self.db()?)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_one(&self, email: &str) -> WaitlistResult<()> {
        Entries::delete_by_id(email.to_string())
            .exec(&self.db()?)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> WaitlistResult<()> {
        let result = Entries::delete_many().exec(&self.db()?).await?;
        tracing::debug!(deleted = result.rows_affected, "Cleared relational store");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_pattern(&self, pattern: &str) -> WaitlistResult<Vec<String>> {
        let db = self.db()?;
        let needle = format!(
            "%{}%",
            escape_like(&fold_case(db.get_database_backend(), pattern))
        );
        let models = Entries::find()
            .filter(Expr::cust_with_values(
                "LOWER(email) LIKE ? ESCAPE '!'",
                [needle],
            ))
            .all(&db)
            .await?;

        Ok(models.into_iter().map(|model| model.email).collect())
    }

    #[instrument(skip(self))]
    async fn count_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> WaitlistResult<u64> {
        let mut query = Entries::find();
        if let Some(start) = start {
            query = query.filter(entity::Column::CreatedAt.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(entity::Column::CreatedAt.lte(end));
        }

        Ok(query.count(&self.db()?).await?)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn replace_all(&self, entries: &[WaitlistEntry]) -> WaitlistResult<()> {
        let db = self.db()?;
        let txn = db.begin().await?;

        Entries::delete_many().exec(&txn).await?;
        if !entries.is_empty() {
            Entries::insert_many(entries.iter().map(ActiveModel::from))
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self) -> WaitlistResult<()> {
        let db = self.lock().take();
        if let Some(db) = db {
            db.close().await?;
            tracing::info!("Relational store connection closed");
        }
        Ok(())
    }
}
