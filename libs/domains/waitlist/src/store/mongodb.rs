//! Document store backed by MongoDB

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::RetryConfig;
use database::mongodb::{Client, Collection, connect_from_config_with_retry};
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

use super::{StoreKind, WaitlistStore};
use crate::config::DocumentStoreConfig;
use crate::error::{WaitlistError, WaitlistResult};
use crate::models::WaitlistEntry;

/// Stored shape: the address is the document id, so uniqueness is enforced
/// by the `_id` index
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryDocument {
    #[serde(rename = "_id")]
    email: String,
    created_at: bson::DateTime,
}

impl From<&WaitlistEntry> for EntryDocument {
    fn from(entry: &WaitlistEntry) -> Self {
        Self {
            email: entry.email.clone(),
            created_at: to_bson_datetime(entry.created_at),
        }
    }
}

impl TryFrom<EntryDocument> for WaitlistEntry {
    type Error = WaitlistError;

    fn try_from(document: EntryDocument) -> Result<Self, Self::Error> {
        let millis = document.created_at.timestamp_millis();
        let created_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            WaitlistError::Persistence(format!(
                "entry '{}' has an out-of-range timestamp ({})",
                document.email, millis
            ))
        })?;
        Ok(WaitlistEntry::new(document.email, created_at))
    }
}

fn to_bson_datetime(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

/// Inclusive `created_at` range filter; empty when both bounds are open
fn range_filter(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Document {
    let mut range = Document::new();
    if let Some(start) = start {
        range.insert("$gte", to_bson_datetime(start));
    }
    if let Some(end) = end {
        range.insert("$lte", to_bson_datetime(end));
    }

    if range.is_empty() {
        doc! {}
    } else {
        doc! { "created_at": range }
    }
}

/// Case-insensitive literal substring match on the address
fn pattern_filter(pattern: &str) -> Document {
    doc! { "_id": { "$regex": regex::escape(pattern), "$options": "i" } }
}

struct Connection {
    client: Client,
    collection: Collection<EntryDocument>,
}

/// MongoDB implementation of [`WaitlistStore`]
///
/// `replace_all` is a `delete_many` followed by `insert_many` without a
/// multi-document transaction; a crash between the two leaves the collection
/// empty until the next save.
pub struct MongoWaitlistStore {
    config: DocumentStoreConfig,
    retry: Option<RetryConfig>,
    connection: Mutex<Option<Connection>>,
}

impl MongoWaitlistStore {
    pub fn new(config: DocumentStoreConfig) -> Self {
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

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn collection(&self) -> WaitlistResult<Collection<EntryDocument>> {
        self.lock()
            .as_ref()
            .map(|connection| connection.collection.clone())
            .ok_or_else(|| WaitlistError::Persistence("document store is not connected".into()))
    }
}

#[async_trait]
impl WaitlistStore for MongoWaitlistStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    #[instrument(skip(self), fields(database = %self.config.mongo.database(), collection = %self.config.collection))]
    async fn connect(&self) -> WaitlistResult<()> {
        if self.lock().is_some() {
            return Ok(());
        }

        let client = connect_from_config_with_retry(&self.config.mongo, self.retry.clone()).await?;
        let collection = client
            .database(self.config.mongo.database())
            .collection::<EntryDocument>(&self.config.collection);

        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(Connection { client, collection });
        }

        tracing::info!("Document store connected");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> WaitlistResult<Vec<WaitlistEntry>> {
        let documents: Vec<EntryDocument> =
            self.collection()?.find(doc! {}).await?.try_collect().await?;

        documents.into_iter().map(WaitlistEntry::try_from).collect()
    }

    #[instrument(skip(self, entry), fields(email = %entry.email))]
    async fn create(&self, entry: &WaitlistEntry) -> WaitlistResult<()> {
        self.collection()?
            .insert_one(EntryDocument::from(entry))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_one(&self, email: &str) -> WaitlistResult<()> {
        self.collection()?
            .delete_one(doc! { "_id": email })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> WaitlistResult<()> {
        let result = self.collection()?.delete_many(doc! {}).await?;
        tracing::debug!(deleted = result.deleted_count, "Cleared document store");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_pattern(&self, pattern: &str) -> WaitlistResult<Vec<String>> {
        let documents: Vec<EntryDocument> = self
            .collection()?
            .find(pattern_filter(pattern))
            .await?
            .try_collect()
            .await?;

        Ok(documents.into_iter().map(|document| document.email).collect())
    }

    #[instrument(skip(self))]
    async fn count_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> WaitlistResult<u64> {
        let count = self
            .collection()?
            .count_documents(range_filter(start, end))
            .await?;
        Ok(count)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn replace_all(&self, entries: &[WaitlistEntry]) -> WaitlistResult<()> {
        let collection = self.collection()?;
        collection.delete_many(doc! {}).await?;

        if !entries.is_empty() {
            let documents: Vec<EntryDocument> = entries.iter().map(EntryDocument::from).collect();
            collection.insert_many(documents).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self) -> WaitlistResult<()> {
        let connection = self.lock().take();
        if let Some(connection) = connection {
            connection.client.shutdown().await;
            tracing::info!("Document store connection closed");
        }
        Ok(())
    }
}
