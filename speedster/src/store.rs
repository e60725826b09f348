//! Persistence gateway for scan records.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::types::Scan;

/// How long to wait for a reachable server at startup before giving up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Upper bound on a single insert.
pub const INSERT_TIMEOUT: Duration = Duration::from_secs(5);

const COLLECTION: &str = "scans";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("scan with id {0} does not exist")]
    NotFound(String),

    #[error("duplicate scan id {0}")]
    DuplicateId(String),

    /// Defensive invariant check: ids are unique, so a delete can never
    /// remove more than one record. Surfaced loudly rather than ignored.
    #[error("{0} scans were deleted where exactly one was expected")]
    MultipleDeleted(u64),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

/// Operations against the single collection of scan records.
///
/// Identifiers cross this seam as strings and are parsed inside the
/// gateway, before any database operation is attempted.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Every record, in storage-native order. Empty vec when there are none.
    async fn list(&self) -> Result<Vec<Scan>, StoreError>;

    /// Persists a fully populated record.
    async fn insert(&self, scan: &Scan) -> Result<(), StoreError>;

    async fn find(&self, id: &str) -> Result<Scan, StoreError>;

    /// Removes exactly one record.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

pub struct MongoScanStore {
    collection: Collection<Scan>,
}

impl MongoScanStore {
    /// Establishes the connection up front and verifies it with a ping; a
    /// failure here aborts startup.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);

        let client = Client::with_options(options)?;
        let database = client.database(&config.name);
        database.run_command(doc! { "ping": 1 }).await?;

        Ok(MongoScanStore {
            collection: database.collection(COLLECTION),
        })
    }
}

#[async_trait]
impl ScanStore for MongoScanStore {
    async fn list(&self) -> Result<Vec<Scan>, StoreError> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert(&self, scan: &Scan) -> Result<(), StoreError> {
        tokio::time::timeout(INSERT_TIMEOUT, self.collection.insert_one(scan))
            .await
            .map_err(|_| StoreError::Timeout("insert"))??;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Scan, StoreError> {
        let oid = parse_id(id)?;
        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        let result = self.collection.delete_one(doc! { "_id": oid }).await?;

        match result.deleted_count {
            1 => Ok(()),
            0 => Err(StoreError::NotFound(id.to_string())),
            n => Err(StoreError::MultipleDeleted(n)),
        }
    }
}
