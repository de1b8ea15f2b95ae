//! MongoDB database wrapper and group store backend.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::{Client, Collection, options::ClientOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::StoreError;
use super::store::{GroupStore, StoredGroup};
use crate::moderation::GroupId;

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

/// One persisted group: the settings blob keyed by chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupRecord {
    chat_id: i64,
    data: String,
}

/// Group store backed by the `group_config` collection.
pub struct MongoGroupStore {
    db: Database,
    records: Collection<GroupRecord>,
    raw: Collection<Document>,
}

impl MongoGroupStore {
    pub fn new(db: Database) -> Self {
        Self {
            records: db.collection("group_config"),
            raw: db.collection("group_config"),
            db,
        }
    }
}

#[async_trait]
impl GroupStore for MongoGroupStore {
    async fn load_all(&self) -> Result<Vec<StoredGroup>, StoreError> {
        // Raw documents so that one broken record cannot abort the scan.
        let mut cursor = self.raw.find(doc! {}).await?;
        let mut groups = Vec::new();

        while let Some(document) = cursor.try_next().await? {
            match (document.get_i64("chat_id"), document.get_str("data")) {
                (Ok(group_id), Ok(data)) => groups.push(StoredGroup {
                    group_id,
                    data: data.to_string(),
                }),
                _ => warn!("Skipping malformed group_config document: {:?}", document.get("_id")),
            }
        }

        debug!("Loaded {} group records from MongoDB", groups.len());
        Ok(groups)
    }

    async fn save(&self, group_id: GroupId, data: &str) -> Result<(), StoreError> {
        let filter = doc! { "chat_id": group_id };
        let record = GroupRecord {
            chat_id: group_id,
            data: data.to_string(),
        };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.records
            .replace_one(filter, record)
            .with_options(options)
            .await?;

        debug!("Saved group config for {}", group_id);
        Ok(())
    }

    async fn delete(&self, group_id: GroupId) -> Result<(), StoreError> {
        let result = self.records.delete_one(doc! { "chat_id": group_id }).await?;
        debug!("Deleted group config for {}: {}", group_id, result.deleted_count > 0);
        Ok(())
    }

    async fn close(&self) {
        self.db.client.clone().shutdown().await;
        info!("MongoDB client shut down");
    }
}
