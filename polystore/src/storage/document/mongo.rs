//! `MongoDocumentClient` - Production Document Client
//!
//! `TigerStyle`: Thin mapping of `DocumentClient` onto one MongoDB database.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::{Client, Collection, Database};
use serde_json::Value;

use super::{DocumentClient, DocumentFilter, DOCUMENT_ID_FIELD};
use crate::storage::{ClientError, ClientResult};

/// MongoDB client bound to one database.
#[derive(Clone)]
pub struct MongoDocumentClient {
    db: Database,
}

impl MongoDocumentClient {
    /// Connect to `uri` (e.g. `mongodb://mongo:27017`) and use `database`.
    ///
    /// # Errors
    /// Returns `ClientError::Unreachable` if the URI cannot be resolved.
    pub async fn connect(uri: &str, database: &str) -> ClientResult<Self> {
        let client = Client::with_uri_str(uri).await.map_err(map_mongo_error)?;
        Ok(Self {
            db: client.database(database),
        })
    }

    /// Wrap an existing database handle.
    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

fn map_mongo_error(err: MongoError) -> ClientError {
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => ClientError::Unreachable(err.to_string()),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            ClientError::Codec(err.to_string())
        }
        _ => ClientError::rejected(err.to_string()),
    }
}

fn to_document(value: &Value) -> ClientResult<Document> {
    bson::to_document(value).map_err(|e| ClientError::Codec(e.to_string()))
}

fn to_filter(filter: &DocumentFilter) -> Document {
    match filter {
        DocumentFilter::All => Document::new(),
        DocumentFilter::FieldEq { field, value } => doc! { field.as_str(): value.as_str() },
    }
}

#[async_trait]
impl DocumentClient for MongoDocumentClient {
    async fn drop_collection(&self, collection: &str) -> ClientResult<()> {
        // The driver already treats a missing namespace as success.
        self.collection(collection)
            .drop()
            .await
            .map_err(map_mongo_error)
    }

    async fn insert_one(&self, collection: &str, document: Value) -> ClientResult<()> {
        let document = to_document(&document)?;
        self.collection(collection)
            .insert_one(document)
            .await
            .map(|_| ())
            .map_err(map_mongo_error)
    }

    async fn upsert(&self, collection: &str, id: &str, document: Value) -> ClientResult<()> {
        let document = to_document(&document)?;
        self.collection(collection)
            .replace_one(doc! { DOCUMENT_ID_FIELD: id }, document)
            .upsert(true)
            .await
            .map(|_| ())
            .map_err(map_mongo_error)
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> ClientResult<Vec<Value>> {
        let cursor = self
            .collection(collection)
            .find(to_filter(filter))
            .await
            .map_err(map_mongo_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(map_mongo_error)?;

        Ok(documents
            .into_iter()
            .map(|d| Bson::Document(d).into_relaxed_extjson())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolystoreConfig;
    use crate::storage::{DocumentAdapter, StorageAdapter};

    async fn client() -> MongoDocumentClient {
        let uri =
            std::env::var("TEST_MONGO_URL").unwrap_or_else(|_| "mongodb://localhost:27017".into());
        MongoDocumentClient::connect(&uri, "polystore_test")
            .await
            .expect("Failed to connect to test MongoDB")
    }

    #[test]
    fn test_filter_translation() {
        assert!(to_filter(&DocumentFilter::All).is_empty());
        assert_eq!(
            to_filter(&DocumentFilter::field_eq("country", "USA")),
            doc! { "country": "USA" }
        );
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB
    async fn test_mongo_upsert_and_find() {
        let db = client().await;
        db.drop_collection("scratch").await.unwrap();

        db.upsert("scratch", "USA_2000-01", serde_json::json!({"country": "USA", "value": "1"}))
            .await
            .unwrap();
        db.upsert("scratch", "USA_2000-01", serde_json::json!({"country": "USA", "value": "2"}))
            .await
            .unwrap();

        let docs = db
            .find("scratch", &DocumentFilter::field_eq("country", "USA"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["value"], "2");
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB
    async fn test_mongo_query_before_load_does_not_fail() {
        let adapter = DocumentAdapter::new(client().await, &PolystoreConfig::default());
        adapter.query_data("USA").await.unwrap();
    }
}
