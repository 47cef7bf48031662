//! MongoDB-backed store connections.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Document as BsonDocument};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection};
use tracing::debug;

use crate::connection::{ConnectionFactory, Document, StoreConnection};
use crate::error::{StoreError, StoreResult};
use crate::operation::OperationKind;

/// Opens one MongoDB client per worker.
#[derive(Debug, Clone)]
pub struct MongoConnectionFactory {
    uri: String,
}

impl MongoConnectionFactory {
    /// Create a factory for the given connection string.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// The connection string workers will use.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl ConnectionFactory for MongoConnectionFactory {
    async fn connect(&self, worker_id: usize) -> StoreResult<Box<dyn StoreConnection>> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(format!("invalid uri {}: {}", self.uri, e)))?;

        // The driver connects lazily; ping so an unreachable server fails here
        // rather than on the first operation.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(format!("ping failed: {}", e)))?;

        debug!(worker_id, "Connected to MongoDB");

        Ok(Box::new(MongoConnection {
            client: Some(client),
        }))
    }
}

/// A single worker's MongoDB client.
pub struct MongoConnection {
    client: Option<Client>,
}

impl MongoConnection {
    fn collection(&self, db: &str, collection: &str) -> StoreResult<Collection<BsonDocument>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| StoreError::Connection("connection already closed".to_string()))?;
        Ok(client.database(db).collection(collection))
    }
}

fn to_bson(document: &Document) -> StoreResult<BsonDocument> {
    bson::to_document(document).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Network-level driver failures mean the connection is gone; everything else
/// is a failure of the operation itself.
fn op_error(kind: OperationKind) -> impl Fn(mongodb::error::Error) -> StoreError {
    move |e| match e.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => StoreError::Connection(e.to_string()),
        _ => StoreError::operation(kind, e.to_string()),
    }
}

#[async_trait]
impl StoreConnection for MongoConnection {
    async fn query(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()> {
        // Opening the cursor runs the query and fetches the first batch.
        let _cursor = self
            .collection(db, collection)?
            .find(to_bson(filter)?)
            .await
            .map_err(op_error(OperationKind::Query))?;
        Ok(())
    }

    async fn update(
        &mut self,
        db: &str,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<()> {
        self.collection(db, collection)?
            .update_one(to_bson(filter)?, to_bson(update)?)
            .await
            .map_err(op_error(OperationKind::Update))?;
        Ok(())
    }

    async fn insert(&mut self, db: &str, collection: &str, document: &Document) -> StoreResult<()> {
        self.collection(db, collection)?
            .insert_one(to_bson(document)?)
            .await
            .map_err(op_error(OperationKind::Insert))?;
        Ok(())
    }

    async fn delete(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()> {
        self.collection(db, collection)?
            .delete_one(to_bson(filter)?)
            .await
            .map_err(op_error(OperationKind::Delete))?;
        Ok(())
    }

    async fn aggregate(
        &mut self,
        db: &str,
        collection: &str,
        pipeline: &[Document],
    ) -> StoreResult<()> {
        let stages = pipeline
            .iter()
            .map(to_bson)
            .collect::<StoreResult<Vec<_>>>()?;
        let _cursor = self
            .collection(db, collection)?
            .aggregate(stages)
            .await
            .map_err(op_error(OperationKind::Aggregate))?;
        Ok(())
    }

    async fn close(&mut self) -> StoreResult<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_bson_preserves_operators() {
        let doc = json!({"$set": {"m": 7}, "age": 30})
            .as_object()
            .cloned()
            .unwrap();
        let bson = to_bson(&doc).unwrap();
        assert_eq!(bson.get_document("$set").unwrap().get_i64("m").unwrap(), 7);
        assert_eq!(bson.get_i64("age").unwrap(), 30);
    }

    #[test]
    fn test_network_errors_classified_as_connection() {
        let reset = mongodb::error::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(matches!(
            op_error(OperationKind::Update)(reset),
            StoreError::Connection(_)
        ));

        let other = mongodb::error::Error::custom("write conflict");
        assert!(matches!(
            op_error(OperationKind::Update)(other),
            StoreError::Operation {
                kind: OperationKind::Update,
                ..
            }
        ));
    }

    #[test]
    fn test_factory_keeps_uri() {
        let factory = MongoConnectionFactory::new("mongodb://db.internal:27017/admin");
        assert_eq!(factory.uri(), "mongodb://db.internal:27017/admin");
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_operations() {
        let mut conn = MongoConnection { client: None };
        let err = conn.query("test", "onemill", &Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        // closing twice is harmless
        conn.close().await.unwrap();
    }
}
