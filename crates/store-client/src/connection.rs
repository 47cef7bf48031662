//! The connection seam driven by workload schedulers.

use async_trait::async_trait;

use crate::error::StoreResult;

/// A payload document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// One exclusive connection to the target store.
///
/// Each call issues exactly one request and waits for the store to answer.
/// Results are not inspected; only failures are surfaced.
#[async_trait]
pub trait StoreConnection: Send {
    /// Run a find against `db.collection`.
    async fn query(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()>;

    /// Update one document matching `filter`.
    async fn update(
        &mut self,
        db: &str,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<()>;

    /// Insert one document.
    async fn insert(&mut self, db: &str, collection: &str, document: &Document) -> StoreResult<()>;

    /// Delete one document matching `filter`.
    async fn delete(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()>;

    /// Run an aggregation pipeline.
    async fn aggregate(
        &mut self,
        db: &str,
        collection: &str,
        pipeline: &[Document],
    ) -> StoreResult<()>;

    /// Release the connection. Called exactly once, on every worker exit path.
    async fn close(&mut self) -> StoreResult<()>;
}

/// Produces one connection per worker.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a fresh connection for `worker_id`.
    async fn connect(&self, worker_id: usize) -> StoreResult<Box<dyn StoreConnection>>;
}
