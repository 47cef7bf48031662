//! A recording stub store for scheduler and coordinator tests.
//!
//! Every successful call is appended to a shared [`CallLog`] together with the
//! worker that issued it and the (paused-clock) instant it completed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use store_client::{
    ConnectionFactory, Document, OperationKind, StoreConnection, StoreError, StoreResult,
};
use tokio::time::Instant;

/// One call observed by the stub.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub worker_id: usize,
    pub kind: OperationKind,
    pub db: String,
    pub collection: String,
    /// Filter, document, or pipeline, exactly as the connection received it.
    pub payload: Value,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct LogState {
    calls: Vec<RecordedCall>,
    connects: usize,
    closes: usize,
}

/// Shared, cloneable view of everything the stub recorded.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<LogState>>,
}

impl CallLog {
    fn state(&self) -> MutexGuard<'_, LogState> {
        // A panicking test thread must not hide the calls recorded so far.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All recorded calls in completion order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Total number of recorded calls.
    pub fn total(&self) -> usize {
        self.state().calls.len()
    }

    /// Number of calls of `kind` across all workers.
    pub fn count(&self, kind: OperationKind) -> usize {
        self.state().calls.iter().filter(|c| c.kind == kind).count()
    }

    /// Number of calls of `kind` issued by `worker_id`.
    pub fn count_for(&self, worker_id: usize, kind: OperationKind) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.worker_id == worker_id && c.kind == kind)
            .count()
    }

    /// Number of calls issued by `worker_id`.
    pub fn total_for(&self, worker_id: usize) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.worker_id == worker_id)
            .count()
    }

    /// Successful `connect` calls.
    pub fn connects(&self) -> usize {
        self.state().connects
    }

    /// `close` calls.
    pub fn closes(&self) -> usize {
        self.state().closes
    }

    fn record(&self, call: RecordedCall) {
        self.state().calls.push(call);
    }
}

/// How an injected failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// The store rejects the operation.
    Operation,
    /// The connection drops mid-operation.
    Disconnect,
    /// The operation panics.
    Panic,
}

/// A `ConnectionFactory` whose connections record calls instead of talking to a store.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    log: CallLog,
    latency: Duration,
    fail_on_op: HashMap<usize, (usize, Failure)>,
    refused: HashSet<usize>,
}

impl RecordingFactory {
    /// A factory with instant operations and no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation take `latency` (on the tokio clock).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `worker_id`'s `nth` operation (1-based) fail.
    pub fn fail_worker_on_op(mut self, worker_id: usize, nth: usize) -> Self {
        self.fail_on_op.insert(worker_id, (nth, Failure::Operation));
        self
    }

    /// Make `worker_id`'s connection drop on its `nth` operation (1-based).
    pub fn drop_worker_on_op(mut self, worker_id: usize, nth: usize) -> Self {
        self.fail_on_op.insert(worker_id, (nth, Failure::Disconnect));
        self
    }

    /// Make `worker_id`'s `nth` operation (1-based) panic.
    pub fn panic_worker_on_op(mut self, worker_id: usize, nth: usize) -> Self {
        self.fail_on_op.insert(worker_id, (nth, Failure::Panic));
        self
    }

    /// Refuse to open a connection for `worker_id`.
    pub fn refuse_worker(mut self, worker_id: usize) -> Self {
        self.refused.insert(worker_id);
        self
    }

    /// The log shared by every connection this factory opens.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl ConnectionFactory for RecordingFactory {
    async fn connect(&self, worker_id: usize) -> StoreResult<Box<dyn StoreConnection>> {
        if self.refused.contains(&worker_id) {
            return Err(StoreError::Connection(format!(
                "worker {} refused by stub",
                worker_id
            )));
        }
        self.log.state().connects += 1;
        Ok(Box::new(RecordingConnection {
            worker_id,
            log: self.log.clone(),
            latency: self.latency,
            fail_on_op: self.fail_on_op.get(&worker_id).copied(),
            attempts: 0,
        }))
    }
}

/// A connection produced by [`RecordingFactory`].
pub struct RecordingConnection {
    worker_id: usize,
    log: CallLog,
    latency: Duration,
    fail_on_op: Option<(usize, Failure)>,
    attempts: usize,
}

impl RecordingConnection {
    async fn call(
        &mut self,
        kind: OperationKind,
        db: &str,
        collection: &str,
        payload: Value,
    ) -> StoreResult<()> {
        self.attempts += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some((nth, failure)) = self.fail_on_op {
            if nth == self.attempts {
                match failure {
                    Failure::Operation => {
                        return Err(StoreError::operation(kind, "injected failure"));
                    }
                    Failure::Disconnect => {
                        return Err(StoreError::Connection(
                            "connection reset by stub".to_string(),
                        ));
                    }
                    Failure::Panic => panic!("injected panic on {} #{}", kind, nth),
                }
            }
        }
        self.log.record(RecordedCall {
            worker_id: self.worker_id,
            kind,
            db: db.to_string(),
            collection: collection.to_string(),
            payload,
            at: Instant::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for RecordingConnection {
    async fn query(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()> {
        let payload = Value::Object(filter.clone());
        self.call(OperationKind::Query, db, collection, payload).await
    }

    async fn update(
        &mut self,
        db: &str,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<()> {
        let payload = Value::Array(vec![
            Value::Object(filter.clone()),
            Value::Object(update.clone()),
        ]);
        self.call(OperationKind::Update, db, collection, payload).await
    }

    async fn insert(&mut self, db: &str, collection: &str, document: &Document) -> StoreResult<()> {
        let payload = Value::Object(document.clone());
        self.call(OperationKind::Insert, db, collection, payload).await
    }

    async fn delete(&mut self, db: &str, collection: &str, filter: &Document) -> StoreResult<()> {
        let payload = Value::Object(filter.clone());
        self.call(OperationKind::Delete, db, collection, payload).await
    }

    async fn aggregate(
        &mut self,
        db: &str,
        collection: &str,
        pipeline: &[Document],
    ) -> StoreResult<()> {
        let payload = Value::Array(pipeline.iter().cloned().map(Value::Object).collect());
        self.call(OperationKind::Aggregate, db, collection, payload).await
    }

    async fn close(&mut self) -> StoreResult<()> {
        self.log.state().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_per_worker() {
        let factory = RecordingFactory::new();
        let log = factory.log();

        let mut a = factory.connect(0).await.unwrap();
        let mut b = factory.connect(1).await.unwrap();
        a.query("test", "onemill", &Document::new()).await.unwrap();
        b.insert("test", "onemill", &Document::new()).await.unwrap();
        b.insert("test", "onemill", &Document::new()).await.unwrap();
        a.close().await.unwrap();

        assert_eq!(log.connects(), 2);
        assert_eq!(log.closes(), 1);
        assert_eq!(log.count(OperationKind::Insert), 2);
        assert_eq!(log.count_for(0, OperationKind::Query), 1);
        assert_eq!(log.total_for(1), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_hits_only_that_worker() {
        let factory = RecordingFactory::new().fail_worker_on_op(0, 2);
        let log = factory.log();

        let mut failing = factory.connect(0).await.unwrap();
        let mut healthy = factory.connect(1).await.unwrap();
        let empty = Document::new();

        assert!(failing.query("db", "c", &empty).await.is_ok());
        let err = failing.delete("db", "c", &empty).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Operation {
                kind: OperationKind::Delete,
                ..
            }
        ));
        assert!(healthy.query("db", "c", &empty).await.is_ok());
        assert!(healthy.query("db", "c", &empty).await.is_ok());
        assert_eq!(log.total_for(0), 1);
        assert_eq!(log.total_for(1), 2);
    }

    #[tokio::test]
    async fn test_dropped_connection_surfaces_as_connection_error() {
        let factory = RecordingFactory::new().drop_worker_on_op(0, 1);
        let mut conn = factory.connect(0).await.unwrap();
        let err = conn.insert("db", "c", &Document::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert_eq!(factory.log().total(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "injected panic")]
    async fn test_panic_mode_panics_on_nth_op() {
        let factory = RecordingFactory::new().panic_worker_on_op(0, 2);
        let mut conn = factory.connect(0).await.unwrap();
        conn.query("db", "c", &Document::new()).await.unwrap();
        let _ = conn.query("db", "c", &Document::new()).await;
    }

    #[tokio::test]
    async fn test_refused_worker_gets_connection_error() {
        let factory = RecordingFactory::new().refuse_worker(3);
        assert!(matches!(
            factory.connect(3).await,
            Err(StoreError::Connection(_))
        ));
        assert_eq!(factory.log().connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_advances_paused_clock() {
        let factory = RecordingFactory::new().with_latency(Duration::from_millis(40));
        let mut conn = factory.connect(0).await.unwrap();
        let start = Instant::now();
        conn.query("db", "c", &Document::new()).await.unwrap();
        crate::assert_duration_approx_eq!(
            start.elapsed(),
            Duration::from_millis(40),
            Duration::from_millis(1)
        );
    }
}
