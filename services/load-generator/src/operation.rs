//! Operation specifications and their dispatch onto a store connection.

use rand::Rng;
use store_client::{OperationKind, StoreConnection, StoreResult};

use crate::template::DocumentTemplate;

/// The payload of one operation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Query {
        filter: DocumentTemplate,
    },
    Update {
        filter: DocumentTemplate,
        update: DocumentTemplate,
    },
    Insert {
        document: DocumentTemplate,
    },
    Delete {
        filter: DocumentTemplate,
    },
    Aggregate {
        pipeline: Vec<DocumentTemplate>,
    },
}

impl Operation {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Query { .. } => OperationKind::Query,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Aggregate { .. } => OperationKind::Aggregate,
        }
    }
}

/// One kind of operation with its per-second quota and target namespace.
///
/// Immutable once a run starts. A quota of 0 disables the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub operation: Operation,
    pub quota: u32,
    pub database: String,
    pub collection: String,
}

impl OperationSpec {
    pub fn new(
        operation: Operation,
        quota: u32,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            quota,
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Issue exactly one call against `conn`, rendering payloads with `rng`.
    pub async fn execute<R: Rng>(
        &self,
        conn: &mut dyn StoreConnection,
        rng: &mut R,
    ) -> StoreResult<()> {
        let (db, coll) = (self.database.as_str(), self.collection.as_str());
        match &self.operation {
            Operation::Query { filter } => {
                let filter = filter.render(rng);
                conn.query(db, coll, &filter).await
            }
            Operation::Update { filter, update } => {
                let filter = filter.render(rng);
                let update = update.render(rng);
                conn.update(db, coll, &filter, &update).await
            }
            Operation::Insert { document } => {
                let document = document.render(rng);
                conn.insert(db, coll, &document).await
            }
            Operation::Delete { filter } => {
                let filter = filter.render(rng);
                conn.delete(db, coll, &filter).await
            }
            Operation::Aggregate { pipeline } => {
                let stages: Vec<_> = pipeline.iter().map(|stage| stage.render(rng)).collect();
                conn.aggregate(db, coll, &stages).await
            }
        }
    }
}
