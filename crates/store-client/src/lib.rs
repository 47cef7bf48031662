//! Store client abstractions for the load generator.
//!
//! Provides:
//! - The `StoreConnection` / `ConnectionFactory` seam the scheduler drives
//! - The closed set of operation kinds a workload can issue
//! - A MongoDB-backed implementation of the seam

pub mod connection;
pub mod error;
pub mod mongo;
pub mod operation;

pub use connection::{ConnectionFactory, Document, StoreConnection};
pub use error::{StoreError, StoreResult};
pub use mongo::{MongoConnection, MongoConnectionFactory};
pub use operation::OperationKind;
