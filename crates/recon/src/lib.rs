//! `daybook-recon` — supplier sheet ingestion-and-reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded sheets, returns classified results
//! and record batches. No CLI or IO dependencies; file reading and storage
//! sit behind the [`pipeline::WorkbookSource`] and [`store::RecordStore`]
//! traits.

pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod store;

pub use config::IngestConfig;
pub use error::ReconError;
pub use model::{IngestBatch, IngestReceipt, LoadOutcome, RecordKind};
pub use pipeline::Ingestor;
