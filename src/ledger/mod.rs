//! The inventory ledger core: column resolution, log-band bookkeeping and
//! the engine that reconciles quantity changes against the backing tables.

pub mod bands;
pub mod columns;
pub mod engine;
pub mod timestamp;

pub use engine::LedgerEngine;
