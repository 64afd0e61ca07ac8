//! Persistence seam and ledger services.
//!
//! The domain crates stay pure; everything that loads, decides, and commits
//! lives here: the [`store::LedgerStore`] trait with its in-memory
//! implementation, the [`registry::AccountRegistry`], the
//! [`journal::JournalService`] posting engine, and the
//! [`reporting::ReportingEngine`].

pub mod journal;
pub mod registry;
pub mod reporting;
pub mod store;

pub use journal::{EntryFilter, JournalPatch, JournalService, NewJournalEntry};
pub use registry::{AccountFilter, AccountNode, AccountRegistry};
pub use reporting::ReportingEngine;
pub use store::{InMemoryLedgerStore, LedgerStore, RecordWrite, StoreError, UnitOfWork};
