//! fxwallet Ledger
//!
//! Persistence for users, per-currency wallets and the append-only
//! transaction log. Wallet operations open a [`LedgerUnit`], do their reads
//! and writes through it, then commit; a unit dropped early rolls back.
//!
//! Two backends implement [`LedgerStore`]:
//!
//! - [`PgLedger`] on PostgreSQL, with row locks on wallet reads
//! - [`InMemoryLedger`] for tests and the simulator

pub mod account;
pub mod error;
pub mod journal;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use account::{User, Wallet};
pub use error::{LedgerError, LedgerResult};
pub use journal::{NewTransaction, Transaction, TransactionKind, TransactionQuery, TransactionType};
pub use memory::InMemoryLedger;
pub use postgres::PgLedger;
pub use repository::{LedgerStore, LedgerUnit};
