//! Ledger query and settlement engine.
//!
//! [`Engine`] answers "which records may this viewer see" across personal
//! and group boundaries, pages through them with a stable keyset cursor,
//! caches what it serves in a [`TtlCache`], and records shared expenses as
//! a transaction plus the debts it creates.

pub use cache::TtlCache;
pub use debts::Debt;
pub use error::EngineError;
pub use ops::{
    Balance, CachedValue, DebtEntry, DebtLedger, DeletedTransactions, Engine, EngineBuilder,
    EngineConfig, FilterParams, LedgerCache, MembershipRole, NewSplit, NewTransaction,
    PageCursor, Period, SplitOutcome, SplitPlan, TransactionFilter, TransactionPage,
};
pub use transactions::{OperationType, Transaction};
pub use visibility::{Scope, Visibility};

pub mod categories;
pub mod debts;
pub mod group_memberships;
pub mod groups;
pub mod subcategories;
pub mod transactions;
pub mod users;

mod cache;
mod error;
mod ops;
mod visibility;

pub type ResultEngine<T> = Result<T, EngineError>;
