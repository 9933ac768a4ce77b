use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine, TtlCache, cache::keys};

mod access;
mod balances;
mod categories;
mod groups;
mod settlement;
mod transactions;
mod users;

pub use access::MembershipRole;
pub use balances::{Balance, Period};
pub use settlement::{DebtEntry, DebtLedger, NewSplit, SplitOutcome, SplitPlan};
pub use transactions::{
    DeletedTransactions, FilterParams, NewTransaction, PageCursor, TransactionFilter,
    TransactionPage,
};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Values the engine keeps in its cache.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Page(TransactionPage),
    Balance(Balance),
}

/// Cache shared by every request served by one [`Engine`].
pub type LedgerCache = TtlCache<CachedValue>;

/// Tunables of the engine. See [`EngineBuilder::config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size used when the caller does not ask for one.
    pub default_page_size: u64,
    /// Larger requested page sizes are clamped to this.
    pub max_page_size: u64,
    /// Lifetime of a cached transaction page.
    pub page_ttl: Duration,
    /// Lifetime of a cached balance.
    pub balance_ttl: Duration,
    pub deleted_default_limit: u64,
    pub deleted_max_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 50,
            page_ttl: Duration::from_secs(5 * 60),
            balance_ttl: Duration::from_secs(5 * 60),
            deleted_default_limit: 50,
            deleted_max_limit: 100,
        }
    }
}

/// Resolve a requested limit: missing or zero means `default`, anything
/// above `max` is clamped.
fn clamp_limit(requested: Option<u64>, default: u64, max: u64) -> u64 {
    match requested {
        None | Some(0) => default.min(max),
        Some(limit) => limit.min(max),
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    cache: Arc<LedgerCache>,
    config: EngineConfig,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The cache this engine reads through and invalidates.
    pub fn cache(&self) -> &Arc<LedgerCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn page_size(&self, requested: Option<u64>) -> u64 {
        clamp_limit(
            requested,
            self.config.default_page_size,
            self.config.max_page_size,
        )
    }

    pub(crate) fn deleted_page_size(&self, requested: Option<u64>) -> u64 {
        clamp_limit(
            requested,
            self.config.deleted_default_limit,
            self.config.deleted_max_limit,
        )
    }

    /// Drops every cached page and balance.
    ///
    /// A record is visible to its owner and to every member of its group, so
    /// a write can make entries of many viewers stale.
    pub(crate) fn invalidate_ledger(&self) {
        let pages = self.cache.clear_pattern(keys::TRANSACTIONS_DOMAIN);
        let balances = self.cache.clear_pattern(keys::BALANCE_DOMAIN);
        tracing::debug!(pages, balances, "invalidated ledger cache");
    }

    /// Drops every cached entry of a single viewer.
    pub(crate) fn invalidate_viewer(&self, viewer_id: i64) {
        let removed = self.cache.clear_pattern(&keys::viewer_pattern(viewer_id));
        tracing::debug!(viewer_id, removed, "invalidated viewer cache");
    }
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    cache: Option<Arc<LedgerCache>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Share an existing cache instead of creating a private one.
    pub fn cache(mut self, cache: Arc<LedgerCache>) -> EngineBuilder {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.config.max_page_size == 0 || self.config.deleted_max_limit == 0 {
            return Err(EngineError::InvalidAmount(
                "page size limits must be > 0".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            cache: self.cache.unwrap_or_default(),
            config: self.config,
        })
    }
}
