use serde::{Deserialize, Serialize};

use sea_orm::{QueryOrder, QuerySelect, prelude::*};

use crate::{ResultEngine, Transaction, Visibility, cache::keys, transactions};

use super::super::{CachedValue, Engine};
use super::{ApplyClauses, Clause, PageCursor, TransactionFilter};

/// One page of [`Engine::query_transactions`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub records: Vec<Transaction>,
    /// Set only when `has_more` is true.
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// Effective page size after defaulting and clamping.
    pub limit: u64,
    /// Rows of this page that could not be decoded and were left out.
    pub skipped_rows: u64,
}

/// Decodes stored rows, leaving out (and counting) the ones that fail.
pub(super) fn decode_rows(rows: Vec<transactions::Model>) -> (Vec<Transaction>, u64) {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0u64;
    for model in rows {
        let id = model.id;
        match Transaction::try_from(model) {
            Ok(tx) => records.push(tx),
            Err(err) => {
                skipped += 1;
                tracing::warn!(transaction_id = id, error = %err, "skipping undecodable transaction row");
            }
        }
    }
    (records, skipped)
}

impl Engine {
    /// Lists the transactions `viewer_id` may see, newest first.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    /// `cursor` is the `next_cursor` of the previous page. `limit` defaults
    /// to the configured page size and is clamped to the configured maximum.
    ///
    /// Pages are cached per viewer, filter, cursor and limit until a write
    /// invalidates them or their TTL runs out.
    pub async fn query_transactions(
        &self,
        viewer_id: i64,
        filter: &TransactionFilter,
        cursor: Option<&str>,
        limit: Option<u64>,
    ) -> ResultEngine<TransactionPage> {
        let limit = self.page_size(limit);
        let cursor = cursor
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(PageCursor::decode)
            .transpose()?;

        let key = keys::transactions_page(viewer_id, filter, cursor.as_ref(), limit);
        if let Some(CachedValue::Page(page)) = self.cache.get(&key) {
            tracing::trace!(viewer_id, "transactions page served from cache");
            return Ok(page);
        }

        let visibility = self.resolve_visibility(viewer_id, filter.scope).await;
        let page = self
            .fetch_transactions_page(&visibility, filter, cursor, limit)
            .await?;

        if visibility.is_degraded() {
            tracing::debug!(viewer_id, "not caching page built from degraded visibility");
        } else {
            self.cache
                .set(key, CachedValue::Page(page.clone()), self.config.page_ttl);
        }
        Ok(page)
    }

    async fn fetch_transactions_page(
        &self,
        visibility: &Visibility,
        filter: &TransactionFilter,
        cursor: Option<PageCursor>,
        limit: u64,
    ) -> ResultEngine<TransactionPage> {
        let mut clauses = filter.clauses(visibility);
        if let Some(cursor) = cursor {
            clauses.push(Clause::Before(cursor));
        }

        let limit_plus_one = limit.saturating_add(1);
        let mut rows: Vec<transactions::Model> = transactions::Entity::find()
            .apply_clauses(clauses)
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit_plus_one)
            .all(&self.database)
            .await?;

        let has_more = rows.len() as u64 > limit;
        rows.truncate(limit as usize);

        // The cursor follows the last stored row, decodable or not, so a bad
        // row never stalls pagination.
        let next_cursor = if has_more {
            rows.last()
                .map(|model| PageCursor {
                    occurred_at: model.occurred_at,
                    transaction_id: Some(model.id),
                })
                .map(|c| c.encode())
                .transpose()?
        } else {
            None
        };

        let (records, skipped_rows) = decode_rows(rows);
        Ok(TransactionPage {
            records,
            next_cursor,
            has_more,
            limit,
            skipped_rows,
        })
    }
}
