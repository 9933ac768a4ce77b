use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{QueryFilter, QueryOrder, QuerySelect, prelude::*, sea_query::Expr};

use crate::{EngineError, ResultEngine, Transaction, transactions};

use super::super::Engine;
use super::{ApplyClauses, Clause, list::decode_rows};

/// Result of [`Engine::list_deleted_transactions`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedTransactions {
    pub records: Vec<Transaction>,
    pub limit: u64,
    pub skipped_rows: u64,
}

impl Engine {
    /// Soft-deletes a transaction of `owner_id`.
    ///
    /// Fails with `KeyNotFound` when the record does not exist, belongs to
    /// someone else or is already deleted.
    pub async fn soft_delete_transaction(
        &self,
        owner_id: i64,
        transaction_id: i64,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let result = transactions::Entity::update_many()
            .col_expr(transactions::Column::DeletedAt, Expr::value(Some(at)))
            .filter(transactions::Column::Id.eq(transaction_id))
            .filter(transactions::Column::OwnerId.eq(owner_id))
            .filter(transactions::Column::DeletedAt.is_null())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "transaction not exists".to_string(),
            ));
        }

        self.invalidate_ledger();
        tracing::info!(owner_id, transaction_id, "transaction soft-deleted");
        Ok(())
    }

    /// Restores a soft-deleted transaction of `owner_id`.
    ///
    /// Fails with `KeyNotFound` unless the record exists, is owned by
    /// `owner_id` and is currently deleted.
    pub async fn restore_transaction(&self, owner_id: i64, transaction_id: i64) -> ResultEngine<()> {
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::DeletedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(transactions::Column::Id.eq(transaction_id))
            .filter(transactions::Column::OwnerId.eq(owner_id))
            .filter(transactions::Column::DeletedAt.is_not_null())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "deleted transaction not exists".to_string(),
            ));
        }

        self.invalidate_ledger();
        tracing::info!(owner_id, transaction_id, "transaction restored");
        Ok(())
    }

    /// Lists the soft-deleted transactions of `owner_id`, most recently
    /// deleted first. Never cached.
    pub async fn list_deleted_transactions(
        &self,
        owner_id: i64,
        limit: Option<u64>,
    ) -> ResultEngine<DeletedTransactions> {
        let limit = self.deleted_page_size(limit);
        let rows: Vec<transactions::Model> = transactions::Entity::find()
            .apply_clauses(vec![Clause::Owner(owner_id), Clause::Deleted])
            .order_by_desc(transactions::Column::DeletedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;

        let (records, skipped_rows) = decode_rows(rows);
        Ok(DeletedTransactions {
            records,
            limit,
            skipped_rows,
        })
    }
}
