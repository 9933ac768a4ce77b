use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{ActiveValue, Condition, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, OperationType, ResultEngine, Scope, Transaction, Visibility, transactions,
};

use super::{Engine, normalize_optional_text, with_tx};

mod deleted;
mod list;

pub use deleted::DeletedTransactions;
pub use list::TransactionPage;

/// Raw list filters as they arrive from a caller.
///
/// Turned into a [`TransactionFilter`] by [`TransactionFilter::from_params`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// `expense`, `income`, `both` or empty.
    pub operation_type: Option<String>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    /// RFC 3339, inclusive.
    pub start: Option<String>,
    /// RFC 3339, inclusive.
    pub end: Option<String>,
    /// `personal`, `family`, `all` or empty.
    pub scope: Option<String>,
}

/// Validated list filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub scope: Scope,
    /// `None` means both operation types.
    pub operation_type: Option<OperationType>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

fn parse_filter_time(label: &'static str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(err) => {
            tracing::debug!(filter = label, value = raw, error = %err, "dropping malformed date filter");
            None
        }
    }
}

impl TransactionFilter {
    /// Validates raw filters.
    ///
    /// Unknown scopes and operation types are rejected. Malformed dates are
    /// dropped and the query runs without them.
    pub fn from_params(params: &FilterParams) -> ResultEngine<Self> {
        let scope = Scope::try_from(params.scope.as_deref().unwrap_or_default())?;
        let operation_type = match params.operation_type.as_deref().map(str::trim) {
            None | Some("") | Some("both") => None,
            Some(other) => Some(OperationType::try_from(other)?),
        };
        Ok(Self {
            scope,
            operation_type,
            category_id: params.category_id,
            subcategory_id: params.subcategory_id,
            start: parse_filter_time("start", params.start.as_deref()),
            end: parse_filter_time("end", params.end.as_deref()),
        })
    }

    pub(super) fn clauses(&self, visibility: &Visibility) -> Vec<Clause> {
        let mut clauses = vec![Clause::Active, Clause::Visible(visibility.condition())];
        if let Some(op) = self.operation_type {
            clauses.push(Clause::OperationType(op));
        }
        if let Some(id) = self.category_id {
            clauses.push(Clause::Category(id));
        }
        if let Some(id) = self.subcategory_id {
            clauses.push(Clause::Subcategory(id));
        }
        if let Some(start) = self.start {
            clauses.push(Clause::OccurredFrom(start));
        }
        if let Some(end) = self.end {
            clauses.push(Clause::OccurredUntil(end));
        }
        clauses
    }
}

/// One typed restriction on the `transactions` table.
#[derive(Clone, Debug)]
pub(super) enum Clause {
    Active,
    Deleted,
    Owner(i64),
    OperationType(OperationType),
    Category(i64),
    Subcategory(i64),
    OccurredFrom(DateTime<Utc>),
    OccurredUntil(DateTime<Utc>),
    Visible(Condition),
    Before(PageCursor),
}

impl Clause {
    fn into_condition(self) -> Condition {
        let all = Condition::all();
        match self {
            Self::Active => all.add(transactions::Column::DeletedAt.is_null()),
            Self::Deleted => all.add(transactions::Column::DeletedAt.is_not_null()),
            Self::Owner(id) => all.add(transactions::Column::OwnerId.eq(id)),
            Self::OperationType(op) => {
                all.add(transactions::Column::OperationType.eq(op.as_str()))
            }
            Self::Category(id) => all.add(transactions::Column::CategoryId.eq(id)),
            Self::Subcategory(id) => all.add(transactions::Column::SubcategoryId.eq(id)),
            Self::OccurredFrom(t) => all.add(transactions::Column::OccurredAt.gte(t)),
            Self::OccurredUntil(t) => all.add(transactions::Column::OccurredAt.lte(t)),
            Self::Visible(condition) => condition,
            Self::Before(cursor) => cursor.condition(),
        }
    }
}

pub(super) trait ApplyClauses: QueryFilter + Sized {
    fn apply_clauses(self, clauses: Vec<Clause>) -> Self;
}

impl<T> ApplyClauses for T
where
    T: QueryFilter + Sized,
{
    fn apply_clauses(self, clauses: Vec<Clause>) -> Self {
        let condition = clauses
            .into_iter()
            .fold(Condition::all(), |acc, clause| acc.add(clause.into_condition()));
        self.filter(condition)
    }
}

/// Position after the last record of a page.
///
/// Records are ordered by `(occurred_at DESC, id DESC)`; the next page
/// starts strictly after `(occurred_at, transaction_id)`. A cursor without
/// an id (a bare RFC 3339 timestamp) only compares timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i64>,
}

impl PageCursor {
    pub fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(input: &str) -> ResultEngine<Self> {
        let input = input.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(input) {
            return Ok(Self {
                occurred_at: t.with_timezone(&Utc),
                transaction_id: None,
            });
        }
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }

    /// Stable textual form used inside cache keys.
    pub(crate) fn key_fragment(&self) -> String {
        match self.transaction_id {
            Some(id) => format!("{}#{id}", self.occurred_at.to_rfc3339()),
            None => self.occurred_at.to_rfc3339(),
        }
    }

    fn condition(&self) -> Condition {
        let before = transactions::Column::OccurredAt.lt(self.occurred_at);
        match self.transaction_id {
            None => Condition::all().add(before),
            Some(id) => Condition::any().add(before).add(
                Condition::all()
                    .add(transactions::Column::OccurredAt.eq(self.occurred_at))
                    .add(transactions::Column::Id.lt(id)),
            ),
        }
    }
}

/// Input of [`Engine::create_transaction`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    pub amount_minor: i64,
    pub operation_type: OperationType,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    /// Defaults to the creation time.
    pub occurred_at: Option<DateTime<Utc>>,
    pub group_id: Option<i64>,
    /// Only meaningful together with `group_id`.
    pub is_private: bool,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn expense(amount_minor: i64) -> Self {
        Self::new(amount_minor, OperationType::Expense)
    }

    pub fn income(amount_minor: i64) -> Self {
        Self::new(amount_minor, OperationType::Income)
    }

    fn new(amount_minor: i64, operation_type: OperationType) -> Self {
        Self {
            amount_minor,
            operation_type,
            category_id: None,
            subcategory_id: None,
            occurred_at: None,
            group_id: None,
            is_private: false,
            description: None,
        }
    }
}

pub(super) fn validate_amount(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(
            "amount_minor must be > 0".to_string(),
        ));
    }
    Ok(())
}

pub(super) struct InsertTransaction {
    pub(super) owner_id: i64,
    pub(super) new: NewTransaction,
    pub(super) is_shared: bool,
}

impl InsertTransaction {
    pub(super) fn into_active_model(self) -> transactions::ActiveModel {
        let new = self.new;
        transactions::ActiveModel {
            id: ActiveValue::NotSet,
            owner_id: ActiveValue::Set(self.owner_id),
            amount_minor: ActiveValue::Set(new.amount_minor),
            operation_type: ActiveValue::Set(new.operation_type.as_str().to_string()),
            category_id: ActiveValue::Set(new.category_id),
            subcategory_id: ActiveValue::Set(new.subcategory_id),
            occurred_at: ActiveValue::Set(new.occurred_at.unwrap_or_else(Utc::now)),
            group_id: ActiveValue::Set(new.group_id),
            is_private: ActiveValue::Set(new.group_id.is_some() && new.is_private),
            is_shared: ActiveValue::Set(self.is_shared),
            description: ActiveValue::Set(normalize_optional_text(new.description.as_deref())),
            deleted_at: ActiveValue::Set(None),
        }
    }
}

impl Engine {
    /// Records an expense or income owned by `owner_id`.
    ///
    /// A subcategory must belong to the given category (the category is
    /// filled in when only the subcategory is given). A `group_id` requires
    /// the owner to be a member of that group.
    pub async fn create_transaction(
        &self,
        owner_id: i64,
        new: NewTransaction,
    ) -> ResultEngine<Transaction> {
        validate_amount(new.amount_minor)?;
        let transaction = with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, owner_id).await?;
            let (category_id, subcategory_id) = self
                .resolve_category_pair(&db_tx, new.category_id, new.subcategory_id)
                .await?;
            if let Some(group_id) = new.group_id {
                self.require_group_member(&db_tx, group_id, owner_id)
                    .await?;
            }

            let model = InsertTransaction {
                owner_id,
                new: NewTransaction {
                    category_id,
                    subcategory_id,
                    ..new
                },
                is_shared: false,
            }
            .into_active_model()
            .insert(&db_tx)
            .await?;
            Transaction::try_from(model)
        })?;

        self.invalidate_ledger();
        tracing::info!(
            owner_id,
            transaction_id = transaction.id,
            operation_type = transaction.operation_type.as_str(),
            "transaction created"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sea_orm::{DbBackend, QueryTrait, Value};

    use super::*;

    fn params() -> FilterParams {
        FilterParams::default()
    }

    #[test]
    fn empty_params_mean_everything_visible() {
        let filter = TransactionFilter::from_params(&params()).unwrap();
        assert_eq!(filter, TransactionFilter::default());
        assert_eq!(filter.scope, Scope::All);
    }

    #[test]
    fn both_means_no_operation_filter() {
        let filter = TransactionFilter::from_params(&FilterParams {
            operation_type: Some("both".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(filter.operation_type, None);

        let filter = TransactionFilter::from_params(&FilterParams {
            operation_type: Some("income".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(filter.operation_type, Some(OperationType::Income));
    }

    #[test]
    fn rejects_unknown_scope_and_operation() {
        let err = TransactionFilter::from_params(&FilterParams {
            scope: Some("public".to_string()),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidScope(_)));

        let err = TransactionFilter::from_params(&FilterParams {
            operation_type: Some("transfer".to_string()),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation(_)));
    }

    #[test]
    fn malformed_dates_are_dropped() {
        let filter = TransactionFilter::from_params(&FilterParams {
            start: Some("yesterday".to_string()),
            end: Some("2024-02-01T00:00:00+02:00".to_string()),
            ..params()
        })
        .unwrap();
        assert_eq!(filter.start, None);
        assert_eq!(
            filter.end,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap())
        );
    }

    #[test]
    fn cursor_round_trips_through_token() {
        let cursor = PageCursor {
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
            transaction_id: Some(17),
        };
        let token = cursor.encode().unwrap();
        assert!(!token.contains('='));
        assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn bare_timestamp_cursor_is_accepted() {
        let cursor = PageCursor::decode("2024-03-01T08:30:00Z").unwrap();
        assert_eq!(cursor.transaction_id, None);
        assert_eq!(cursor.key_fragment(), "2024-03-01T08:30:00+00:00");
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        assert!(matches!(
            PageCursor::decode("not a cursor!"),
            Err(EngineError::InvalidCursor(_))
        ));
        let not_json = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"[1,2]");
        assert!(matches!(
            PageCursor::decode(&not_json),
            Err(EngineError::InvalidCursor(_))
        ));
    }

    #[test]
    fn clauses_render_as_one_parameterized_condition() {
        let filter = TransactionFilter {
            operation_type: Some(OperationType::Expense),
            category_id: Some(4),
            ..TransactionFilter::default()
        };
        let visibility = Visibility::new(9, Scope::Personal, Vec::new());
        let stmt = transactions::Entity::find()
            .apply_clauses(filter.clauses(&visibility))
            .build(DbBackend::Sqlite);
        assert!(stmt.sql.contains("\"deleted_at\" IS NULL"));
        assert!(stmt.sql.contains("\"operation_type\" = ?"));
        assert!(stmt.sql.contains("\"category_id\" = ?"));
        assert!(!stmt.sql.contains("expense"));
        let values = stmt.values.map(|v| v.0).unwrap_or_default();
        assert!(values.contains(&Value::from("expense")));
    }

    #[test]
    fn composite_cursor_breaks_timestamp_ties() {
        let cursor = PageCursor {
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
            transaction_id: Some(17),
        };
        let sql = transactions::Entity::find()
            .apply_clauses(vec![Clause::Before(cursor)])
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.contains(" OR "));
        assert!(sql.contains("\"id\" < 17"));
    }
}
