use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Personal,
    Family,
    #[default]
    All,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Family => "family",
            Self::All => "all",
        }
    }
}

pub mod membership {
    use super::*;

    /// Role of a user in a group.
    ///
    /// - `owner`: created or administers the group.
    /// - `member`: sees the group's non-private records.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MembershipRole {
        Owner,
        Member,
    }

    impl MembershipRole {
        /// Returns the canonical role string used by the engine/database.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Owner => "owner",
                Self::Member => "member",
            }
        }
    }

    /// Request body for adding a member or changing their role.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberUpsert {
        pub user_id: i64,
        pub role: MembershipRole,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum OperationType {
        Expense,
        Income,
    }

    /// List request. Every field is optional.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        /// `expense`, `income` or `both` (default).
        pub operation_type: Option<String>,
        pub category_id: Option<i64>,
        pub subcategory_id: Option<i64>,
        /// RFC3339, inclusive. Malformed values are ignored.
        pub start: Option<String>,
        /// RFC3339, inclusive. Malformed values are ignored.
        pub end: Option<String>,
        pub scope: Option<Scope>,
        /// Opaque pagination cursor, from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: i64,
        pub owner_id: i64,
        pub amount_minor: i64,
        pub operation_type: OperationType,
        pub category_id: Option<i64>,
        pub subcategory_id: Option<i64>,
        pub occurred_at: DateTime<Utc>,
        pub group_id: Option<i64>,
        pub is_private: bool,
        pub is_shared: bool,
        pub description: Option<String>,
        pub deleted_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Pagination {
        pub limit: u64,
        pub has_more: bool,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub records: Vec<TransactionView>,
        pub pagination: Pagination,
        /// Stored rows left out because they could not be decoded.
        pub skipped_rows: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub amount_minor: i64,
        pub operation_type: OperationType,
        pub category_id: Option<i64>,
        pub subcategory_id: Option<i64>,
        /// RFC3339 timestamp, including timezone offset. Defaults to now.
        pub occurred_at: Option<DateTime<FixedOffset>>,
        pub group_id: Option<i64>,
        #[serde(default)]
        pub is_private: bool,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: i64,
    }

    /// Names the record a delete or restore acted on.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionRef {
        pub id: i64,
        pub deleted: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DeletedListResponse {
        pub records: Vec<TransactionView>,
        pub limit: u64,
        pub skipped_rows: u64,
    }
}

pub mod split {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitNew {
        pub amount: i64,
        /// User ids sharing the expense with the caller.
        pub participants: Vec<i64>,
        pub category_id: Option<i64>,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitCreated {
        pub transaction_id: i64,
        pub per_participant_amount: i64,
        pub total_participants: i64,
        pub skipped_participants: Vec<i64>,
    }
}

pub mod balance {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Period {
        #[default]
        All,
        Week,
        Month,
    }

    impl Period {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::All => "all",
                Self::Week => "week",
                Self::Month => "month",
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceResponse {
        pub scope: Scope,
        pub period: Period,
        pub total_income: i64,
        pub total_expense: i64,
        pub net_balance: i64,
    }
}

pub mod debt {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DebtView {
        pub id: i64,
        pub counterparty_id: i64,
        pub counterparty_name: Option<String>,
        pub amount: i64,
        pub is_paid: bool,
        pub paid_at: Option<DateTime<Utc>>,
        pub transaction_id: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DebtsResponse {
        pub owed_to_me: Vec<DebtView>,
        pub i_owe: Vec<DebtView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DebtPaid {
        pub id: i64,
        pub paid_at: Option<DateTime<Utc>>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_request_fields_are_optional() {
        let req: transaction::TransactionList = serde_json::from_str("{}").unwrap();
        assert!(req.scope.is_none());
        assert!(req.cursor.is_none());

        let req: transaction::TransactionList =
            serde_json::from_str(r#"{"scope":"family","limit":5}"#).unwrap();
        assert_eq!(req.scope, Some(Scope::Family));
        assert_eq!(req.limit, Some(5));
    }

    #[test]
    fn transaction_ref_reports_deleted_state() {
        let body = serde_json::to_value(transaction::TransactionRef {
            id: 7,
            deleted: true,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "id": 7, "deleted": true }));
    }

    #[test]
    fn roles_use_engine_names() {
        let role: membership::MembershipRole = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role.as_str(), "member");
    }
}
