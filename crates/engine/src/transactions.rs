//! Transaction primitives.
//!
//! A `Transaction` is a single expense or income recorded by its owner,
//! optionally shared with a group. Records are never physically removed:
//! `deleted_at` marks them as soft-deleted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Expense,
    Income,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl TryFrom<&str> for OperationType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(EngineError::InvalidOperation(format!(
                "operation_type must be 'expense' or 'income', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
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

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: i64,
    pub amount_minor: i64,
    pub operation_type: String,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub occurred_at: DateTimeUtc,
    pub group_id: Option<i64>,
    pub is_private: bool,
    pub is_shared: bool,
    pub description: Option<String>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::debts::Entity")]
    Debts,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::debts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        if model.amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(format!(
                "stored transaction {} has a non-positive amount",
                model.id
            )));
        }
        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            amount_minor: model.amount_minor,
            operation_type: OperationType::try_from(model.operation_type.as_str())?,
            category_id: model.category_id,
            subcategory_id: model.subcategory_id,
            occurred_at: model.occurred_at,
            group_id: model.group_id,
            is_private: model.group_id.is_some() && model.is_private,
            is_shared: model.is_shared,
            description: model.description,
            deleted_at: model.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn model() -> Model {
        Model {
            id: 1,
            owner_id: 7,
            amount_minor: 5000,
            operation_type: "expense".to_string(),
            category_id: Some(3),
            subcategory_id: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            group_id: None,
            is_private: true,
            is_shared: false,
            description: None,
            deleted_at: None,
        }
    }

    #[test]
    fn decodes_valid_row() {
        let tx = Transaction::try_from(model()).unwrap();
        assert_eq!(tx.operation_type, OperationType::Expense);
        assert_eq!(tx.amount_minor, 5000);
        // Privacy only means something for group records.
        assert!(!tx.is_private);
    }

    #[test]
    fn rejects_unknown_operation_type() {
        let mut m = model();
        m.operation_type = "refund".to_string();
        assert!(matches!(
            Transaction::try_from(m),
            Err(EngineError::InvalidOperation(_))
        ));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut m = model();
        m.amount_minor = 0;
        assert!(Transaction::try_from(m).is_err());
    }
}
