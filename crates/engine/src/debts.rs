//! Debt ledger rows produced by expense splits.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `from_user` owes `amount_minor` to `to_user` for the shared expense
/// `transaction_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: i64,
    pub transaction_id: i64,
    pub from_user: i64,
    pub to_user: i64,
    pub amount_minor: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_id: i64,
    pub from_user: i64,
    pub to_user: i64,
    pub amount_minor: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Debt {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            transaction_id: model.transaction_id,
            from_user: model.from_user,
            to_user: model.to_user,
            amount_minor: model.amount_minor,
            is_paid: model.is_paid,
            paid_at: model.paid_at,
        }
    }
}
