use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{Debt, EngineError, ResultEngine, debts, users};

use super::{
    Engine, NewTransaction,
    transactions::{InsertTransaction, validate_amount},
    with_tx,
};

/// How an amount is divided between the creator of a shared expense and the
/// other participants.
///
/// Everyone gets `base_share`; the integer remainder goes to the first
/// listed participant, so the shares always add up to the amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub amount_minor: i64,
    /// The creator plus every listed participant.
    pub total_participants: i64,
    pub base_share: i64,
    pub remainder: i64,
}

impl SplitPlan {
    /// Plans a split of `amount_minor` between the creator and `others`
    /// listed participants.
    pub fn new(amount_minor: i64, others: usize) -> ResultEngine<Self> {
        validate_amount(amount_minor)?;
        if others == 0 {
            return Err(EngineError::InvalidParticipants(
                "at least one participant is required".to_string(),
            ));
        }
        let total_participants = i64::try_from(others)
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| {
                EngineError::InvalidParticipants("too many participants".to_string())
            })?;
        Ok(Self {
            amount_minor,
            total_participants,
            base_share: amount_minor / total_participants,
            remainder: amount_minor % total_participants,
        })
    }

    /// Share of the participant at `index` in input order.
    pub fn share_for(&self, index: usize) -> i64 {
        if index == 0 {
            self.base_share + self.remainder
        } else {
            self.base_share
        }
    }

    pub fn creator_share(&self) -> i64 {
        self.base_share
    }
}

/// Input of [`Engine::create_split`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewSplit {
    pub amount_minor: i64,
    /// Users sharing the expense with its creator, in input order.
    pub participant_ids: Vec<i64>,
    pub category_id: Option<i64>,
    pub description: Option<String>,
    /// Defaults to the creation time.
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub transaction_id: i64,
    pub per_participant_amount: i64,
    pub total_participants: i64,
    pub debts: Vec<Debt>,
    /// Listed ids that produced no debt: unknown users, the creator, repeats.
    pub skipped_participants: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEntry {
    pub debt_id: i64,
    pub counterparty_id: i64,
    pub counterparty_name: Option<String>,
    pub amount_minor: i64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_id: i64,
}

/// Debts of one user, newest first, not netted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLedger {
    pub owed_to_me: Vec<DebtEntry>,
    pub i_owe: Vec<DebtEntry>,
}

impl Engine {
    async fn existing_user_ids<C: ConnectionTrait>(
        &self,
        db: &C,
        ids: &[i64],
    ) -> ResultEngine<HashSet<i64>> {
        let found: Vec<i64> = users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .filter(users::Column::Id.is_in(ids.iter().copied()))
            .into_tuple()
            .all(db)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn usernames<C: ConnectionTrait>(
        &self,
        db: &C,
        ids: impl IntoIterator<Item = i64>,
    ) -> ResultEngine<HashMap<i64, String>> {
        let ids: HashSet<i64> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .column(users::Column::Username)
            .filter(users::Column::Id.is_in(ids))
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Records a shared expense of `creator_id` and the debts it creates.
    ///
    /// Every listed participant owes the creator their share. Ids that do not
    /// resolve to a distinct user other than the creator are skipped and
    /// reported; their share is not reassigned. The expense and its debts are
    /// written in one storage transaction.
    pub async fn create_split(
        &self,
        creator_id: i64,
        split: NewSplit,
    ) -> ResultEngine<SplitOutcome> {
        let plan = SplitPlan::new(split.amount_minor, split.participant_ids.len())?;

        let outcome = with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, creator_id).await?;
            let (category_id, _) = self
                .resolve_category_pair(&db_tx, split.category_id, None)
                .await?;

            let transaction = InsertTransaction {
                owner_id: creator_id,
                new: NewTransaction {
                    category_id,
                    description: split.description.clone(),
                    occurred_at: split.occurred_at,
                    ..NewTransaction::expense(split.amount_minor)
                },
                is_shared: true,
            }
            .into_active_model()
            .insert(&db_tx)
            .await?;

            let known = self
                .existing_user_ids(&db_tx, &split.participant_ids)
                .await?;
            let mut seen: HashSet<i64> = HashSet::new();
            let mut debts: Vec<Debt> = Vec::with_capacity(split.participant_ids.len());
            let mut skipped_participants: Vec<i64> = Vec::new();

            for (index, &participant_id) in split.participant_ids.iter().enumerate() {
                let reason = if participant_id == creator_id {
                    Some("participant is the creator")
                } else if !seen.insert(participant_id) {
                    Some("participant listed twice")
                } else if !known.contains(&participant_id) {
                    Some("participant not found")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    tracing::warn!(
                        creator_id,
                        participant_id,
                        transaction_id = transaction.id,
                        reason,
                        "skipping split participant"
                    );
                    skipped_participants.push(participant_id);
                    continue;
                }

                let amount_minor = plan.share_for(index);
                if amount_minor == 0 {
                    continue;
                }
                let model = debts::ActiveModel {
                    id: ActiveValue::NotSet,
                    transaction_id: ActiveValue::Set(transaction.id),
                    from_user: ActiveValue::Set(participant_id),
                    to_user: ActiveValue::Set(creator_id),
                    amount_minor: ActiveValue::Set(amount_minor),
                    is_paid: ActiveValue::Set(false),
                    paid_at: ActiveValue::Set(None),
                }
                .insert(&db_tx)
                .await?;
                debts.push(Debt::from(model));
            }

            Ok::<_, EngineError>(SplitOutcome {
                transaction_id: transaction.id,
                per_participant_amount: plan.base_share,
                total_participants: plan.total_participants,
                debts,
                skipped_participants,
            })
        })?;

        self.invalidate_ledger();
        tracing::info!(
            creator_id,
            transaction_id = outcome.transaction_id,
            amount_minor = plan.amount_minor,
            debts = outcome.debts.len(),
            skipped = outcome.skipped_participants.len(),
            "shared expense created"
        );
        Ok(outcome)
    }

    /// Lists the debts `viewer_id` is creditor or debtor of.
    pub async fn list_debts(&self, viewer_id: i64) -> ResultEngine<DebtLedger> {
        let owed_to_me: Vec<debts::Model> = debts::Entity::find()
            .filter(debts::Column::ToUser.eq(viewer_id))
            .order_by_desc(debts::Column::Id)
            .all(&self.database)
            .await?;
        let i_owe: Vec<debts::Model> = debts::Entity::find()
            .filter(debts::Column::FromUser.eq(viewer_id))
            .order_by_desc(debts::Column::Id)
            .all(&self.database)
            .await?;

        let names = self
            .usernames(
                &self.database,
                owed_to_me
                    .iter()
                    .map(|d| d.from_user)
                    .chain(i_owe.iter().map(|d| d.to_user)),
            )
            .await?;
        let entry = |model: debts::Model, counterparty_id: i64| DebtEntry {
            debt_id: model.id,
            counterparty_id,
            counterparty_name: names.get(&counterparty_id).cloned(),
            amount_minor: model.amount_minor,
            is_paid: model.is_paid,
            paid_at: model.paid_at,
            transaction_id: model.transaction_id,
        };

        Ok(DebtLedger {
            owed_to_me: owed_to_me
                .into_iter()
                .map(|d| {
                    let counterparty = d.from_user;
                    entry(d, counterparty)
                })
                .collect(),
            i_owe: i_owe
                .into_iter()
                .map(|d| {
                    let counterparty = d.to_user;
                    entry(d, counterparty)
                })
                .collect(),
        })
    }

    /// Marks an unpaid debt owed to `viewer_id` as returned.
    ///
    /// With `record_income` the returned amount is also booked as an income
    /// of the creditor, in the same storage transaction. Debts that do not
    /// exist, are owed to someone else or are already paid are `KeyNotFound`.
    pub async fn mark_debt_paid(
        &self,
        viewer_id: i64,
        debt_id: i64,
        paid_at: DateTime<Utc>,
        record_income: bool,
    ) -> ResultEngine<Debt> {
        let debt = with_tx!(self, |db_tx| {
            let model = debts::Entity::find_by_id(debt_id)
                .filter(debts::Column::ToUser.eq(viewer_id))
                .filter(debts::Column::IsPaid.eq(false))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("debt not exists".to_string()))?;

            let mut active: debts::ActiveModel = model.into();
            active.is_paid = ActiveValue::Set(true);
            active.paid_at = ActiveValue::Set(Some(paid_at));
            let model = active.update(&db_tx).await?;

            if record_income {
                InsertTransaction {
                    owner_id: viewer_id,
                    new: NewTransaction {
                        occurred_at: Some(paid_at),
                        description: Some(format!("debt return #{debt_id}")),
                        ..NewTransaction::income(model.amount_minor)
                    },
                    is_shared: false,
                }
                .into_active_model()
                .insert(&db_tx)
                .await?;
            }
            Ok::<_, EngineError>(Debt::from(model))
        })?;

        self.invalidate_ledger();
        tracing::info!(viewer_id, debt_id, record_income, "debt marked paid");
        Ok(debt)
    }
}
