use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use sea_orm::{QuerySelect, prelude::*};

use crate::{EngineError, OperationType, ResultEngine, Scope, cache::keys, transactions};

use super::{
    CachedValue, Engine,
    transactions::{ApplyClauses, Clause},
};

/// Time window of a balance, counted back from "now".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    All,
    /// The last 7 days.
    Week,
    /// The last 30 days.
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

    /// Inclusive start of the window ending at `now`; `None` is unbounded.
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
        }
    }
}

impl TryFrom<&str> for Period {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "" | "all" => Ok(Self::All),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(EngineError::InvalidPeriod(format!(
                "period must be 'week', 'month' or 'all', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total_income: i64,
    pub total_expense: i64,
    /// `total_income - total_expense`.
    pub net_balance: i64,
}

impl Balance {
    fn add(mut self, operation_type: OperationType, amount_minor: i64) -> ResultEngine<Self> {
        let overflow = || EngineError::InvalidAmount("balance overflow".to_string());
        match operation_type {
            OperationType::Income => {
                self.total_income = self.total_income.checked_add(amount_minor).ok_or_else(overflow)?;
                self.net_balance = self.net_balance.checked_add(amount_minor).ok_or_else(overflow)?;
            }
            OperationType::Expense => {
                self.total_expense = self.total_expense.checked_add(amount_minor).ok_or_else(overflow)?;
                self.net_balance = self.net_balance.checked_sub(amount_minor).ok_or_else(overflow)?;
            }
        }
        Ok(self)
    }
}

impl Engine {
    /// Sums the active transactions `viewer_id` may see under `scope` whose
    /// timestamp falls in `period` before `now`.
    ///
    /// Cached per viewer, scope and period.
    pub async fn compute_balance(
        &self,
        viewer_id: i64,
        scope: Scope,
        period: Period,
        now: DateTime<Utc>,
    ) -> ResultEngine<Balance> {
        let key = keys::balance(viewer_id, scope, period);
        if let Some(CachedValue::Balance(balance)) = self.cache.get(&key) {
            tracing::trace!(viewer_id, "balance served from cache");
            return Ok(balance);
        }

        let visibility = self.resolve_visibility(viewer_id, scope).await;
        let mut clauses = vec![Clause::Active, Clause::Visible(visibility.condition())];
        if let Some(start) = period.window_start(now) {
            clauses.push(Clause::OccurredFrom(start));
        }

        let rows: Vec<(String, i64)> = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::OperationType)
            .column(transactions::Column::AmountMinor)
            .apply_clauses(clauses)
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut balance = Balance::default();
        for (operation_type, amount_minor) in rows {
            match OperationType::try_from(operation_type.as_str()) {
                Ok(op) if amount_minor > 0 => balance = balance.add(op, amount_minor)?,
                _ => tracing::warn!(
                    viewer_id,
                    operation_type = %operation_type,
                    amount_minor,
                    "skipping undecodable row in balance"
                ),
            }
        }

        if !visibility.is_degraded() {
            self.cache
                .set(key, CachedValue::Balance(balance), self.config.balance_ttl);
        }
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_periods() {
        assert_eq!(Period::try_from("").unwrap(), Period::All);
        assert_eq!(Period::try_from("week").unwrap(), Period::Week);
        assert_eq!(Period::try_from("month").unwrap(), Period::Month);
        assert!(matches!(
            Period::try_from("year"),
            Err(EngineError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn windows_count_back_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(Period::All.window_start(now), None);
        assert_eq!(
            Period::Week.window_start(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 24, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Period::Month.window_start(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn balance_nets_income_against_expense() {
        let balance = Balance::default()
            .add(OperationType::Income, 1_000)
            .and_then(|b| b.add(OperationType::Expense, 1_500))
            .unwrap();
        assert_eq!(balance.total_income, 1_000);
        assert_eq!(balance.total_expense, 1_500);
        assert_eq!(balance.net_balance, -500);
    }

    #[test]
    fn balance_overflow_is_an_error() {
        let balance = Balance::default().add(OperationType::Income, i64::MAX).unwrap();
        assert!(balance.add(OperationType::Income, 1).is_err());
    }
}
