//! Which transaction records a viewer may see.
//!
//! A [`Visibility`] is resolved once per request from the viewer's group
//! memberships and the requested [`Scope`]. It renders to a storage
//! [`Condition`] and can also be checked against an in-memory record; both
//! forms encode the same rule:
//!
//! - `personal`: the viewer's own records.
//! - `family`: non-private records of the viewer's groups, owned by someone
//!   else.
//! - `all`: the union of the two.
//!
//! When the viewer has no groups the group disjunct is dropped entirely,
//! never rendered as an empty `IN ()`.

use sea_orm::{Condition, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Transaction, transactions};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

impl TryFrom<&str> for Scope {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "" | "all" => Ok(Self::All),
            "personal" => Ok(Self::Personal),
            "family" => Ok(Self::Family),
            other => Err(EngineError::InvalidScope(format!(
                "scope must be 'personal', 'family' or 'all', got '{other}'"
            ))),
        }
    }
}

/// Resolved visibility predicate for one viewer and scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Visibility {
    viewer_id: i64,
    scope: Scope,
    group_ids: Vec<i64>,
    degraded: bool,
}

impl Visibility {
    pub fn new(viewer_id: i64, scope: Scope, mut group_ids: Vec<i64>) -> Self {
        group_ids.sort_unstable();
        group_ids.dedup();
        Self {
            viewer_id,
            scope,
            group_ids,
            degraded: false,
        }
    }

    /// Visibility used when group memberships could not be loaded: the group
    /// set is taken as empty, so nothing beyond the viewer's own records is
    /// ever admitted.
    pub fn degraded(viewer_id: i64, scope: Scope) -> Self {
        Self {
            viewer_id,
            scope,
            group_ids: Vec::new(),
            degraded: true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn group_condition(&self) -> Option<Condition> {
        if self.group_ids.is_empty() {
            return None;
        }
        Some(
            Condition::all()
                .add(transactions::Column::GroupId.is_in(self.group_ids.iter().copied()))
                .add(transactions::Column::IsPrivate.eq(false)),
        )
    }

    /// Storage predicate admitting exactly the visible records.
    pub fn condition(&self) -> Condition {
        let own = transactions::Column::OwnerId.eq(self.viewer_id);
        match (self.scope, self.group_condition()) {
            (Scope::Personal, _) | (Scope::All, None) => Condition::all().add(own),
            (Scope::Family, None) => Condition::all().add(Expr::val(1).eq(0)),
            (Scope::Family, Some(groups)) => groups.add(
                transactions::Column::OwnerId.ne(self.viewer_id),
            ),
            (Scope::All, Some(groups)) => Condition::any().add(own).add(groups),
        }
    }

    fn in_shared_group(&self, record: &Transaction) -> bool {
        !record.is_private
            && record
                .group_id
                .is_some_and(|group_id| self.group_ids.binary_search(&group_id).is_ok())
    }

    /// In-memory form of [`Visibility::condition`].
    pub fn admits(&self, record: &Transaction) -> bool {
        let own = record.owner_id == self.viewer_id;
        match self.scope {
            Scope::Personal => own,
            Scope::Family => !own && self.in_shared_group(record),
            Scope::All => own || self.in_shared_group(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use sea_orm::{DbBackend, QueryFilter, QueryTrait};

    use super::*;
    use crate::OperationType;

    fn record(id: i64, owner_id: i64, group_id: Option<i64>, is_private: bool) -> Transaction {
        Transaction {
            id,
            owner_id,
            amount_minor: 100,
            operation_type: OperationType::Expense,
            category_id: None,
            subcategory_id: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            group_id,
            is_private: group_id.is_some() && is_private,
            is_shared: false,
            description: None,
            deleted_at: None,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            record(1, 1, None, false),
            record(2, 1, Some(10), false),
            record(3, 1, Some(10), true),
            record(4, 2, Some(10), false),
            record(5, 2, Some(10), true),
            record(6, 2, None, false),
            record(7, 3, Some(20), false),
            record(8, 3, Some(10), false),
        ]
    }

    fn visible(vis: &Visibility, records: &[Transaction]) -> Vec<i64> {
        records
            .iter()
            .filter(|r| vis.admits(r))
            .map(|r| r.id)
            .collect()
    }

    fn sql(vis: &Visibility) -> String {
        transactions::Entity::find()
            .filter(vis.condition())
            .build(DbBackend::Sqlite)
            .to_string()
    }

    #[test]
    fn parses_scope_names() {
        assert_eq!(Scope::try_from("").unwrap(), Scope::All);
        assert_eq!(Scope::try_from("all").unwrap(), Scope::All);
        assert_eq!(Scope::try_from("personal").unwrap(), Scope::Personal);
        assert_eq!(Scope::try_from(" family ").unwrap(), Scope::Family);
        assert!(matches!(
            Scope::try_from("everyone"),
            Err(EngineError::InvalidScope(_))
        ));
    }

    #[test]
    fn scopes_admit_expected_records() {
        let records = sample();
        let personal = Visibility::new(1, Scope::Personal, vec![10]);
        let family = Visibility::new(1, Scope::Family, vec![10]);
        let all = Visibility::new(1, Scope::All, vec![10]);

        assert_eq!(visible(&personal, &records), vec![1, 2, 3]);
        assert_eq!(visible(&family, &records), vec![4, 8]);
        assert_eq!(visible(&all, &records), vec![1, 2, 3, 4, 8]);
    }

    #[test]
    fn personal_and_family_partition_all() {
        let records = sample();
        for viewer in 1..=3 {
            let groups = match viewer {
                1 | 2 => vec![10],
                _ => vec![10, 20],
            };
            let personal = visible(&Visibility::new(viewer, Scope::Personal, groups.clone()), &records);
            let family = visible(&Visibility::new(viewer, Scope::Family, groups.clone()), &records);
            let all = visible(&Visibility::new(viewer, Scope::All, groups), &records);

            assert!(personal.iter().all(|id| !family.contains(id)));
            let mut union: Vec<i64> = personal.into_iter().chain(family).collect();
            union.sort_unstable();
            assert_eq!(union, all);
        }
    }

    #[test]
    fn no_groups_collapses_to_own_records() {
        let records = sample();
        let all = Visibility::new(2, Scope::All, Vec::new());
        let family = Visibility::new(2, Scope::Family, Vec::new());
        assert_eq!(visible(&all, &records), vec![4, 5, 6]);
        assert!(visible(&family, &records).is_empty());
        assert!(!sql(&all).contains(" IN "));
        assert!(!sql(&family).contains(" IN "));
    }

    #[test]
    fn degraded_visibility_never_reaches_groups() {
        let records = sample();
        let all = Visibility::degraded(1, Scope::All);
        assert!(all.is_degraded());
        assert_eq!(visible(&all, &records), vec![1, 2, 3]);
        assert!(visible(&Visibility::degraded(1, Scope::Family), &records).is_empty());
    }

    #[test]
    fn group_condition_renders_membership_test() {
        let sql = sql(&Visibility::new(1, Scope::All, vec![20, 10, 10]));
        assert!(sql.contains("IN (10, 20)"));
        assert!(sql.contains("\"owner_id\" = 1"));
    }
}
