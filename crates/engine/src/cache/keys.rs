//! Cache key shapes.
//!
//! Every key the engine reads or invalidates is built here, so readers and
//! writers cannot drift apart. Keys are `|`-separated `name=value` segments
//! prefixed by their domain; invalidation matches on the domain prefix or on
//! a single segment.

use std::fmt::Display;

use crate::{
    Scope,
    ops::{PageCursor, Period, TransactionFilter},
};

/// Prefix of every cached transaction page.
pub(crate) const TRANSACTIONS_DOMAIN: &str = "transactions|";

/// Prefix of every cached balance.
pub(crate) const BALANCE_DOMAIN: &str = "balance|";

fn opt<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Key of one page of [`Engine::query_transactions`].
///
/// Built from the normalized filter, so requests that only differ in a
/// dropped (malformed) date filter share an entry.
///
/// [`Engine::query_transactions`]: crate::Engine::query_transactions
pub(crate) fn transactions_page(
    viewer_id: i64,
    filter: &TransactionFilter,
    cursor: Option<&PageCursor>,
    limit: u64,
) -> String {
    format!(
        "{TRANSACTIONS_DOMAIN}viewer={viewer_id}|scope={}|op={}|cat={}|sub={}|start={}|end={}|cursor={}|limit={limit}",
        filter.scope.as_str(),
        opt(filter.operation_type.map(|op| op.as_str())),
        opt(filter.category_id),
        opt(filter.subcategory_id),
        opt(filter.start.map(|t| t.to_rfc3339())),
        opt(filter.end.map(|t| t.to_rfc3339())),
        opt(cursor.map(PageCursor::key_fragment)),
    )
}

/// Key of one [`Engine::compute_balance`] result.
///
/// [`Engine::compute_balance`]: crate::Engine::compute_balance
pub(crate) fn balance(viewer_id: i64, scope: Scope, period: Period) -> String {
    format!(
        "{BALANCE_DOMAIN}viewer={viewer_id}|scope={}|period={}",
        scope.as_str(),
        period.as_str()
    )
}

/// Segment shared by every key of a viewer, in any domain.
pub(crate) fn viewer_pattern(viewer_id: i64) -> String {
    format!("|viewer={viewer_id}|")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::OperationType;

    #[test]
    fn distinct_filters_never_collide() {
        let base = TransactionFilter::default();
        let expense = TransactionFilter {
            operation_type: Some(OperationType::Expense),
            ..TransactionFilter::default()
        };
        let category = TransactionFilter {
            category_id: Some(1),
            ..TransactionFilter::default()
        };
        let subcategory = TransactionFilter {
            subcategory_id: Some(1),
            ..TransactionFilter::default()
        };
        let family = TransactionFilter {
            scope: Scope::Family,
            ..TransactionFilter::default()
        };

        let keys = [
            transactions_page(1, &base, None, 20),
            transactions_page(2, &base, None, 20),
            transactions_page(1, &base, None, 10),
            transactions_page(1, &expense, None, 20),
            transactions_page(1, &category, None, 20),
            transactions_page(1, &subcategory, None, 20),
            transactions_page(1, &family, None, 20),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn cursor_is_part_of_the_key() {
        let filter = TransactionFilter::default();
        let cursor = PageCursor {
            occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            transaction_id: Some(42),
        };
        assert_ne!(
            transactions_page(1, &filter, None, 20),
            transactions_page(1, &filter, Some(&cursor), 20)
        );
        assert_eq!(
            transactions_page(1, &filter, Some(&cursor), 20),
            transactions_page(1, &filter, Some(&cursor), 20)
        );
    }

    #[test]
    fn viewer_pattern_matches_only_that_viewer() {
        let filter = TransactionFilter::default();
        let key_1 = transactions_page(1, &filter, None, 20);
        let key_12 = transactions_page(12, &filter, None, 20);
        assert!(key_1.contains(&viewer_pattern(1)));
        assert!(!key_12.contains(&viewer_pattern(1)));
        assert!(balance(1, Scope::All, Period::Week).contains(&viewer_pattern(1)));
    }

    #[test]
    fn domains_are_disjoint() {
        let page = transactions_page(1, &TransactionFilter::default(), None, 20);
        let bal = balance(1, Scope::All, Period::All);
        assert!(page.starts_with(TRANSACTIONS_DOMAIN));
        assert!(!page.contains(BALANCE_DOMAIN));
        assert!(bal.starts_with(BALANCE_DOMAIN));
        assert!(!bal.contains(TRANSACTIONS_DOMAIN));
    }
}
