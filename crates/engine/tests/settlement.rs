use chrono::Duration;

use engine::{
    Balance, EngineError, NewSplit, NewTransaction, Period, Scope, TransactionFilter,
};

mod common;

use common::{day, engine_with_db, expense_at, family, income_at};

fn split(amount_minor: i64, participant_ids: Vec<i64>) -> NewSplit {
    NewSplit {
        amount_minor,
        participant_ids,
        category_id: None,
        description: Some("dinner".to_string()),
        occurred_at: Some(day(1)),
    }
}

#[tokio::test]
async fn split_creates_debts_with_remainder_on_first_participant() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;

    let outcome = engine
        .create_split(f.alice, split(100, vec![f.bob, f.carol]))
        .await
        .unwrap();
    assert_eq!(outcome.total_participants, 3);
    assert_eq!(outcome.per_participant_amount, 33);
    assert!(outcome.skipped_participants.is_empty());

    let owed: Vec<(i64, i64)> = outcome
        .debts
        .iter()
        .map(|d| (d.from_user, d.amount_minor))
        .collect();
    assert_eq!(owed, vec![(f.bob, 34), (f.carol, 33)]);
    assert!(outcome.debts.iter().all(|d| d.to_user == f.alice && !d.is_paid));

    // The full amount is a shared expense of the creator.
    let page = engine
        .query_transactions(f.alice, &TransactionFilter::default(), None, None)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    let expense = &page.records[0];
    assert_eq!(expense.id, outcome.transaction_id);
    assert_eq!(expense.amount_minor, 100);
    assert!(expense.is_shared);
}

#[tokio::test]
async fn split_skips_creator_repeats_and_unknown_users() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;

    let outcome = engine
        .create_split(f.alice, split(90, vec![f.bob, f.alice, f.bob, 4242]))
        .await
        .unwrap();
    assert_eq!(outcome.total_participants, 5);
    assert_eq!(outcome.skipped_participants, vec![f.alice, f.bob, 4242]);
    assert_eq!(outcome.debts.len(), 1);
    assert_eq!(outcome.debts[0].from_user, f.bob);
    assert_eq!(outcome.debts[0].amount_minor, 18);
}

#[tokio::test]
async fn split_validation_fails_before_writing() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;

    let err = engine
        .create_split(f.alice, split(100, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParticipants(_)));

    let err = engine
        .create_split(f.alice, split(0, vec![f.bob]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .create_split(
            f.alice,
            NewSplit {
                category_id: Some(77),
                ..split(100, vec![f.bob])
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCategory(_)));

    let page = engine
        .query_transactions(f.alice, &TransactionFilter::default(), None, None)
        .await
        .unwrap();
    assert!(page.records.is_empty());
    assert!(engine.list_debts(f.bob).await.unwrap().i_owe.is_empty());
}

#[tokio::test]
async fn debts_are_listed_from_both_sides() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;
    engine
        .create_split(f.alice, split(100, vec![f.bob]))
        .await
        .unwrap();
    engine
        .create_split(f.bob, split(40, vec![f.alice]))
        .await
        .unwrap();

    let ledger = engine.list_debts(f.alice).await.unwrap();
    assert_eq!(ledger.owed_to_me.len(), 1);
    assert_eq!(ledger.owed_to_me[0].counterparty_id, f.bob);
    assert_eq!(ledger.owed_to_me[0].counterparty_name.as_deref(), Some("bob"));
    assert_eq!(ledger.owed_to_me[0].amount_minor, 50);
    assert_eq!(ledger.i_owe.len(), 1);
    assert_eq!(ledger.i_owe[0].counterparty_name.as_deref(), Some("bob"));
    assert_eq!(ledger.i_owe[0].amount_minor, 20);

    assert!(engine.list_debts(f.carol).await.unwrap().owed_to_me.is_empty());
}

#[tokio::test]
async fn only_the_creditor_marks_a_debt_paid() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;
    let outcome = engine
        .create_split(f.alice, split(100, vec![f.bob]))
        .await
        .unwrap();
    let debt_id = outcome.debts[0].id;

    let err = engine
        .mark_debt_paid(f.bob, debt_id, day(3), false)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("debt not exists".to_string()));

    let paid = engine
        .mark_debt_paid(f.alice, debt_id, day(3), true)
        .await
        .unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.paid_at, Some(day(3)));

    let err = engine
        .mark_debt_paid(f.alice, debt_id, day(4), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let ledger = engine.list_debts(f.bob).await.unwrap();
    assert!(ledger.i_owe[0].is_paid);

    // The returned amount is booked as an income of the creditor.
    let balance = engine
        .compute_balance(f.alice, Scope::Personal, Period::All, day(10))
        .await
        .unwrap();
    assert_eq!(
        balance,
        Balance {
            total_income: 50,
            total_expense: 100,
            net_balance: -50,
        }
    );
}

#[tokio::test]
async fn balance_follows_scope_and_period() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;
    let now = day(60);

    engine
        .create_transaction(f.alice, income_at(1000, now - Duration::days(2)))
        .await
        .unwrap();
    engine
        .create_transaction(f.alice, expense_at(300, now - Duration::days(10)))
        .await
        .unwrap();
    engine
        .create_transaction(f.alice, expense_at(50, now - Duration::days(40)))
        .await
        .unwrap();
    engine
        .create_transaction(
            f.bob,
            NewTransaction {
                group_id: Some(f.group),
                ..expense_at(70, now - Duration::days(1))
            },
        )
        .await
        .unwrap();

    let balance = |total_income, total_expense| Balance {
        total_income,
        total_expense,
        net_balance: total_income - total_expense,
    };

    let week = engine
        .compute_balance(f.alice, Scope::Personal, Period::Week, now)
        .await
        .unwrap();
    assert_eq!(week, balance(1000, 0));
    let month = engine
        .compute_balance(f.alice, Scope::Personal, Period::Month, now)
        .await
        .unwrap();
    assert_eq!(month, balance(1000, 300));
    let all = engine
        .compute_balance(f.alice, Scope::Personal, Period::All, now)
        .await
        .unwrap();
    assert_eq!(all, balance(1000, 350));

    let family_total = engine
        .compute_balance(f.alice, Scope::Family, Period::All, now)
        .await
        .unwrap();
    assert_eq!(family_total, balance(0, 70));
    let everything = engine
        .compute_balance(f.alice, Scope::All, Period::All, now)
        .await
        .unwrap();
    assert_eq!(everything, balance(1000, 420));
}

#[tokio::test]
async fn balance_is_cached_until_a_write() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;
    let tx = engine
        .create_transaction(f.alice, expense_at(100, day(1)))
        .await
        .unwrap();

    let before = engine
        .compute_balance(f.alice, Scope::All, Period::All, day(5))
        .await
        .unwrap();
    assert_eq!(before.total_expense, 100);
    assert_eq!(engine.cache().len(), 1);

    engine
        .soft_delete_transaction(f.alice, tx.id, day(2))
        .await
        .unwrap();
    assert!(engine.cache().is_empty());

    let after = engine
        .compute_balance(f.alice, Scope::All, Period::All, day(5))
        .await
        .unwrap();
    assert_eq!(after, Balance::default());
}

#[tokio::test]
async fn reference_data_rejects_duplicates_and_blank_names() {
    let (engine, _db) = engine_with_db().await;

    engine.create_user("alice", None).await.unwrap();
    assert!(matches!(
        engine.create_user(" alice ", None).await.unwrap_err(),
        EngineError::ExistingKey(_)
    ));
    assert!(matches!(
        engine.create_user("  ", None).await.unwrap_err(),
        EngineError::InvalidName(_)
    ));
    assert_eq!(engine.user_by_username("alice").await.unwrap().username, "alice");

    let food = engine.create_category("Food").await.unwrap();
    assert!(matches!(
        engine.create_category("Food").await.unwrap_err(),
        EngineError::ExistingKey(_)
    ));
    engine.create_subcategory(food.id, "Lunch").await.unwrap();
    assert!(matches!(
        engine.create_subcategory(food.id, "Lunch").await.unwrap_err(),
        EngineError::ExistingKey(_)
    ));
    assert!(matches!(
        engine.create_subcategory(999, "Lunch").await.unwrap_err(),
        EngineError::InvalidCategory(_)
    ));

    let group = engine.create_group("Home", None).await.unwrap();
    assert_eq!(group.kind, "family");
    let members = engine.list_group_members(group.id).await.unwrap();
    assert!(members.is_empty());
    assert!(matches!(
        engine.remove_group_member(group.id, 1).await.unwrap_err(),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        engine.upsert_group_member(group.id, 1, "admin").await.unwrap_err(),
        EngineError::InvalidRole(_)
    ));
}

#[tokio::test]
async fn upserting_a_member_changes_the_role() {
    let (engine, _db) = engine_with_db().await;
    let f = family(&engine).await;

    engine
        .upsert_group_member(f.group, f.bob, "owner")
        .await
        .unwrap();
    let members = engine.list_group_members(f.group).await.unwrap();
    assert_eq!(
        members,
        vec![
            (f.alice, "owner".to_string()),
            (f.bob, "owner".to_string())
        ]
    );
}
