//! Conversions from engine results to the `api_types` response shapes.

use api_types::{balance, debt, split, transaction};

pub fn scope(scope: api_types::Scope) -> engine::Scope {
    match scope {
        api_types::Scope::Personal => engine::Scope::Personal,
        api_types::Scope::Family => engine::Scope::Family,
        api_types::Scope::All => engine::Scope::All,
    }
}

pub fn period(period: balance::Period) -> engine::Period {
    match period {
        balance::Period::All => engine::Period::All,
        balance::Period::Week => engine::Period::Week,
        balance::Period::Month => engine::Period::Month,
    }
}

pub fn operation_type(op: transaction::OperationType) -> engine::OperationType {
    match op {
        transaction::OperationType::Expense => engine::OperationType::Expense,
        transaction::OperationType::Income => engine::OperationType::Income,
    }
}

fn operation_type_view(op: engine::OperationType) -> transaction::OperationType {
    match op {
        engine::OperationType::Expense => transaction::OperationType::Expense,
        engine::OperationType::Income => transaction::OperationType::Income,
    }
}

pub fn transaction(tx: engine::Transaction) -> transaction::TransactionView {
    transaction::TransactionView {
        id: tx.id,
        owner_id: tx.owner_id,
        amount_minor: tx.amount_minor,
        operation_type: operation_type_view(tx.operation_type),
        category_id: tx.category_id,
        subcategory_id: tx.subcategory_id,
        occurred_at: tx.occurred_at,
        group_id: tx.group_id,
        is_private: tx.is_private,
        is_shared: tx.is_shared,
        description: tx.description,
        deleted_at: tx.deleted_at,
    }
}

pub fn page(page: engine::TransactionPage) -> transaction::TransactionListResponse {
    transaction::TransactionListResponse {
        records: page.records.into_iter().map(transaction).collect(),
        pagination: transaction::Pagination {
            limit: page.limit,
            has_more: page.has_more,
            next_cursor: page.next_cursor,
        },
        skipped_rows: page.skipped_rows,
    }
}

pub fn deleted(deleted: engine::DeletedTransactions) -> transaction::DeletedListResponse {
    transaction::DeletedListResponse {
        records: deleted.records.into_iter().map(transaction).collect(),
        limit: deleted.limit,
        skipped_rows: deleted.skipped_rows,
    }
}

pub fn split(outcome: engine::SplitOutcome) -> split::SplitCreated {
    split::SplitCreated {
        transaction_id: outcome.transaction_id,
        per_participant_amount: outcome.per_participant_amount,
        total_participants: outcome.total_participants,
        skipped_participants: outcome.skipped_participants,
    }
}

pub fn balance(
    scope: api_types::Scope,
    period: balance::Period,
    balance: engine::Balance,
) -> balance::BalanceResponse {
    balance::BalanceResponse {
        scope,
        period,
        total_income: balance.total_income,
        total_expense: balance.total_expense,
        net_balance: balance.net_balance,
    }
}

fn debt_entry(entry: engine::DebtEntry) -> debt::DebtView {
    debt::DebtView {
        id: entry.debt_id,
        counterparty_id: entry.counterparty_id,
        counterparty_name: entry.counterparty_name,
        amount: entry.amount_minor,
        is_paid: entry.is_paid,
        paid_at: entry.paid_at,
        transaction_id: entry.transaction_id,
    }
}

pub fn debts(ledger: engine::DebtLedger) -> debt::DebtsResponse {
    debt::DebtsResponse {
        owed_to_me: ledger.owed_to_me.into_iter().map(debt_entry).collect(),
        i_owe: ledger.i_owe.into_iter().map(debt_entry).collect(),
    }
}

pub fn debt_paid(debt: engine::Debt) -> debt::DebtPaid {
    debt::DebtPaid {
        id: debt.id,
        paid_at: debt.paid_at,
    }
}
