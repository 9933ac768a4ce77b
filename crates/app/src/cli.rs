use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use api_types::{
    Scope,
    balance::Period,
    membership::{MemberUpsert, MembershipRole},
    split::SplitNew,
    transaction,
};
use engine::{Engine, EngineError, FilterParams, NewSplit, NewTransaction, TransactionFilter};

use crate::{parse_time, views};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Query and settle a shared expense ledger")]
pub struct Cli {
    /// Settings file, extension optional.
    #[arg(long, default_value = "settings")]
    pub config: String,

    /// Overrides the configured database (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage accounts.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage groups and their members.
    #[command(subcommand)]
    Group(GroupCommand),
    /// Manage categories.
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage subcategories.
    #[command(subcommand)]
    Subcategory(SubcategoryCommand),
    /// Record, list, delete and restore transactions.
    #[command(subcommand)]
    Tx(TxCommand),
    /// Record a shared expense and the debts it creates.
    Split(SplitArgs),
    /// Income, expense and net balance of the visible records.
    Balance(BalanceArgs),
    /// Debts owed to and by a user.
    Debts(Viewer),
    /// Settle debts.
    #[command(subcommand)]
    Debt(DebtCommand),
}

/// Acting account, as resolved by the caller's authentication.
#[derive(Args, Debug)]
pub struct Viewer {
    #[arg(long = "as", value_name = "USER_ID")]
    pub viewer: i64,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        telegram_id: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        kind: Option<String>,
    },
    /// Add a member or change their role.
    Join {
        #[arg(long)]
        group: i64,
        #[arg(long)]
        user: i64,
        #[arg(long, value_parser = parse_snake::<MembershipRole>, default_value = "member")]
        role: MembershipRole,
    },
    Leave {
        #[arg(long)]
        group: i64,
        #[arg(long)]
        user: i64,
    },
    Members {
        #[arg(long)]
        group: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    Create {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SubcategoryCommand {
    Create {
        #[arg(long)]
        category: i64,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    Add(TxAddArgs),
    List(TxListArgs),
    Delete {
        #[command(flatten)]
        viewer: Viewer,
        #[arg(long)]
        id: i64,
        /// Deletion time, defaults to now.
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
    },
    Restore {
        #[command(flatten)]
        viewer: Viewer,
        #[arg(long)]
        id: i64,
    },
    Deleted {
        #[command(flatten)]
        viewer: Viewer,
        #[arg(long)]
        limit: Option<u64>,
    },
}

#[derive(Args, Debug)]
pub struct TxAddArgs {
    #[command(flatten)]
    viewer: Viewer,
    #[arg(long)]
    amount: i64,
    #[arg(long = "type", value_parser = parse_snake::<transaction::OperationType>)]
    operation_type: transaction::OperationType,
    #[arg(long)]
    category: Option<i64>,
    #[arg(long)]
    subcategory: Option<i64>,
    /// RFC3339 timestamp, defaults to now.
    #[arg(long, value_parser = parse_time)]
    at: Option<DateTime<Utc>>,
    #[arg(long)]
    group: Option<i64>,
    #[arg(long)]
    private: bool,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct TxListArgs {
    #[command(flatten)]
    viewer: Viewer,
    /// `expense`, `income` or `both`.
    #[arg(long = "type")]
    operation_type: Option<String>,
    #[arg(long)]
    category: Option<i64>,
    #[arg(long)]
    subcategory: Option<i64>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
    #[arg(long, value_parser = parse_snake::<Scope>)]
    scope: Option<Scope>,
    #[arg(long)]
    cursor: Option<String>,
    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    viewer: Viewer,
    #[arg(long)]
    amount: i64,
    /// Comma separated user ids.
    #[arg(long, value_delimiter = ',', required = true)]
    participants: Vec<i64>,
    #[arg(long)]
    category: Option<i64>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    #[command(flatten)]
    viewer: Viewer,
    #[arg(long, value_parser = parse_snake::<Scope>, default_value = "all")]
    scope: Scope,
    #[arg(long, value_parser = parse_snake::<Period>, default_value = "all")]
    period: Period,
}

#[derive(Subcommand, Debug)]
pub enum DebtCommand {
    /// Mark a debt owed to you as returned.
    Pay {
        #[command(flatten)]
        viewer: Viewer,
        #[arg(long)]
        id: i64,
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
        /// Also book the returned amount as an income.
        #[arg(long)]
        record_income: bool,
    },
}

/// Parses a snake_case serde enum from a command line value.
fn parse_snake<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string()))
        .map_err(|err| err.to_string())
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Output(#[from] serde_json::Error),
}

fn json<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn transaction_new(req: transaction::TransactionNew) -> NewTransaction {
    NewTransaction {
        amount_minor: req.amount_minor,
        operation_type: views::operation_type(req.operation_type),
        category_id: req.category_id,
        subcategory_id: req.subcategory_id,
        occurred_at: req.occurred_at.map(|t| t.with_timezone(&Utc)),
        group_id: req.group_id,
        is_private: req.is_private,
        description: req.description,
    }
}

fn filter_params(req: &transaction::TransactionList) -> FilterParams {
    FilterParams {
        operation_type: req.operation_type.clone(),
        category_id: req.category_id,
        subcategory_id: req.subcategory_id,
        start: req.start.clone(),
        end: req.end.clone(),
        scope: req.scope.map(|s| s.as_str().to_string()),
    }
}

fn split_new(req: SplitNew) -> NewSplit {
    NewSplit {
        amount_minor: req.amount,
        participant_ids: req.participants,
        category_id: req.category_id,
        description: req.description,
        occurred_at: None,
    }
}

/// Executes one command and renders its result as pretty JSON.
pub async fn run(engine: &Engine, command: Command, now: DateTime<Utc>) -> Result<String, CliError> {
    match command {
        Command::User(UserCommand::Create {
            username,
            telegram_id,
        }) => json(&engine.create_user(&username, telegram_id).await?),
        Command::Group(GroupCommand::Create { name, kind }) => {
            json(&engine.create_group(&name, kind.as_deref()).await?)
        }
        Command::Group(GroupCommand::Join { group, user, role }) => {
            let req = MemberUpsert { user_id: user, role };
            engine
                .upsert_group_member(group, req.user_id, req.role.as_str())
                .await?;
            json(&req)
        }
        Command::Group(GroupCommand::Leave { group, user }) => {
            engine.remove_group_member(group, user).await?;
            json(&serde_json::json!({ "group_id": group, "user_id": user }))
        }
        Command::Group(GroupCommand::Members { group }) => {
            let members: Vec<_> = engine
                .list_group_members(group)
                .await?
                .into_iter()
                .map(|(user_id, role)| serde_json::json!({ "user_id": user_id, "role": role }))
                .collect();
            json(&members)
        }
        Command::Category(CategoryCommand::Create { name }) => {
            json(&engine.create_category(&name).await?)
        }
        Command::Subcategory(SubcategoryCommand::Create { category, name }) => {
            json(&engine.create_subcategory(category, &name).await?)
        }
        Command::Tx(TxCommand::Add(args)) => {
            let req = transaction::TransactionNew {
                amount_minor: args.amount,
                operation_type: args.operation_type,
                category_id: args.category,
                subcategory_id: args.subcategory,
                occurred_at: args.at.map(|t| t.fixed_offset()),
                group_id: args.group,
                is_private: args.private,
                description: args.description,
            };
            let tx = engine
                .create_transaction(args.viewer.viewer, transaction_new(req))
                .await?;
            json(&transaction::TransactionCreated { id: tx.id })
        }
        Command::Tx(TxCommand::List(args)) => {
            let req = transaction::TransactionList {
                operation_type: args.operation_type,
                category_id: args.category,
                subcategory_id: args.subcategory,
                start: args.start,
                end: args.end,
                scope: args.scope,
                cursor: args.cursor,
                limit: args.limit,
            };
            let filter = TransactionFilter::from_params(&filter_params(&req))?;
            let page = engine
                .query_transactions(args.viewer.viewer, &filter, req.cursor.as_deref(), req.limit)
                .await?;
            json(&views::page(page))
        }
        Command::Tx(TxCommand::Delete { viewer, id, at }) => {
            engine
                .soft_delete_transaction(viewer.viewer, id, at.unwrap_or(now))
                .await?;
            json(&transaction::TransactionRef { id, deleted: true })
        }
        Command::Tx(TxCommand::Restore { viewer, id }) => {
            engine.restore_transaction(viewer.viewer, id).await?;
            json(&transaction::TransactionRef { id, deleted: false })
        }
        Command::Tx(TxCommand::Deleted { viewer, limit }) => json(&views::deleted(
            engine.list_deleted_transactions(viewer.viewer, limit).await?,
        )),
        Command::Split(args) => {
            let req = SplitNew {
                amount: args.amount,
                participants: args.participants,
                category_id: args.category,
                description: args.description,
            };
            let outcome = engine
                .create_split(args.viewer.viewer, split_new(req))
                .await?;
            json(&views::split(outcome))
        }
        Command::Balance(args) => {
            let balance = engine
                .compute_balance(
                    args.viewer.viewer,
                    views::scope(args.scope),
                    views::period(args.period),
                    now,
                )
                .await?;
            json(&views::balance(args.scope, args.period, balance))
        }
        Command::Debts(viewer) => json(&views::debts(engine.list_debts(viewer.viewer).await?)),
        Command::Debt(DebtCommand::Pay {
            viewer,
            id,
            at,
            record_income,
        }) => {
            let debt = engine
                .mark_debt_paid(viewer.viewer, id, at.unwrap_or(now), record_income)
                .await?;
            json(&views::debt_paid(debt))
        }
    }
}
