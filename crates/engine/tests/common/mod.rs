#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{Engine, NewTransaction};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Alice and Bob share a family group, Carol is on her own.
pub struct Family {
    pub alice: i64,
    pub bob: i64,
    pub carol: i64,
    pub group: i64,
}

pub async fn family(engine: &Engine) -> Family {
    let alice = engine.create_user("alice", Some(1001)).await.unwrap().id;
    let bob = engine.create_user("bob", None).await.unwrap().id;
    let carol = engine.create_user("carol", None).await.unwrap().id;
    let group = engine.create_group("Home", None).await.unwrap().id;
    engine.upsert_group_member(group, alice, "owner").await.unwrap();
    engine.upsert_group_member(group, bob, "member").await.unwrap();
    Family {
        alice,
        bob,
        carol,
        group,
    }
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

pub fn expense_at(amount_minor: i64, at: DateTime<Utc>) -> NewTransaction {
    NewTransaction {
        occurred_at: Some(at),
        ..NewTransaction::expense(amount_minor)
    }
}

pub fn income_at(amount_minor: i64, at: DateTime<Utc>) -> NewTransaction {
    NewTransaction {
        occurred_at: Some(at),
        ..NewTransaction::income(amount_minor)
    }
}
