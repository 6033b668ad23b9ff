//! Fixtures for tests that run against an in-memory SQLite database.

use crate::entities::{
    contribution_entity as contributions, gift_entity as gifts, guest_entity as guests,
    referral_transaction_entity as referral_transactions, user_entity as users,
    withdrawal_entity as withdrawals,
};
use crate::models::CorrectionPlan;
use chrono::{Duration, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait,
    IntoActiveModel, Schema,
};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

// keeps created_at strictly increasing so ordering is deterministic
static CLOCK: AtomicI64 = AtomicI64::new(0);

fn tick() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::milliseconds(CLOCK.fetch_add(1, Ordering::SeqCst))
}

pub async fn sqlite_pool() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // one connection, otherwise each checkout sees a fresh empty database
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    db.execute_unprepared("PRAGMA foreign_keys = OFF")
        .await
        .unwrap();

    let schema = Schema::new(DbBackend::Sqlite);
    let tables = [
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(gifts::Entity),
        schema.create_table_from_entity(guests::Entity),
        schema.create_table_from_entity(contributions::Entity),
        schema.create_table_from_entity(withdrawals::Entity),
        schema.create_table_from_entity(referral_transactions::Entity),
    ];
    for table in tables {
        db.execute(DbBackend::Sqlite.build(&table)).await.unwrap();
    }
    db
}

pub async fn insert_user(db: &DatabaseConnection, email: &str, wallet: f64) -> users::Model {
    let user = users::Model {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: None,
        wallet,
        referral_code: None,
        referred_by_id: None,
        created_at: Some(tick()),
        updated_at: None,
    };
    users::Entity::insert(user.clone().into_active_model())
        .exec_without_returning(db)
        .await
        .unwrap();
    user
}

pub async fn insert_gift(db: &DatabaseConnection, user_id: Uuid) -> gifts::Model {
    let id = Uuid::new_v4();
    let gift = gifts::Model {
        id,
        user_id,
        share_link: format!("gift-{}", id.simple()),
        title: "Wedding".to_string(),
        details: None,
        created_at: Some(tick()),
        updated_at: None,
    };
    gifts::Entity::insert(gift.clone().into_active_model())
        .exec_without_returning(db)
        .await
        .unwrap();
    gift
}

/// Inserts a completed contribution after letting `edit` adjust the defaults.
pub async fn insert_contribution<F>(
    db: &DatabaseConnection,
    gift_id: Uuid,
    edit: F,
) -> contributions::Model
where
    F: FnOnce(&mut contributions::Model),
{
    let mut c = contributions::Model {
        id: Uuid::new_v4(),
        gift_id,
        status: contributions::STATUS_COMPLETED.to_string(),
        created_at: Some(tick()),
        ..Default::default()
    };
    edit(&mut c);
    contributions::Entity::insert(c.clone().into_active_model())
        .exec_without_returning(db)
        .await
        .unwrap();
    c
}

pub async fn insert_withdrawal(
    db: &DatabaseConnection,
    user_id: Uuid,
    amount: f64,
    status: &str,
) -> withdrawals::Model {
    let w = withdrawals::Model {
        id: Uuid::new_v4(),
        user_id,
        amount,
        status: status.to_string(),
        created_at: Some(tick()),
        updated_at: None,
    };
    withdrawals::Entity::insert(w.clone().into_active_model())
        .exec_without_returning(db)
        .await
        .unwrap();
    w
}

pub async fn insert_guest(
    db: &DatabaseConnection,
    gift_id: Uuid,
    asoebi_paid: bool,
) -> guests::Model {
    let g = guests::Model {
        id: Uuid::new_v4(),
        gift_id,
        name: "Guest".to_string(),
        asoebi: true,
        asoebi_paid,
        created_at: Some(tick()),
    };
    guests::Entity::insert(g.clone().into_active_model())
        .exec_without_returning(db)
        .await
        .unwrap();
    g
}

pub async fn reload_contribution(db: &DatabaseConnection, id: Uuid) -> contributions::Model {
    contributions::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

pub async fn reload_user(db: &DatabaseConnection, id: Uuid) -> users::Model {
    users::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub fn plan_for(
    c: &contributions::Model,
    owner_id: Uuid,
    new_commission: f64,
    new_quantity: i64,
) -> CorrectionPlan {
    CorrectionPlan {
        contribution_id: c.id,
        gift_id: c.gift_id,
        owner_id,
        old_commission: c.commission,
        new_commission,
        old_quantity: c.asoebi_quantity,
        new_quantity,
        wallet_delta: c.commission - new_commission,
    }
}
