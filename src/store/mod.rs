//! Persistence boundary of the reconciliation engine.
//!
//! Services only talk to the database through [`LedgerStore`], so a run gets
//! its store handle injected at construction and drops it when done.

mod sea_orm_store;

pub use sea_orm_store::SeaOrmLedgerStore;

use crate::entities::{
    contribution_entity as contributions, user_entity as users, withdrawal_entity as withdrawals,
};
use crate::error::AppResult;
use crate::models::{CorrectionPlan, UserSelector};
use async_trait::async_trait;
use uuid::Uuid;

/// An asoebi contribution together with the user owning its gift.
///
/// `owner_id` is `None` when the gift or its user no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct AsoebiContribution {
    pub contribution: contributions::Model,
    pub owner_id: Option<Uuid>,
}

/// Everything the balance check needs for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserLedger {
    pub user: users::Model,
    /// Contributions to all of the user's gifts, any status
    pub contributions: Vec<contributions::Model>,
    pub withdrawals: Vec<withdrawals::Model>,
    /// Guests on the user's gifts with `asoebi_paid = true`
    pub paid_asoebi_guests: u64,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All contributions with `is_asoebi = true`, oldest first.
    async fn asoebi_contributions(&self) -> AppResult<Vec<AsoebiContribution>>;

    async fn user_ledger(&self, selector: &UserSelector) -> AppResult<Option<UserLedger>>;

    async fn user_ids(&self) -> AppResult<Vec<Uuid>>;

    /// Writes the contribution fix and the wallet delta in one transaction.
    /// Either both land or neither does.
    async fn apply_correction(&self, plan: &CorrectionPlan) -> AppResult<()>;

    /// Sets `commission = amount` on every asoebi contribution; returns rows touched.
    async fn set_flat_asoebi_commission(&self, amount: f64) -> AppResult<u64>;
}
