use super::{AsoebiContribution, LedgerStore, UserLedger};
use crate::entities::{
    contribution_entity as contributions, gift_entity as gifts, guest_entity as guests,
    user_entity as users, withdrawal_entity as withdrawals,
};
use crate::error::{AppError, AppResult};
use crate::models::{CorrectionPlan, UserSelector};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Clone)]
pub struct SeaOrmLedgerStore {
    pool: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_user(&self, selector: &UserSelector) -> AppResult<Option<users::Model>> {
        let user = match selector {
            UserSelector::Id(id) => users::Entity::find_by_id(*id).one(&self.pool).await?,
            UserSelector::Email(email) => {
                // 存量数据里的邮箱大小写不统一
                users::Entity::find()
                    .filter(
                        Expr::expr(Func::lower(Expr::col(users::Column::Email)))
                            .eq(email.trim().to_lowercase()),
                    )
                    .one(&self.pool)
                    .await?
            }
        };
        Ok(user)
    }
}

#[async_trait]
impl LedgerStore for SeaOrmLedgerStore {
    async fn asoebi_contributions(&self) -> AppResult<Vec<AsoebiContribution>> {
        let rows = contributions::Entity::find()
            .filter(contributions::Column::IsAsoebi.eq(true))
            .find_also_related(gifts::Entity)
            .order_by_asc(contributions::Column::CreatedAt)
            .order_by_asc(contributions::Column::Id)
            .all(&self.pool)
            .await?;

        // 礼物存在但用户已被删除的情况也算孤儿记录
        let owner_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|(_, gift)| gift.as_ref().map(|g| g.user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let existing: HashSet<Uuid> = if owner_ids.is_empty() {
            HashSet::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(owner_ids))
                .all(&self.pool)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|(contribution, gift)| AsoebiContribution {
                owner_id: gift
                    .map(|g| g.user_id)
                    .filter(|id| existing.contains(id)),
                contribution,
            })
            .collect())
    }

    async fn user_ledger(&self, selector: &UserSelector) -> AppResult<Option<UserLedger>> {
        let Some(user) = self.find_user(selector).await? else {
            return Ok(None);
        };

        let contributions = contributions::Entity::find()
            .join(JoinType::InnerJoin, contributions::Relation::Gift.def())
            .filter(gifts::Column::UserId.eq(user.id))
            .order_by_asc(contributions::Column::CreatedAt)
            .all(&self.pool)
            .await?;

        let withdrawals = withdrawals::Entity::find()
            .filter(withdrawals::Column::UserId.eq(user.id))
            .order_by_asc(withdrawals::Column::CreatedAt)
            .all(&self.pool)
            .await?;

        let paid_asoebi_guests = guests::Entity::find()
            .join(JoinType::InnerJoin, guests::Relation::Gift.def())
            .filter(gifts::Column::UserId.eq(user.id))
            .filter(guests::Column::AsoebiPaid.eq(true))
            .count(&self.pool)
            .await?;

        Ok(Some(UserLedger {
            user,
            contributions,
            withdrawals,
            paid_asoebi_guests,
        }))
    }

    async fn user_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids = users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .into_tuple::<Uuid>()
            .all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn apply_correction(&self, plan: &CorrectionPlan) -> AppResult<()> {
        let new_quantity = i32::try_from(plan.new_quantity).map_err(|_| {
            AppError::ValidationError(format!(
                "quantity {} does not fit the asoebi_quantity column",
                plan.new_quantity
            ))
        })?;

        let txn = self.pool.begin().await?;
        match write_correction(&txn, plan, new_quantity).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = txn.rollback().await {
                    log::error!(
                        "Rollback failed for contribution {}: {rb}",
                        plan.contribution_id
                    );
                }
                Err(e)
            }
        }
    }

    async fn set_flat_asoebi_commission(&self, amount: f64) -> AppResult<u64> {
        let res = contributions::Entity::update_many()
            .col_expr(contributions::Column::Commission, Expr::value(amount))
            .col_expr(contributions::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(contributions::Column::IsAsoebi.eq(true))
            .exec(&self.pool)
            .await?;
        Ok(res.rows_affected)
    }
}

async fn write_correction(
    txn: &DatabaseTransaction,
    plan: &CorrectionPlan,
    new_quantity: i32,
) -> AppResult<()> {
    // 乐观更新：佣金在快照之后被改过则不覆盖
    let updated = contributions::Entity::update_many()
        .col_expr(
            contributions::Column::Commission,
            Expr::value(plan.new_commission),
        )
        .col_expr(
            contributions::Column::AsoebiQuantity,
            Expr::value(new_quantity),
        )
        .col_expr(contributions::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(contributions::Column::Id.eq(plan.contribution_id))
        .filter(contributions::Column::Commission.eq(plan.old_commission))
        .exec(txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "contribution {} is missing or changed since the snapshot",
            plan.contribution_id
        )));
    }

    let credited = users::Entity::update_many()
        .col_expr(
            users::Column::Wallet,
            Expr::col(users::Column::Wallet).add(plan.wallet_delta),
        )
        .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(users::Column::Id.eq(plan.owner_id))
        .exec(txn)
        .await?;
    if credited.rows_affected == 0 {
        return Err(AppError::Orphaned(format!(
            "user {} owning contribution {} no longer exists",
            plan.owner_id, plan.contribution_id
        )));
    }
    Ok(())
}
