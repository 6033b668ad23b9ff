use crate::entities::user_entity as users;
use crate::error::AppResult;
use crate::models::{AssignedReferralCode, ReferralBackfillSummary};
use crate::utils::generate_unique_referral_code;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};

#[derive(Clone)]
pub struct ReferralService {
    pool: DatabaseConnection,
}

impl ReferralService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 为没有推荐码的老用户补发推荐码
    pub async fn backfill_referral_codes(&self) -> AppResult<ReferralBackfillSummary> {
        let pending = users::Entity::find()
            .filter(users::Column::ReferralCode.is_null())
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.pool)
            .await?;

        let mut summary = ReferralBackfillSummary {
            users_without_code: pending.len() as u64,
            assigned: Vec::with_capacity(pending.len()),
        };

        for user in pending {
            let code = generate_unique_referral_code(&self.pool).await?;
            let user_id = user.id;
            let mut am = user.into_active_model();
            am.referral_code = Set(Some(code.clone()));
            am.updated_at = Set(Some(Utc::now()));
            am.update(&self.pool).await?;

            log::info!("Assigned referral code {code} to user {user_id}");
            summary.assigned.push(AssignedReferralCode {
                user_id,
                referral_code: code,
            });
        }

        Ok(summary)
    }
}
