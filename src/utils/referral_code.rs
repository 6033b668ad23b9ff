use crate::entities::user_entity as users;
use crate::error::AppResult;
use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

const REFERRAL_CODE_LEN: usize = 8;
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 8位字母数字推荐码（去掉容易混淆的 0/O/1/I）
pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..REFERRAL_CODE_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// 生成数据库中不存在的推荐码
pub async fn generate_unique_referral_code<C: ConnectionTrait>(db: &C) -> AppResult<String> {
    loop {
        // ThreadRng is not Send, keep it out of the await
        let code = generate_referral_code(&mut rand::thread_rng());

        let exists = users::Entity::find()
            .filter(users::Column::ReferralCode.eq(code.clone()))
            .count(db)
            .await?;

        if exists == 0 {
            return Ok(code);
        }
    }
}
