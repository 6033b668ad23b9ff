use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedReferralCode {
    pub user_id: Uuid,
    pub referral_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralBackfillSummary {
    pub users_without_code: u64,
    pub assigned: Vec<AssignedReferralCode>,
}

impl fmt::Display for ReferralBackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.assigned {
            writeln!(f, "  {} -> {}", a.user_id, a.referral_code)?;
        }
        write!(
            f,
            "referral codes assigned: {}/{}",
            self.assigned.len(),
            self.users_without_code
        )
    }
}
