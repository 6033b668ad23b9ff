pub mod contributions;
pub mod gifts;
pub mod guests;
pub mod referral_transactions;
pub mod users;
pub mod withdrawals;

pub use contributions as contribution_entity;
pub use gifts as gift_entity;
pub use guests as guest_entity;
pub use referral_transactions as referral_transaction_entity;
pub use users as user_entity;
pub use withdrawals as withdrawal_entity;
