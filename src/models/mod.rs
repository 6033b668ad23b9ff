pub mod balance;
pub mod commission;
pub mod referral;

pub use balance::*;
pub use commission::*;
pub use referral::*;
