pub mod logging;
pub mod referral_code;

pub use logging::init_logger;
pub use referral_code::{generate_referral_code, generate_unique_referral_code};
