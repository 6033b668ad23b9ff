pub mod commission;
pub mod correction_service;
pub mod reconciliation_service;
pub mod referral_service;

pub use commission::{compute_correction, resolve_true_quantity, validate_quantities};
pub use correction_service::*;
pub use reconciliation_service::*;
pub use referral_service::*;
