//! Asoebi quantity and commission rules.
//!
//! Everything here is pure so the decision of *what* to correct can be tested
//! without a database; writing the correction is `CorrectionService`'s job.

use crate::entities::contribution_entity as contributions;
use crate::error::{AppError, AppResult};
use crate::models::{CommissionRate, CorrectionPlan};
use crate::store::AsoebiContribution;

/// Reject rows whose stored quantities cannot be priced.
///
/// A negative breakdown or flat quantity would cancel real units out (or
/// price the row below zero), so such rows are never corrected.
pub fn validate_quantities(c: &contributions::Model) -> AppResult<()> {
    let negative_breakdown = c.breakdown().iter().any(|&v| v < 0);
    let negative_flat = c.asoebi_quantity.is_some_and(|q| q < 0);
    if negative_breakdown || negative_flat {
        return Err(AppError::ValidationError(format!(
            "contribution {} has a negative asoebi quantity (flat {:?}, breakdown {:?})",
            c.id,
            c.asoebi_quantity,
            c.breakdown()
        )));
    }
    Ok(())
}

/// Units actually bought by an asoebi contribution.
///
/// The gender/role breakdown wins whenever it adds up to something; otherwise
/// the legacy flat field is used, and a missing or zero flat field means 1.
/// Expects fields that passed [`validate_quantities`].
pub fn resolve_true_quantity(c: &contributions::Model) -> i64 {
    let breakdown: i64 = c.breakdown().iter().map(|&v| i64::from(v)).sum();
    if breakdown > 0 {
        return breakdown;
    }
    match c.asoebi_quantity {
        Some(q) if q != 0 => i64::from(q),
        _ => 1,
    }
}

/// Decide whether a stored commission needs fixing.
///
/// Returns `Ok(None)` for non-asoebi rows and for commissions within
/// `tolerance` of `rate * quantity`. A row that needs fixing but has no
/// owner is reported as [`AppError::Orphaned`] so the caller can skip it;
/// negative quantities are an [`AppError::ValidationError`].
pub fn compute_correction(
    item: &AsoebiContribution,
    rate: CommissionRate,
    tolerance: f64,
) -> AppResult<Option<CorrectionPlan>> {
    let c = &item.contribution;
    if !c.is_asoebi {
        return Ok(None);
    }
    validate_quantities(c)?;

    let quantity = resolve_true_quantity(c);
    let correct = rate.for_quantity(quantity);
    let diff = c.commission - correct;
    if diff.abs() <= tolerance {
        return Ok(None);
    }

    let owner_id = item.owner_id.ok_or_else(|| {
        AppError::Orphaned(format!(
            "contribution {} (gift {}) has no owning user",
            c.id, c.gift_id
        ))
    })?;

    Ok(Some(CorrectionPlan {
        contribution_id: c.id,
        gift_id: c.gift_id,
        owner_id,
        old_commission: c.commission,
        new_commission: correct,
        old_quantity: c.asoebi_quantity,
        new_quantity: quantity,
        wallet_delta: diff,
    }))
}
