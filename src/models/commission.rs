//! 佣金修正相关的数据结构

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-unit asoebi commission, in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRate(i64);

impl CommissionRate {
    pub fn new(per_unit: i64) -> AppResult<Self> {
        if per_unit <= 0 {
            return Err(AppError::ConfigError(format!(
                "commission rate must be a positive integer, got {per_unit}"
            )));
        }
        Ok(Self(per_unit))
    }

    pub fn per_unit(self) -> i64 {
        self.0
    }

    /// Commission owed for `quantity` units. Integer math, so no drift.
    pub fn for_quantity(self, quantity: i64) -> f64 {
        self.0.saturating_mul(quantity) as f64
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/unit", self.0)
    }
}

/// What a single correction will write, decided before anything is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionPlan {
    pub contribution_id: Uuid,
    pub gift_id: Uuid,
    pub owner_id: Uuid,
    pub old_commission: f64,
    pub new_commission: f64,
    pub old_quantity: Option<i32>,
    pub new_quantity: i64,
    /// Applied to the owner's wallet: positive refunds, negative deducts
    pub wallet_delta: f64,
}

impl CorrectionPlan {
    pub fn is_refund(&self) -> bool {
        self.wallet_delta > 0.0
    }
}

impl fmt::Display for CorrectionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contribution {} (user {}): qty {} -> {}, commission {:.2} -> {:.2}, wallet {:+.2}",
            self.contribution_id,
            self.owner_id,
            self.old_quantity
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.new_quantity,
            self.old_commission,
            self.new_commission,
            self.wallet_delta,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Compute plans only
    Audit,
    Apply,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Audit => write!(f, "audit"),
            RunMode::Apply => write!(f, "apply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFailure {
    pub contribution_id: Uuid,
    pub wallet_delta: f64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub mode: RunMode,
    pub rate: i64,
    pub examined: u64,
    /// Plans written (apply) or pending (audit)
    pub corrected: u64,
    pub orphaned: u64,
    pub failed: u64,
    pub total_refunded: f64,
    pub total_deducted: f64,
    pub plans: Vec<CorrectionPlan>,
    pub failures: Vec<CorrectionFailure>,
}

impl CorrectionSummary {
    pub fn new(mode: RunMode, rate: CommissionRate) -> Self {
        Self {
            mode,
            rate: rate.per_unit(),
            examined: 0,
            corrected: 0,
            orphaned: 0,
            failed: 0,
            total_refunded: 0.0,
            total_deducted: 0.0,
            plans: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_plan(&mut self, plan: CorrectionPlan) {
        if plan.is_refund() {
            self.total_refunded += plan.wallet_delta;
        } else {
            self.total_deducted += -plan.wallet_delta;
        }
        self.corrected += 1;
        self.plans.push(plan);
    }

    pub fn record_failure(&mut self, plan: &CorrectionPlan, error: String) {
        self.failed += 1;
        self.failures.push(CorrectionFailure {
            contribution_id: plan.contribution_id,
            wallet_delta: plan.wallet_delta,
            error,
        });
    }

    /// A row that could not be planned at all, e.g. malformed quantities.
    pub fn record_rejected(&mut self, contribution_id: Uuid, error: String) {
        self.failed += 1;
        self.failures.push(CorrectionFailure {
            contribution_id,
            wallet_delta: 0.0,
            error,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for CorrectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.mode {
            RunMode::Audit => "pending",
            RunMode::Apply => "corrected",
        };
        writeln!(f, "Asoebi commission {} (rate {}/unit)", self.mode, self.rate)?;
        for plan in &self.plans {
            writeln!(f, "  {plan}")?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  FAILED contribution {} (wallet {:+.2}): {}",
                failure.contribution_id, failure.wallet_delta, failure.error
            )?;
        }
        writeln!(f, "examined:        {}", self.examined)?;
        writeln!(f, "{:<17}{}", format!("{verb}:"), self.corrected)?;
        writeln!(f, "orphaned:        {}", self.orphaned)?;
        writeln!(f, "failed:          {}", self.failed)?;
        writeln!(f, "total refunded:  {:.2}", self.total_refunded)?;
        write!(f, "total deducted:  {:.2}", self.total_deducted)
    }
}
