use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which withdrawals reduce the expected wallet balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPolicy {
    /// Every withdrawal row, whatever its status
    #[default]
    All,
    /// Only withdrawals that reached `success` / `completed`
    SettledOnly,
}

impl WithdrawalPolicy {
    pub fn counts(self, status: &str) -> bool {
        match self {
            WithdrawalPolicy::All => true,
            WithdrawalPolicy::SettledOnly => {
                matches!(status.to_ascii_lowercase().as_str(), "success" | "completed")
            }
        }
    }
}

impl fmt::Display for WithdrawalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalPolicy::All => write!(f, "all"),
            WithdrawalPolicy::SettledOnly => write!(f, "settled_only"),
        }
    }
}

impl FromStr for WithdrawalPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(WithdrawalPolicy::All),
            "settled_only" | "settled" => Ok(WithdrawalPolicy::SettledOnly),
            other => Err(AppError::ConfigError(format!(
                "unknown withdrawal policy: {other} (expected all | settled_only)"
            ))),
        }
    }
}

/// How the operator picks the user to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    Id(Uuid),
    Email(String),
}

impl fmt::Display for UserSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserSelector::Id(id) => write!(f, "id={id}"),
            UserSelector::Email(email) => write!(f, "email={email}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsoebiPaymentCheck {
    pub paid_guests: u64,
    pub completed_asoebi_contributions: u64,
}

impl AsoebiPaymentCheck {
    pub fn is_consistent(&self) -> bool {
        self.paid_guests == self.completed_asoebi_contributions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub user_id: Uuid,
    pub email: String,
    pub withdrawal_policy: WithdrawalPolicy,
    pub completed_contributions: usize,
    pub counted_withdrawals: usize,
    pub gross_contributions: f64,
    pub total_commission: f64,
    pub total_withdrawals: f64,
    pub expected_balance: f64,
    pub stored_wallet: f64,
    /// stored − expected
    pub difference: f64,
    pub is_balanced: bool,
    pub asoebi: AsoebiPaymentCheck,
}

impl BalanceReport {
    pub fn has_discrepancy(&self) -> bool {
        !self.is_balanced
    }

    pub fn needs_attention(&self) -> bool {
        self.has_discrepancy() || !self.asoebi.is_consistent()
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User {} <{}>", self.user_id, self.email)?;
        writeln!(
            f,
            "  completed contributions: {} gross {:.2}, commission {:.2}",
            self.completed_contributions, self.gross_contributions, self.total_commission
        )?;
        writeln!(
            f,
            "  withdrawals ({}):        {} totalling {:.2}",
            self.withdrawal_policy, self.counted_withdrawals, self.total_withdrawals
        )?;
        writeln!(f, "  expected balance:        {:.2}", self.expected_balance)?;
        writeln!(f, "  stored wallet:           {:.2}", self.stored_wallet)?;
        let status = if self.is_balanced { "OK" } else { "DISCREPANCY" };
        write!(f, "  difference:              {:.2} [{status}]", self.difference)?;
        if !self.asoebi.is_consistent() {
            write!(
                f,
                "\n  WARNING: {} guests marked asoebi-paid but {} completed asoebi contributions",
                self.asoebi.paid_guests, self.asoebi.completed_asoebi_contributions
            )?;
        }
        Ok(())
    }
}
