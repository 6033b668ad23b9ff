use crate::error::{AppError, AppResult};
use crate::models::{AsoebiPaymentCheck, BalanceReport, UserSelector, WithdrawalPolicy};
use crate::store::{LedgerStore, UserLedger};
use std::sync::Arc;

/// Read-only wallet audit. Never writes; discrepancies are reported, not fixed.
#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn LedgerStore>,
    policy: WithdrawalPolicy,
    tolerance: f64,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn LedgerStore>, policy: WithdrawalPolicy, tolerance: f64) -> Self {
        Self {
            store,
            policy,
            tolerance,
        }
    }

    pub async fn reconcile_user(&self, selector: &UserSelector) -> AppResult<BalanceReport> {
        let ledger = self
            .store
            .user_ledger(selector)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found ({selector})")))?;

        let report = build_report(&ledger, self.policy, self.tolerance);
        log_report(&report);
        Ok(report)
    }

    /// Reconcile every user. A user deleted mid-run is skipped.
    pub async fn reconcile_all(&self) -> AppResult<Vec<BalanceReport>> {
        let ids = self.store.user_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.user_ledger(&UserSelector::Id(id)).await? {
                Some(ledger) => {
                    let report = build_report(&ledger, self.policy, self.tolerance);
                    log_report(&report);
                    reports.push(report);
                }
                None => log::warn!("User {id} disappeared during reconciliation, skipping"),
            }
        }

        let flagged = reports.iter().filter(|r| r.has_discrepancy()).count();
        log::info!(
            "Reconciled {} users, {} with wallet discrepancies",
            reports.len(),
            flagged
        );
        Ok(reports)
    }
}

/// expected = Σ completed(amount − commission) − Σ counted withdrawals
pub fn build_report(
    ledger: &UserLedger,
    policy: WithdrawalPolicy,
    tolerance: f64,
) -> BalanceReport {
    let completed: Vec<_> = ledger
        .contributions
        .iter()
        .filter(|c| c.is_completed())
        .collect();
    let gross_contributions: f64 = completed.iter().map(|c| c.amount).sum();
    let total_commission: f64 = completed.iter().map(|c| c.commission).sum();
    let completed_asoebi = completed.iter().filter(|c| c.is_asoebi).count() as u64;

    let counted: Vec<_> = ledger
        .withdrawals
        .iter()
        .filter(|w| policy.counts(&w.status))
        .collect();
    let total_withdrawals: f64 = counted.iter().map(|w| w.amount).sum();

    let expected_balance = gross_contributions - total_commission - total_withdrawals;
    let difference = ledger.user.wallet - expected_balance;

    BalanceReport {
        user_id: ledger.user.id,
        email: ledger.user.email.clone(),
        withdrawal_policy: policy,
        completed_contributions: completed.len(),
        counted_withdrawals: counted.len(),
        gross_contributions,
        total_commission,
        total_withdrawals,
        expected_balance,
        stored_wallet: ledger.user.wallet,
        difference,
        is_balanced: difference.abs() <= tolerance,
        asoebi: AsoebiPaymentCheck {
            paid_guests: ledger.paid_asoebi_guests,
            completed_asoebi_contributions: completed_asoebi,
        },
    }
}

fn log_report(report: &BalanceReport) {
    if report.has_discrepancy() {
        log::warn!(
            "Wallet discrepancy for user {}: stored {:.2}, expected {:.2}, difference {:.2}",
            report.user_id,
            report.stored_wallet,
            report.expected_balance,
            report.difference
        );
    } else {
        log::debug!("Wallet OK for user {}", report.user_id);
    }
    if !report.asoebi.is_consistent() {
        log::warn!(
            "Asoebi mismatch for user {}: {} paid guests vs {} completed asoebi contributions",
            report.user_id,
            report.asoebi.paid_guests,
            report.asoebi.completed_asoebi_contributions
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SeaOrmLedgerStore;
    use crate::test_support::*;
    use sea_orm::DatabaseConnection;

    async fn seeded(wallet: f64) -> (DatabaseConnection, uuid::Uuid) {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", wallet).await;
        let gift = insert_gift(&db, user.id).await;
        insert_contribution(&db, gift.id, |c| {
            c.amount = 10000.0;
            c.commission = 500.0;
        })
        .await;
        insert_withdrawal(&db, user.id, 2000.0, "success").await;
        (db, user.id)
    }

    fn service(db: &DatabaseConnection, policy: WithdrawalPolicy) -> ReconciliationService {
        ReconciliationService::new(Arc::new(SeaOrmLedgerStore::new(db.clone())), policy, 0.01)
    }

    #[tokio::test]
    async fn test_balanced_wallet() {
        let (db, user_id) = seeded(7500.0).await;
        let report = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert_eq!(report.expected_balance, 7500.0);
        assert_eq!(report.difference, 0.0);
        assert!(report.is_balanced);
    }

    #[tokio::test]
    async fn test_discrepancy_is_flagged_not_fixed() {
        let (db, user_id) = seeded(8000.0).await;
        let report = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert_eq!(report.difference, 500.0);
        assert!(report.has_discrepancy());
        assert_eq!(reload_user(&db, user_id).await.wallet, 8000.0);
    }

    #[tokio::test]
    async fn test_pending_contributions_do_not_count() {
        let (db, user_id) = seeded(7500.0).await;
        let gift = insert_gift(&db, user_id).await;
        insert_contribution(&db, gift.id, |c| {
            c.amount = 3000.0;
            c.status = "pending".to_string();
        })
        .await;
        let report = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert_eq!(report.completed_contributions, 1);
        assert!(report.is_balanced);
    }

    #[tokio::test]
    async fn test_withdrawal_policy() {
        let (db, user_id) = seeded(7500.0).await;
        insert_withdrawal(&db, user_id, 1000.0, "pending").await;

        let all = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert_eq!(all.total_withdrawals, 3000.0);
        assert_eq!(all.difference, 1000.0);

        let settled = service(&db, WithdrawalPolicy::SettledOnly)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert_eq!(settled.counted_withdrawals, 1);
        assert_eq!(settled.difference, 0.0);
    }

    #[tokio::test]
    async fn test_asoebi_guest_mismatch_is_a_warning() {
        let (db, user_id) = seeded(7500.0).await;
        let gift = insert_gift(&db, user_id).await;
        insert_guest(&db, gift.id, true).await;
        insert_guest(&db, gift.id, true).await;
        insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.amount = 0.0;
        })
        .await;

        let report = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Id(user_id))
            .await
            .unwrap();
        assert!(report.is_balanced);
        assert!(!report.asoebi.is_consistent());
        assert!(report.needs_attention());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let db = sqlite_pool().await;
        let err = service(&db, WithdrawalPolicy::All)
            .reconcile_user(&UserSelector::Email("nobody@example.com".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reconcile_all() {
        let (db, _) = seeded(8000.0).await;
        insert_user(&db, "empty@example.com", 0.0).await;
        let reports = service(&db, WithdrawalPolicy::All)
            .reconcile_all()
            .await
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports.iter().filter(|r| r.has_discrepancy()).count(), 1);
    }
}
