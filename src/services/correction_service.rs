use crate::error::{AppError, AppResult};
use crate::models::{CommissionRate, CorrectionPlan, CorrectionSummary, RunMode};
use crate::services::commission::compute_correction;
use crate::store::LedgerStore;
use std::sync::Arc;

/// Retroactive asoebi commission fixer.
///
/// Works on a snapshot taken at the start of the run and handles one
/// contribution at a time; each fix is its own transaction. Running two
/// instances at once, or alongside live wallet traffic, is not supported.
#[derive(Clone)]
pub struct CorrectionService {
    store: Arc<dyn LedgerStore>,
    rate: CommissionRate,
    tolerance: f64,
}

impl CorrectionService {
    pub fn new(store: Arc<dyn LedgerStore>, rate: CommissionRate, tolerance: f64) -> Self {
        Self {
            store,
            rate,
            tolerance,
        }
    }

    pub async fn run(&self, mode: RunMode) -> AppResult<CorrectionSummary> {
        let snapshot = self.store.asoebi_contributions().await?;
        log::info!(
            "Asoebi commission {mode} started: {} contributions, rate {}",
            snapshot.len(),
            self.rate
        );

        let mut summary = CorrectionSummary::new(mode, self.rate);
        for item in &snapshot {
            summary.examined += 1;

            let plan = match compute_correction(item, self.rate, self.tolerance) {
                Ok(Some(plan)) => plan,
                Ok(None) => continue,
                Err(AppError::Orphaned(msg)) => {
                    log::warn!("Skipping correction: {msg}");
                    summary.orphaned += 1;
                    continue;
                }
                Err(AppError::ValidationError(msg)) => {
                    log::error!("Skipping correction: {msg}");
                    summary.record_rejected(item.contribution.id, msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if mode == RunMode::Audit {
                log::info!("Pending correction: {plan}");
                summary.record_plan(plan);
                continue;
            }

            match self.apply_correction(&plan).await {
                Ok(()) => summary.record_plan(plan),
                // 用户在快照之后被删除
                Err(AppError::Orphaned(msg)) => {
                    log::warn!("Skipping correction: {msg}");
                    summary.orphaned += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!(
                        "Correction failed for contribution {} (user {}, wallet delta {:+.2}): {e}",
                        plan.contribution_id,
                        plan.owner_id,
                        plan.wallet_delta
                    );
                    summary.record_failure(&plan, e.to_string());
                }
            }
        }

        log::info!(
            "Asoebi commission {mode} finished: examined {}, corrected {}, orphaned {}, failed {}, refunded {:.2}, deducted {:.2}",
            summary.examined,
            summary.corrected,
            summary.orphaned,
            summary.failed,
            summary.total_refunded,
            summary.total_deducted
        );
        Ok(summary)
    }

    /// Write one plan: contribution fix and wallet delta, atomically.
    pub async fn apply_correction(&self, plan: &CorrectionPlan) -> AppResult<()> {
        self.store.apply_correction(plan).await?;
        log::info!("Applied correction: {plan}");
        Ok(())
    }
}

/// Overwrite the commission of every asoebi contribution with `amount`.
///
/// Wallets are left untouched, so balances drift from the ledger until the
/// next `apply` run with a matching rate. Nothing is written unless
/// `confirmed` is set.
pub async fn set_flat_commission(
    store: &dyn LedgerStore,
    amount: f64,
    confirmed: bool,
) -> AppResult<u64> {
    if !confirmed {
        return Err(AppError::ValidationError(
            "refusing to overwrite every asoebi commission without confirmation \
             (wallets are not adjusted)"
                .to_string(),
        ));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::ValidationError(format!(
            "flat commission must be a non-negative number, got {amount}"
        )));
    }
    let updated = store.set_flat_asoebi_commission(amount).await?;
    log::warn!(
        "Set commission {amount:.2} on {updated} asoebi contributions; wallets were NOT adjusted"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserSelector;
    use crate::store::{AsoebiContribution, SeaOrmLedgerStore, UserLedger};
    use crate::test_support::*;
    use async_trait::async_trait;
    use sea_orm::{ConnectionTrait, DatabaseConnection};
    use uuid::Uuid;

    fn service(db: &DatabaseConnection) -> CorrectionService {
        CorrectionService::new(
            Arc::new(SeaOrmLedgerStore::new(db.clone())),
            CommissionRate::new(500).unwrap(),
            0.01,
        )
    }

    /// Breaks the wallet column right after the snapshot is read.
    struct BrokenWalletStore {
        inner: SeaOrmLedgerStore,
        db: DatabaseConnection,
    }

    #[async_trait]
    impl LedgerStore for BrokenWalletStore {
        async fn asoebi_contributions(&self) -> AppResult<Vec<AsoebiContribution>> {
            let rows = self.inner.asoebi_contributions().await?;
            self.db
                .execute_unprepared("ALTER TABLE users RENAME COLUMN wallet TO wallet_gone")
                .await?;
            Ok(rows)
        }

        async fn user_ledger(&self, selector: &UserSelector) -> AppResult<Option<UserLedger>> {
            self.inner.user_ledger(selector).await
        }

        async fn user_ids(&self) -> AppResult<Vec<Uuid>> {
            self.inner.user_ids().await
        }

        async fn apply_correction(&self, plan: &CorrectionPlan) -> AppResult<()> {
            self.inner.apply_correction(plan).await
        }

        async fn set_flat_asoebi_commission(&self, amount: f64) -> AppResult<u64> {
            self.inner.set_flat_asoebi_commission(amount).await
        }
    }

    #[tokio::test]
    async fn test_apply_men_women_example() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 10000.0).await;
        let gift = insert_gift(&db, user.id).await;
        let c = insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.amount = 20000.0;
            c.commission = 5000.0;
            c.asoebi_quantity = Some(1);
            c.asoebi_qty_men = Some(2);
            c.asoebi_qty_women = Some(3);
        })
        .await;

        let summary = service(&db).run(RunMode::Apply).await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.corrected, 1);
        assert_eq!(summary.total_refunded, 2500.0);
        assert_eq!(summary.total_deducted, 0.0);

        let c = reload_contribution(&db, c.id).await;
        assert_eq!(c.commission, 2500.0);
        assert_eq!(c.asoebi_quantity, Some(5));
        assert_eq!(reload_user(&db, user.id).await.wallet, 12500.0);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 0.0).await;
        let gift = insert_gift(&db, user.id).await;
        insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 300.0;
            c.asoebi_quantity = Some(0);
        })
        .await;
        insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 300.0;
            c.asoebi_bride_women_qty = Some(2);
        })
        .await;

        let first = service(&db).run(RunMode::Apply).await.unwrap();
        assert_eq!(first.corrected, 2);
        assert_eq!(first.total_deducted, 200.0 + 700.0);
        let wallet = reload_user(&db, user.id).await.wallet;
        assert_eq!(wallet, -900.0);

        let second = service(&db).run(RunMode::Apply).await.unwrap();
        assert_eq!(second.examined, 2);
        assert_eq!(second.corrected, 0);
        assert_eq!(reload_user(&db, user.id).await.wallet, wallet);
    }

    #[tokio::test]
    async fn test_audit_writes_nothing() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 100.0).await;
        let gift = insert_gift(&db, user.id).await;
        let c = insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 1500.0;
        })
        .await;

        let summary = service(&db).run(RunMode::Audit).await.unwrap();
        assert_eq!(summary.corrected, 1);
        assert_eq!(summary.plans[0].wallet_delta, 1000.0);
        assert_eq!(reload_contribution(&db, c.id).await.commission, 1500.0);
        assert_eq!(reload_user(&db, user.id).await.wallet, 100.0);
    }

    #[tokio::test]
    async fn test_orphans_are_skipped() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 0.0).await;
        let gift = insert_gift(&db, user.id).await;
        let orphan = insert_contribution(&db, Uuid::new_v4(), |c| {
            c.is_asoebi = true;
            c.commission = 5000.0;
        })
        .await;
        insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 1000.0;
        })
        .await;

        let summary = service(&db).run(RunMode::Apply).await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.orphaned, 1);
        assert_eq!(summary.corrected, 1);
        assert!(summary.is_clean());
        assert_eq!(reload_contribution(&db, orphan.id).await.commission, 5000.0);
        assert_eq!(reload_user(&db, user.id).await.wallet, 500.0);
    }

    #[tokio::test]
    async fn test_negative_quantity_is_rejected_and_batch_continues() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 0.0).await;
        let gift = insert_gift(&db, user.id).await;
        let bad = insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 500.0;
            c.asoebi_quantity = Some(-2);
        })
        .await;
        insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 800.0;
        })
        .await;

        let summary = service(&db).run(RunMode::Apply).await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.corrected, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_clean());
        assert_eq!(summary.failures[0].contribution_id, bad.id);
        assert_eq!(summary.failures[0].wallet_delta, 0.0);

        let reloaded = reload_contribution(&db, bad.id).await;
        assert_eq!(reloaded.commission, 500.0);
        assert_eq!(reloaded.asoebi_quantity, Some(-2));
        assert_eq!(reload_user(&db, user.id).await.wallet, 300.0);
    }

    #[tokio::test]
    async fn test_failed_wallet_write_leaves_contribution_untouched() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 0.0).await;
        let gift = insert_gift(&db, user.id).await;
        let c = insert_contribution(&db, gift.id, |c| {
            c.is_asoebi = true;
            c.commission = 5000.0;
            c.asoebi_quantity = Some(1);
        })
        .await;

        let store = BrokenWalletStore {
            inner: SeaOrmLedgerStore::new(db.clone()),
            db: db.clone(),
        };
        let svc = CorrectionService::new(Arc::new(store), CommissionRate::new(500).unwrap(), 0.01);
        let summary = svc.run(RunMode::Apply).await.unwrap();
        assert_eq!(summary.corrected, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].contribution_id, c.id);
        assert_eq!(summary.failures[0].wallet_delta, 4500.0);

        let reloaded = reload_contribution(&db, c.id).await;
        assert_eq!(reloaded.commission, 5000.0);
        assert_eq!(reloaded.asoebi_quantity, Some(1));
    }

    #[tokio::test]
    async fn test_set_flat_commission() {
        let db = sqlite_pool().await;
        let user = insert_user(&db, "host@example.com", 0.0).await;
        let gift = insert_gift(&db, user.id).await;
        let first = insert_contribution(&db, gift.id, |c| c.is_asoebi = true).await;
        insert_contribution(&db, gift.id, |c| c.is_asoebi = true).await;

        let store = SeaOrmLedgerStore::new(db.clone());
        assert!(matches!(
            set_flat_commission(&store, 300.0, false).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(reload_contribution(&db, first.id).await.commission, 0.0);

        assert_eq!(set_flat_commission(&store, 300.0, true).await.unwrap(), 2);
        assert_eq!(reload_contribution(&db, first.id).await.commission, 300.0);
        assert!(matches!(
            set_flat_commission(&store, -1.0, true).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(reload_user(&db, user.id).await.wallet, 0.0);
    }
}
