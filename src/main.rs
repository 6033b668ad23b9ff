use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use std::fmt::Display;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

use giftwallet::{
    AppError,
    config::Config,
    database::{DbPool, create_pool, run_migrations},
    models::{CorrectionSummary, RunMode, UserSelector},
    services::{CorrectionService, ReconciliationService, ReferralService, set_flat_commission},
    store::SeaOrmLedgerStore,
    utils::init_logger,
};

#[derive(Debug, Parser)]
#[command(
    name = "giftwallet",
    version,
    about = "Wallet reconciliation and asoebi commission tooling"
)]
struct Cli {
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List asoebi commission corrections without writing anything
    Audit,
    /// Apply asoebi commission corrections and adjust wallets
    Apply,
    /// Compare stored wallets against contribution and withdrawal history
    #[command(group(ArgGroup::new("target").required(true).args(["user_id", "email", "all"])))]
    Reconcile {
        #[arg(long, env = "RECONCILE_USER_ID")]
        user_id: Option<Uuid>,
        #[arg(long, env = "RECONCILE_USER_EMAIL")]
        email: Option<String>,
        #[arg(long)]
        all: bool,
        /// With --all, also print users whose wallet is fine
        #[arg(long)]
        verbose: bool,
    },
    /// Overwrite the commission of every asoebi contribution (wallets untouched)
    SetFlatCommission {
        #[arg(long)]
        amount: f64,
        /// Required confirmation for the bulk write
        #[arg(long)]
        yes: bool,
    },
    /// Give every user without a referral code a fresh one
    BackfillReferralCodes,
    /// Run pending schema migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // 已提交的修正不会回滚，日志里逐条记录过
            log::error!("Run aborted: {e:#}");
            if json {
                let code = e
                    .downcast_ref::<AppError>()
                    .map(AppError::code)
                    .unwrap_or("INTERNAL_ERROR");
                println!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": { "code": code, "message": format!("{e:#}") }
                    })
                );
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::from_toml()?;

    match cli.command {
        Command::Audit => run_corrections(&config, RunMode::Audit, cli.json).await,
        Command::Apply => run_corrections(&config, RunMode::Apply, cli.json).await,
        Command::Reconcile {
            user_id,
            email,
            all,
            verbose,
        } => {
            let tolerance = config.tolerance()?;
            let pool = connect(&config).await?;
            let service = ReconciliationService::new(
                Arc::new(SeaOrmLedgerStore::new(pool)),
                config.reconciliation.withdrawal_policy,
                tolerance,
            );
            if all {
                let reports = service.reconcile_all().await?;
                let shown: Vec<_> = reports
                    .into_iter()
                    .filter(|r| verbose || r.needs_attention())
                    .collect();
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&shown)?);
                } else if shown.is_empty() {
                    println!("All wallets reconcile.");
                } else {
                    for report in &shown {
                        println!("{report}");
                    }
                }
            } else {
                let selector = match (user_id, email) {
                    (Some(id), _) => UserSelector::Id(id),
                    (None, Some(email)) => UserSelector::Email(email),
                    (None, None) => anyhow::bail!("either --user-id or --email is required"),
                };
                let report = service.reconcile_user(&selector).await?;
                emit(cli.json, &report)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::SetFlatCommission { amount, yes } => {
            let store = SeaOrmLedgerStore::new(connect(&config).await?);
            let updated = set_flat_commission(&store, amount, yes).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "updated": updated, "commission": amount }));
            } else {
                println!("Set commission {amount:.2} on {updated} asoebi contributions");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::BackfillReferralCodes => {
            let summary = ReferralService::new(connect(&config).await?)
                .backfill_referral_codes()
                .await?;
            emit(cli.json, &summary)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Migrate => {
            run_migrations(&connect(&config).await?)
                .await
                .context("Failed to run database migrations")?;
            log::info!("Migrations applied");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_corrections(config: &Config, mode: RunMode, json: bool) -> anyhow::Result<ExitCode> {
    // 费率和容差在连接数据库之前校验
    let rate = config.commission_rate()?;
    let tolerance = config.tolerance()?;
    let store = Arc::new(SeaOrmLedgerStore::new(connect(config).await?));

    let summary = CorrectionService::new(store, rate, tolerance)
        .run(mode)
        .await?;
    emit(json, &summary)?;
    Ok(correction_exit_code(&summary))
}

async fn connect(config: &Config) -> anyhow::Result<DbPool> {
    create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")
}

fn correction_exit_code(summary: &CorrectionSummary) -> ExitCode {
    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn emit<T: Serialize + Display>(json: bool, value: &T) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value}");
    }
    Ok(())
}
