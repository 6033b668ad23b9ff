use crate::error::{AppError, AppResult};
use crate::models::{CommissionRate, WithdrawalPolicy};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    /// Per-unit asoebi commission. Deliberately has no default.
    #[serde(default)]
    pub rate: Option<i64>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            rate: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconciliationConfig {
    #[serde(default)]
    pub withdrawal_policy: WithdrawalPolicy,
}

fn default_max_connections() -> u32 {
    5
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 配置文件不存在时完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(
                        "DATABASE_URL is not set and no config.toml was found".to_string(),
                    )
                })?;

                Config {
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: default_max_connections(),
                    },
                    commission: CommissionConfig::default(),
                    reconciliation: ReconciliationConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Cannot read config file {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        config.apply_env_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    fn apply_env_overrides<F>(&mut self, get_env: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        // 佣金费率解析失败直接报错，不能静默忽略
        if let Some(v) = get_env("COMMISSION_RATE") {
            let rate = v.trim().parse::<i64>().map_err(|_| {
                AppError::ConfigError(format!("COMMISSION_RATE is not an integer: {v}"))
            })?;
            self.commission.rate = Some(rate);
        }
        if let Some(v) = get_env("COMMISSION_TOLERANCE") {
            self.commission.tolerance = v.trim().parse::<f64>().map_err(|_| {
                AppError::ConfigError(format!("COMMISSION_TOLERANCE is not a number: {v}"))
            })?;
        }
        if let Some(v) = get_env("WITHDRAWAL_POLICY") {
            self.reconciliation.withdrawal_policy = v.parse()?;
        }
        Ok(())
    }

    /// The configured per-unit rate. Refuses to guess when it is missing.
    pub fn commission_rate(&self) -> AppResult<CommissionRate> {
        let rate = self.commission.rate.ok_or_else(|| {
            AppError::ConfigError(
                "commission.rate (COMMISSION_RATE) must be set before running corrections"
                    .to_string(),
            )
        })?;
        CommissionRate::new(rate)
    }

    pub fn tolerance(&self) -> AppResult<f64> {
        let t = self.commission.tolerance;
        if !t.is_finite() || t < 0.0 {
            return Err(AppError::ConfigError(format!(
                "commission.tolerance must be a non-negative number, got {t}"
            )));
        }
        Ok(t)
    }
}
