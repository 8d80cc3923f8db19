use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use dealroom_core::WorkflowConfig;

/// JWT secrets that ship in sample `.env` files and must never be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub workflow: WorkflowConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("DEALROOM_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DEALROOM_JWT_SECRET is unset or still a placeholder");
        }

        let defaults = WorkflowConfig::default();
        let workflow = WorkflowConfig {
            platform_fee_bps: parse_or(
                &lookup,
                "DEALROOM_PLATFORM_FEE_BPS",
                defaults.platform_fee_bps,
            )?,
            default_delivery_days: parse_or(
                &lookup,
                "DEALROOM_DEFAULT_DELIVERY_DAYS",
                defaults.default_delivery_days,
            )?,
            default_max_revisions: parse_or(
                &lookup,
                "DEALROOM_DEFAULT_MAX_REVISIONS",
                defaults.default_max_revisions,
            )?,
        };
        if workflow.platform_fee_bps > 10_000 {
            bail!("DEALROOM_PLATFORM_FEE_BPS must be at most 10000");
        }

        Ok(Self {
            host: lookup("DEALROOM_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "DEALROOM_PORT", 3000)?,
            db_path: lookup("DEALROOM_DB_PATH")
                .unwrap_or_else(|| "dealroom.db".into())
                .into(),
            jwt_secret,
            workflow,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: '{raw}'")),
        None => Ok(default),
    }
}
