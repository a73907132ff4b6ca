use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use sheets::remote::DEFAULT_API_URL;
use tracing::{info, warn};

const DEFAULT_PLAN_SPREADSHEET: &str = "1pkFF954kWh1aCAlyMlIjk7eQL1Povn3vO_5aJFxkM4c";
const DEFAULT_IMPROVEMENT_SPREADSHEET: &str = "1QrTeZH7VhvRFfWvr2OKti80ePAO2qMN2DDLI6Lcm5Kc";
const DEFAULT_CARDS_SPREADSHEET: &str = "1IJGQWq9c6RCvrhSGZSdSACm2sQ_GhcnrchlJX0XRHOE";

/// Where one endpoint family keeps its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddress {
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub skip_header_row: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sheets_api_url: String,
    pub token_file: PathBuf,
    pub request_timeout: Duration,
    pub allowed_origins: Vec<String>,
    pub plan: StoreAddress,
    pub improvement: StoreAddress,
    pub cards: StoreAddress,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let loader = Loader { lookup };

        Ok(Self {
            port: loader.try_load("RUST_PORT", "1111")?,
            sheets_api_url: loader.try_load("SHEETS_API_URL", DEFAULT_API_URL)?,
            token_file: loader
                .try_load("SHEETS_TOKEN_FILE", "/run/secrets/SHEETS_ACCESS_TOKEN")?,
            request_timeout: Duration::from_secs(loader.try_load("SHEETS_TIMEOUT_SECS", "30")?),
            allowed_origins: parse_origins(&loader.try_load::<String>("ALLOWED_ORIGINS", "*")?),
            plan: StoreAddress {
                spreadsheet_id: loader
                    .try_load("PLAN_SPREADSHEET_ID", DEFAULT_PLAN_SPREADSHEET)?,
                worksheet: loader.try_load("PLAN_WORKSHEET", "plan")?,
                skip_header_row: loader.try_load("PLAN_SKIP_HEADER", "false")?,
            },
            improvement: StoreAddress {
                spreadsheet_id: loader
                    .try_load("IMPROVEMENT_SPREADSHEET_ID", DEFAULT_IMPROVEMENT_SPREADSHEET)?,
                worksheet: loader.try_load("IMPROVEMENT_WORKSHEET", "Datos")?,
                skip_header_row: loader.try_load("IMPROVEMENT_SKIP_HEADER", "true")?,
            },
            cards: StoreAddress {
                spreadsheet_id: loader
                    .try_load("CARDS_SPREADSHEET_ID", DEFAULT_CARDS_SPREADSHEET)?,
                worksheet: loader.try_load("CARDS_WORKSHEET", "Datos")?,
                skip_header_row: false,
            },
        })
    }
}

struct Loader<F> {
    lookup: F,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn try_load<T: FromStr>(&self, key: &str, default: &str) -> anyhow::Result<T>
    where
        T::Err: Display,
    {
        let value = (self.lookup)(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        });

        value.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured, {key}={value}: {e}")
        })
    }
}

fn var(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("Environment variable {key} not found"))
}

/// Comma separated list, `*` anywhere means any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        vec!["*".to_string()]
    } else {
        origins
    }
}
