use std::net::IpAddr;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::lister::DEFAULT_CATEGORY_LIMIT;

pub const DEFAULT_CREDENTIALS_PATH: &str = "creds/service_account.json";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub database_url: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Credentials {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("credentials file {} could not be read", path.display()))?;
        let credentials: Credentials = serde_json::from_str(&raw)
            .with_context(|| format!("credentials file {} is not valid", path.display()))?;
        if credentials.database_url.trim().is_empty() {
            bail!("credentials file {} has an empty database_url", path.display());
        }
        Ok(credentials)
    }

    /// `DATABASE_URL` wins over the credentials file.
    pub fn resolve(env_url: Option<String>, path: &Path) -> anyhow::Result<Self> {
        match env_url.filter(|url| !url.trim().is_empty()) {
            Some(database_url) => Ok(Self {
                database_url,
                project_id: None,
            }),
            None => Self::from_file(path),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub debug: bool,
    pub category_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub debug: bool,
    pub category_limit: u32,
}

impl ServerConfig {
    pub fn from_env(overrides: ServeOverrides) -> anyhow::Result<Self> {
        Self::build(
            std::env::var("PORT").ok(),
            std::env::var("DEBUG").ok(),
            overrides,
        )
    }

    fn build(
        env_port: Option<String>,
        env_debug: Option<String>,
        overrides: ServeOverrides,
    ) -> anyhow::Result<Self> {
        let port = match (overrides.port, env_port) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{raw}'"))?,
            (None, None) => DEFAULT_PORT,
        };

        let category_limit = overrides.category_limit.unwrap_or(DEFAULT_CATEGORY_LIMIT);
        if category_limit == 0 {
            bail!("category limit must be a positive integer");
        }

        Ok(Self {
            host: overrides.host.unwrap_or(IpAddr::from([0, 0, 0, 0])),
            port,
            debug: overrides.debug || env_debug.as_deref().is_some_and(is_truthy),
            category_limit,
        })
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
