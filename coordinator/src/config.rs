use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the coordinator listens on
    pub port: u16,
    /// Path to the coordinator SQLite database
    pub database_url: String,
    /// Path to the initiative ledger JSON document
    pub ledger_path: String,
    /// Base URL of the agent gateway
    pub gateway_base_url: String,
    /// Bearer token for gateway calls, if the gateway requires one
    pub gateway_token: Option<String>,
    /// Timeout applied to each outbound gateway call
    pub gateway_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_parse("COORDINATOR_PORT", 9100)?,
            database_url: env_str(
                "COORDINATOR_DATABASE_URL",
                "sqlite:./data/mission-control.db",
            ),
            ledger_path: env_str("LEDGER_PATH", "./data/initiatives.json"),
            gateway_base_url: env_str("GATEWAY_BASE_URL", "http://127.0.0.1:18789"),
            gateway_token: std::env::var("GATEWAY_TOKEN").ok(),
            gateway_timeout: Duration::from_secs(env_parse("GATEWAY_TIMEOUT_SECS", 60)?),
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
