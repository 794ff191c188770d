use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the search queue
    pub redis_url: String,

    /// Base URL of the external extraction service
    #[serde(default = "default_extractor_url")]
    pub extractor_url: String,

    /// Bearer token for the extraction service
    pub extractor_token: Option<String>,

    /// Seconds without progress before a running search is failed
    #[serde(default = "default_stall_threshold_secs")]
    pub stall_threshold_secs: u64,

    /// Seconds between watchdog sweeps
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,

    /// Days of projected prices in trend charts
    #[serde(default = "default_future_days")]
    pub future_days: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_extractor_url() -> String {
    "http://localhost:8088".to_string()
}

fn default_stall_threshold_secs() -> u64 {
    900
}

fn default_watchdog_interval_secs() -> u64 {
    60
}

fn default_future_days() -> u32 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_settings() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/rates".to_string()),
            ("REDIS_URL".to_string(), "redis://localhost".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.stall_threshold_secs, 900);
        assert_eq!(config.watchdog_interval_secs, 60);
        assert_eq!(config.future_days, 30);
        assert!(config.extractor_token.is_none());
    }

    #[test]
    fn test_database_url_is_required() {
        let vars = vec![("REDIS_URL".to_string(), "redis://localhost".to_string())];
        assert!(envy::from_iter::<_, AppConfig>(vars).is_err());
    }
}
