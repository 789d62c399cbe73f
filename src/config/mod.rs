//! Configuration management
//!
//! All settings resolve from environment variables with local-development
//! defaults. Telephony and realtime credentials stay optional here; their
//! absence is reported at call time through the failed-record path rather
//! than at startup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub telephony: TelephonyConfig,
    pub realtime: RealtimeConfig,
    pub database: DatabaseConfig,
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Plivo account auth ID
    pub auth_id: Option<String>,
    /// Plivo account auth token; also used to verify webhook signatures
    pub auth_token: Option<String>,
    /// Plivo REST API root
    pub api_root: String,
    /// Public base URL used to construct webhook callback URLs
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// AI backend API key
    pub api_key: Option<String>,
    /// Realtime session WebSocket endpoint
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
    /// Calls without a terminal event after this many seconds are failed.
    /// 0 disables the watchdog.
    pub inactivity_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            telephony: TelephonyConfig {
                auth_id: None,
                auth_token: None,
                api_root: "https://api.plivo.com/v1".to_string(),
                base_url: "http://localhost:8000".to_string(),
            },
            realtime: RealtimeConfig {
                api_key: None,
                endpoint: "wss://api.openai.com/v1/realtime".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://postgres@localhost/voxdial".to_string(),
            },
            watchdog: WatchdogConfig {
                sweep_interval_secs: 60,
                inactivity_window_secs: 3600,
            },
        }
    }
}

impl Config {
    /// Resolve configuration from environment variables, falling back to
    /// the local-development defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                host: env_or("VOXDIAL_HOST", defaults.server.host),
                port: env_parse_or("VOXDIAL_PORT", defaults.server.port),
            },
            telephony: TelephonyConfig {
                auth_id: std::env::var("PLIVO_AUTH_ID").ok(),
                auth_token: std::env::var("PLIVO_AUTH_TOKEN").ok(),
                api_root: env_or("PLIVO_API_ROOT", defaults.telephony.api_root),
                base_url: env_or("BASE_URL", defaults.telephony.base_url),
            },
            realtime: RealtimeConfig {
                api_key: std::env::var("OPENAI_API_KEY").ok(),
                endpoint: env_or("REALTIME_ENDPOINT", defaults.realtime.endpoint),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", defaults.database.url),
            },
            watchdog: WatchdogConfig {
                sweep_interval_secs: env_parse_or(
                    "VOXDIAL_WATCHDOG_INTERVAL_SECS",
                    defaults.watchdog.sweep_interval_secs,
                ),
                inactivity_window_secs: env_parse_or(
                    "VOXDIAL_WATCHDOG_WINDOW_SECS",
                    defaults.watchdog.inactivity_window_secs,
                ),
            },
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.telephony.base_url, "http://localhost:8000");
        assert!(config.telephony.auth_id.is_none());
        assert_eq!(config.watchdog.sweep_interval_secs, 60);
    }
}
