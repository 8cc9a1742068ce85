use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Command-line flags. Only flags actually given override lower layers.
#[derive(Parser, Serialize, Debug, Default)]
#[command(name = "murmur-server", version, about = "murmur realtime messaging server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, env = "MURMUR_CONFIG", default_value = "./murmur.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Effective server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,

    /// Shared HS256 secret used by the account service to sign tokens.
    /// When unset, a random key is generated into data_dir/jwt_secret.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            jwt_secret: None,
            realtime: RealtimeConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Keepalive settings for realtime connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

/// Per-IP rate limit on the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request (default: 9, about 100 per 15 minutes)
    #[serde(default = "default_replenish_secs")]
    pub replenish_secs: u64,

    /// Requests allowed in a burst (default: 100)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            replenish_secs: 9,
            burst_size: 100,
        }
    }
}

fn default_replenish_secs() -> u64 {
    9
}

fn default_burst_size() -> u32 {
    100
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (MURMUR_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }

    fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("MURMUR_").split("__"))
            .merge(Serialized::defaults(cli))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# murmur realtime server configuration
# Place this file at ./murmur.toml or specify with --config <path>
# All settings can be overridden via environment variables (MURMUR_PORT,
# MURMUR_REALTIME__PING_INTERVAL_SECS, ...) or CLI flags (--port, ...)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and generated JWT key
# data_dir = "./data"

# Shared HS256 secret of the account service. Leave unset to generate one.
# jwt_secret = ""

# ---- Realtime connections ----
# [realtime]
# ping_interval_secs = 30
# pong_timeout_secs = 10

# ---- REST rate limiting (per client IP) ----
# [rate_limit]
# replenish_secs = 9
# burst_size = 100
"#
    .to_string()
}
