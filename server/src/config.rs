use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Tab sync server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "tabsync-server", version, about = "Real-time browser tab sync server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TABSYNC_PORT", default_value = "5000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TABSYNC_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./tabsync.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TABSYNC_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (flagged URL database)
    #[arg(long, env = "TABSYNC_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Seconds between server WebSocket pings
    #[arg(long, env = "TABSYNC_PING_INTERVAL_SECS", default_value = "30")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing the connection
    #[arg(long, env = "TABSYNC_PONG_TIMEOUT_SECS", default_value = "10")]
    pub pong_timeout_secs: u64,

    /// URLs flagged at startup (loaded from `flagged_urls` in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub flagged_urls: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
            config: "./tabsync.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            flagged_urls: Vec::new(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TABSYNC_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let matches = Config::command().get_matches();
        let cli = Config::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        Self::figment(cli, &matches).extract()
    }

    fn figment(cli: Config, matches: &ArgMatches) -> Figment {
        let config_path = cli.config.clone();
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("TABSYNC_"))
            .merge(Serialized::defaults(CliOverrides::new(cli, matches)))
    }
}

/// The CLI arguments actually typed on the command line. Values clap filled
/// in from its defaults are left out so they do not mask the TOML file.
#[derive(Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind_address: Option<String>,
    config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_logs: Option<bool>,
    generate_config: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pong_timeout_secs: Option<u64>,
}

impl CliOverrides {
    fn new(cli: Config, matches: &ArgMatches) -> Self {
        let passed = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
        Self {
            port: passed("port").then_some(cli.port),
            bind_address: passed("bind_address").then_some(cli.bind_address),
            config: cli.config,
            json_logs: passed("json_logs").then_some(cli.json_logs),
            generate_config: cli.generate_config,
            data_dir: passed("data_dir").then_some(cli.data_dir),
            ping_interval_secs: passed("ping_interval_secs").then_some(cli.ping_interval_secs),
            pong_timeout_secs: passed("pong_timeout_secs").then_some(cli.pong_timeout_secs),
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Tab sync server configuration
# Place this file at ./tabsync.toml or specify with --config <path>
# All settings can be overridden via environment variables (TABSYNC_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5000)
# port = 5000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- WebSocket heartbeat ----
# ping_interval_secs = 30
# pong_timeout_secs = 10

# ---- Flagged URLs ----
# Tabs showing one of these URLs are reported by /api/tabs/live and closed
# by /api/tabs/close-live. Compared after stripping the scheme, "www." and
# a trailing slash. Added to the database at startup.
# flagged_urls = ["chatgpt.com", "claude.ai"]
"#
    .to_string()
}
