//! Environment-keyed process configuration, parsed once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input).map_err(|err| format!("invalid duration {input:?}: {err}"))
}

fn parse_addr(input: &str) -> Result<SocketAddr, String> {
    input
        .parse()
        .map_err(|err| format!("invalid listen address {input:?}: {err}"))
}

/// Process-wide configuration, sourced from environment variables (see the
/// `EXCHANGE_*` table). Every field also accepts a matching CLI flag for local
/// runs, but the external contract is the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "exchange", about = "Ad-exchange fan-out playground")]
pub struct Config {
    /// How often the cache reloads its snapshots.
    #[arg(
        long,
        env = "EXCHANGE_CACHE_UPDATE_INTERVAL",
        value_parser = parse_duration,
        default_value = "1m"
    )]
    pub cache_update_interval: Duration,

    /// JSON source file for the apps snapshot.
    #[arg(long, env = "EXCHANGE_APPS_CACHE_PATH", default_value = "apps.json")]
    pub apps_cache_path: String,

    /// JSON source file for the DSP roster.
    #[arg(long, env = "EXCHANGE_DSPS_CACHE_PATH", default_value = "dsps.json")]
    pub dsps_cache_path: String,

    /// Number of dispatch workers.
    #[arg(long, env = "EXCHANGE_DSPIO_POOL", default_value_t = 100)]
    pub dspio_pool: usize,

    /// Transport idle pool total.
    #[arg(long, env = "EXCHANGE_DSPIO_MAX_IDLE_CONNS", default_value_t = 100)]
    pub dspio_max_idle_conns: usize,

    /// Transport idle pool per host.
    #[arg(long, env = "EXCHANGE_DSPIO_MAX_IDLE_CONNS_PER_HOST", default_value_t = 100)]
    pub dspio_max_idle_conns_per_host: usize,

    /// Transport idle-connection eviction timeout.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_IDLE_CONN_TIMEOUT",
        value_parser = parse_duration,
        default_value = "15s"
    )]
    pub dspio_idle_conn_timeout: Duration,

    /// TCP keep-alive interval.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_KEEP_ALIVE",
        value_parser = parse_duration,
        default_value = "30s"
    )]
    pub dspio_keep_alive: Duration,

    /// Dial timeout.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_TIMEOUT",
        value_parser = parse_duration,
        default_value = "30s"
    )]
    pub dspio_timeout: Duration,

    /// Response-header wait timeout.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_RESPONSE_HEADER_TIMEOUT",
        value_parser = parse_duration,
        default_value = "10s"
    )]
    pub dspio_response_header_timeout: Duration,

    /// Expect-continue wait timeout.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_EXPECT_CONTINUE_TIMEOUT",
        value_parser = parse_duration,
        default_value = "1s"
    )]
    pub dspio_expect_continue_timeout: Duration,

    /// Prefer HTTP/2 to DSPs.
    #[arg(long, env = "EXCHANGE_DSPIO_FORCE_HTTP2", default_value_t = true)]
    pub dspio_force_http2: bool,

    /// Skip TLS certificate verification (playground only).
    #[arg(long, env = "EXCHANGE_DSPIO_INSECURE_SKIP_VERIFY", default_value_t = true)]
    pub dspio_insecure_skip_verify: bool,

    /// Size of the TLS session resumption cache.
    #[arg(long, env = "EXCHANGE_DSPIO_TLS_SESSION_CACHE", default_value_t = 256)]
    pub dspio_tls_session_cache: usize,

    /// Per-ad-request fan-out deadline.
    #[arg(
        long,
        env = "EXCHANGE_DSPIO_REQUEST_TIMEOUT",
        value_parser = parse_duration,
        default_value = "500ms"
    )]
    pub dspio_request_timeout: Duration,

    /// HTTP listen address.
    #[arg(
        long,
        env = "EXCHANGE_LISTEN_ADDR",
        value_parser = parse_addr,
        default_value = "0.0.0.0:8080"
    )]
    pub listen_addr: SocketAddr,

    /// Graceful-shutdown drain window.
    #[arg(
        long,
        env = "EXCHANGE_SHUTDOWN_DRAIN",
        value_parser = parse_duration,
        default_value = "5s"
    )]
    pub shutdown_drain: Duration,
}

impl Config {
    /// Parse configuration from the process environment (and, for local runs,
    /// matching CLI flags).
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        Config::try_parse().map_err(|err| crate::error::ConfigError::Parse(err.to_string()))
    }
}
