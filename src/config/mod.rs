//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const ENV_PREFIX: &str = "VITRINE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_L0_QUERY_LIMIT: usize = 256;
const DEFAULT_L1_RESPONSE_LIMIT: usize = 64;
const DEFAULT_AUTO_CONSUME_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_FETCH_DELAY_MS: u64 = 800;
const DEFAULT_WRITE_DELAY_MS: u64 = 500;

/// Command-line arguments for the Vitrine binary.
#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about = "Vitrine product catalog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VITRINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Resolve one products listing and print the rendered fragment.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderArgs {
    /// Raw query string, e.g. `q=shoes&page=2`.
    #[arg(long = "query", value_name = "QUERY", default_value = "")]
    pub query: String,

    #[command(flatten)]
    pub catalog: CatalogOverrides,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CatalogOverrides {
    /// Override the simulated listing latency.
    #[arg(long = "catalog-fetch-delay-ms", value_name = "MILLIS")]
    pub fetch_delay_ms: Option<u64>,

    /// Override the simulated write latency.
    #[arg(long = "catalog-write-delay-ms", value_name = "MILLIS")]
    pub write_delay_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub catalog: CatalogOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the listing query cache.
    #[arg(
        long = "cache-enable-l0",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enable_l0: Option<bool>,

    /// Toggle the response cache.
    #[arg(
        long = "cache-enable-l1",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enable_l1: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enable_l0_cache: bool,
    pub enable_l1_cache: bool,
    pub l0_query_limit: usize,
    pub l1_response_limit: usize,
    pub auto_consume_interval_ms: u64,
    pub consume_batch_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enable_l0_cache: true,
            enable_l1_cache: true,
            l0_query_limit: DEFAULT_L0_QUERY_LIMIT,
            l1_response_limit: DEFAULT_L1_RESPONSE_LIMIT,
            auto_consume_interval_ms: DEFAULT_AUTO_CONSUME_INTERVAL_MS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

/// Latency of the simulated backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub fetch_delay_ms: u64,
    pub write_delay_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            fetch_delay_ms: DEFAULT_FETCH_DELAY_MS,
            write_delay_ms: DEFAULT_WRITE_DELAY_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_render_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enable_l0 {
            self.cache.enable_l0_cache = Some(enabled);
        }
        if let Some(enabled) = overrides.cache_enable_l1 {
            self.cache.enable_l1_cache = Some(enabled);
        }

        self.apply_catalog_overrides(&overrides.catalog);
    }

    fn apply_render_overrides(&mut self, args: &RenderArgs) {
        if let Some(level) = args.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        self.apply_catalog_overrides(&args.catalog);
    }

    fn apply_catalog_overrides(&mut self, overrides: &CatalogOverrides) {
        if let Some(delay) = overrides.fetch_delay_ms {
            self.catalog.fetch_delay_ms = Some(delay);
        }
        if let Some(delay) = overrides.write_delay_ms {
            self.catalog.write_delay_ms = Some(delay);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            catalog,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            catalog: build_catalog_settings(catalog),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheSettings::default();

    let settings = CacheSettings {
        enable_l0_cache: cache.enable_l0_cache.unwrap_or(defaults.enable_l0_cache),
        enable_l1_cache: cache.enable_l1_cache.unwrap_or(defaults.enable_l1_cache),
        l0_query_limit: cache.l0_query_limit.unwrap_or(defaults.l0_query_limit),
        l1_response_limit: cache.l1_response_limit.unwrap_or(defaults.l1_response_limit),
        auto_consume_interval_ms: cache
            .auto_consume_interval_ms
            .unwrap_or(defaults.auto_consume_interval_ms),
        consume_batch_limit: cache
            .consume_batch_limit
            .unwrap_or(defaults.consume_batch_limit),
    };

    for (key, value) in [
        ("cache.l0_query_limit", settings.l0_query_limit as u64),
        ("cache.l1_response_limit", settings.l1_response_limit as u64),
        ("cache.auto_consume_interval_ms", settings.auto_consume_interval_ms),
        ("cache.consume_batch_limit", settings.consume_batch_limit as u64),
    ] {
        if value == 0 {
            return Err(LoadError::invalid(key, "must be greater than zero"));
        }
    }

    Ok(settings)
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> CatalogSettings {
    CatalogSettings {
        fetch_delay_ms: catalog.fetch_delay_ms.unwrap_or(DEFAULT_FETCH_DELAY_MS),
        write_delay_ms: catalog.write_delay_ms.unwrap_or(DEFAULT_WRITE_DELAY_MS),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enable_l0_cache: Option<bool>,
    enable_l1_cache: Option<bool>,
    l0_query_limit: Option<usize>,
    l1_response_limit: Option<usize>,
    auto_consume_interval_ms: Option<u64>,
    consume_batch_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    fetch_delay_ms: Option<u64>,
    write_delay_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
        assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert_eq!(settings.cache, CacheSettings::default());
        assert_eq!(settings.catalog.fetch_delay_ms, 800);
        assert_eq!(settings.catalog.write_delay_ms, 500);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.catalog.fetch_delay_ms = Some(10);

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            catalog: CatalogOverrides {
                fetch_delay_ms: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.catalog.fetch_delay_ms, 0);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn cache_toggles_can_be_overridden() {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            cache_enable_l1: Some(false),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(settings.cache.enable_l0_cache);
        assert!(!settings.cache.enable_l1_cache);
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key: "server.port", .. })
        ));

        let mut raw = RawSettings::default();
        raw.cache.auto_consume_interval_ms = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "cache.auto_consume_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn unparsable_level_is_rejected() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("loud".to_string());
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid {
                key: "logging.level",
                ..
            })
        ));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["vitrine"]);
        assert!(args.command.is_none());
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "vitrine",
            "serve",
            "--server-port",
            "8080",
            "--cache-enable-l0",
            "false",
            "--catalog-fetch-delay-ms",
            "0",
        ]);

        match args.command {
            Some(Command::Serve(serve)) => {
                assert_eq!(serve.overrides.server_port, Some(8080));
                assert_eq!(serve.overrides.cache_enable_l0, Some(false));
                assert_eq!(serve.overrides.catalog.fetch_delay_ms, Some(0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_render_arguments() {
        let args = CliArgs::parse_from(["vitrine", "render", "--query", "q=shoes&page=2"]);

        match args.command {
            Some(Command::Render(render)) => {
                assert_eq!(render.query, "q=shoes&page=2");
                assert_eq!(render.catalog.fetch_delay_ms, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
