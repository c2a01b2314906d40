use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
    pub debug: bool,
    pub tls: bool,
    pub cert_file: String,
    pub key_file: String,
    /// Directory holding `html/` and `static/`. Resolved at startup when unset.
    pub ui_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub lifetime_hours: i64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub csp: String,
    pub server_header: String,
    pub enable_hsts: bool,
    pub hsts_max_age: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

/// Command line flags. Every flag is optional so that unset flags fall through
/// to the environment and the config files.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "snippetbox")]
#[command(about = "Create, view and share text snippets", long_about = None)]
pub struct Cli {
    /// HTTP network address, e.g. `:4000` or `127.0.0.1:4000`.
    #[arg(long)]
    pub addr: Option<String>,

    /// SQLite data source name.
    #[arg(long)]
    pub dsn: Option<String>,

    /// Enable debug logging and the diagnostics endpoint.
    #[arg(long)]
    pub debug: bool,

    /// Serve HTTPS using --cert and --key.
    #[arg(long)]
    pub tls: bool,

    /// TLS certificate (PEM).
    #[arg(long)]
    pub cert: Option<String>,

    /// TLS private key (PEM).
    #[arg(long)]
    pub key: Option<String>,

    /// Additional config file layered over the defaults.
    #[arg(long, env = "SNIPPETBOX_CONFIG")]
    pub config: Option<PathBuf>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // The embedded defaults are part of the binary; failing here is a build defect.
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => panic!("Failed to load embedded default config: {}", e),
        }
    }
}

impl AppConfig {
    /// The listen address as a socket address. Accepts the `:4000` shorthand.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = normalize_addr(&self.server.addr);
        addr.parse().map_err(|e| anyhow::anyhow!("invalid server.addr {}: {}", self.server.addr, e))
    }

    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.database.query_timeout_secs)
    }
}

fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Loads configuration with precedence (lowest first): embedded defaults,
/// `snippetbox.toml`, `--config` file, `SNIPPETBOX__*` env, `DATABASE_URL` / `PORT`,
/// command line flags.
pub fn load(cli: &Cli) -> anyhow::Result<AppConfig> {
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("snippetbox").required(false));

    if let Some(path) = &cli.config {
        builder = builder.add_source(::config::File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(::config::Environment::with_prefix("SNIPPETBOX").separator("__"));

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            builder = builder.set_override("database.url", url)?;
        }
    }
    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| anyhow::anyhow!("invalid PORT: {}", port))?;
        builder = builder.set_override("server.addr", format!("0.0.0.0:{}", port))?;
    }

    let mut app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    apply_cli(&mut app_cfg, cli);
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn apply_cli(cfg: &mut AppConfig, cli: &Cli) {
    if let Some(addr) = &cli.addr {
        cfg.server.addr = addr.clone();
    }
    if let Some(dsn) = &cli.dsn {
        cfg.database.url = dsn.clone();
    }
    if cli.debug {
        cfg.server.debug = true;
    }
    if cli.tls {
        cfg.server.tls = true;
    }
    if let Some(cert) = &cli.cert {
        cfg.server.cert_file = cert.clone();
    }
    if let Some(key) = &cli.key {
        cfg.server.key_file = key.clone();
    }
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    let addr = cfg.listen_addr()?;
    #[cfg(unix)]
    if addr.port() != 0 && addr.port() < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", addr.port());
    }

    if cfg.database.url.trim().is_empty() {
        return Err(anyhow::anyhow!("database.url must not be empty"));
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }
    if cfg.database.query_timeout_secs == 0 {
        return Err(anyhow::anyhow!("database.query_timeout_secs must be > 0"));
    }

    if cfg.session.lifetime_hours <= 0 || cfg.session.lifetime_hours > 24 * 366 {
        return Err(anyhow::anyhow!("session.lifetime_hours must be between 1 and 8784"));
    }
    if cfg.session.cookie_name.trim().is_empty() {
        return Err(anyhow::anyhow!("session.cookie_name must not be empty"));
    }
    if cfg.session.cleanup_interval_secs == 0 {
        return Err(anyhow::anyhow!("session.cleanup_interval_secs must be > 0"));
    }

    if cfg.server.tls {
        if cfg.server.cert_file.trim().is_empty() || cfg.server.key_file.trim().is_empty() {
            return Err(anyhow::anyhow!("TLS requires both a certificate and a key"));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            return Ok(());
        }
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
