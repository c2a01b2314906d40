use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snippetbox::config::{self, AppConfig, Cli};
use snippetbox::models::{SqliteSnippetStore, SqliteUserStore};
use snippetbox::session::{spawn_cleanup_task, SqliteSessionStore};
use snippetbox::state::AppState;
use snippetbox::templates::{resolve_ui_dir, Templates};
use snippetbox::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Layered configuration: embedded defaults -> snippetbox.toml -> --config -> env -> flags
    let app_cfg = config::load(&cli)?;

    // Logging: stdout + daily rotating file
    std::fs::create_dir_all(&app_cfg.logging.dir).ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily(&app_cfg.logging.dir, &app_cfg.logging.file_name);
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let default_filter = if app_cfg.server.debug { "debug" } else { "info,tower_http=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Guards must outlive the server so buffered lines are flushed on exit.
    let _log_guards = (stdout_guard, file_guard);

    let addr = app_cfg.listen_addr()?;

    let pool = db::connect(&app_cfg.database).await?;
    db::init_db(&pool).await?;

    let session_store = SqliteSessionStore::new(pool.clone());
    let _cleanup = spawn_cleanup_task(
        session_store.clone(),
        Duration::from_secs(app_cfg.session.cleanup_interval_secs),
    );
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name(app_cfg.session.cookie_name.clone())
        .with_secure(app_cfg.server.tls)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(app_cfg.session.lifetime_hours)));

    let ui_dir = resolve_ui_dir(app_cfg.server.ui_dir.as_deref());
    let templates = Templates::load(&ui_dir)?;
    info!("Loaded templates from {}", ui_dir.display());

    let timeout = app_cfg.query_timeout();
    let state = AppState::new(
        Arc::new(SqliteSnippetStore::new(pool.clone(), timeout)),
        Arc::new(SqliteUserStore::new(pool.clone(), timeout)),
        templates,
        app_cfg.clone(),
    );

    let app = routes::router(state, session_layer, &ui_dir.join("static"))
        .into_make_service_with_connect_info::<SocketAddr>();

    if app_cfg.server.tls {
        serve_tls(&app_cfg, addr, app).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Snippetbox listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    }

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn serve_tls(
    cfg: &AppConfig,
    addr: SocketAddr,
    app: axum::extract::connect_info::IntoMakeServiceWithConnectInfo<axum::Router, SocketAddr>,
) -> anyhow::Result<()> {
    let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cfg.server.cert_file, &cfg.server.key_file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificate/key: {}", e))?;

    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });
    }

    info!("Snippetbox listening on https://{}", addr);
    axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
