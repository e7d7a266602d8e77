use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use coach_onboard::config::{MailTransport, PortalConfig};
use coach_onboard::onboarding::{OnboardingService, PortalState, portal_routes};
use coach_onboard::storage::{BlobStore, LocalBlobStore};
use coach_onboard::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = PortalConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing; the guard must live as long as the process
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "coach-onboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("Coach Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Portal: http://0.0.0.0:{}/onboard/{{token}}", config.port);
    eprintln!("   Admin API: http://0.0.0.0:{}/api/admin/coaches", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Document storage ─────────────────────────────────────────────────
    let local_store = LocalBlobStore::new(&config.storage_dir);
    local_store
        .ensure_dirs()
        .await
        .with_context(|| format!("Failed to prepare storage at {}", config.storage_dir.display()))?;
    let blobs: Arc<dyn BlobStore> = Arc::new(local_store);
    eprintln!("   Storage: {}", config.storage_dir.display());

    // ── Email ────────────────────────────────────────────────────────────
    let transport = MailTransport::from_env();
    let notifier = transport.into_notifier();
    eprintln!("   Email: {}", notifier.name());
    if notifier.name() == "log" {
        tracing::warn!("No mail transport configured, emails will only be logged");
    }

    let service = Arc::new(OnboardingService::new(db, blobs, notifier, config.mail));
    let app = portal_routes(PortalState {
        service,
        admin_token: Arc::new(config.admin_token),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Portal server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
