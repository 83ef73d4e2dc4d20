use dotenvy::dotenv;
use session_records::{
    config::{
        access_codes,
        database,
        settings::{AppConfig, AttachmentBackend},
    },
    core::{
        access_gate,
        attachments::{AttachmentStore, local::LocalAttachmentStore, remote::RemoteAttachmentStore},
        controller::{ControllerSettings, SessionController},
        counters,
    },
    errors::Result,
    web::{self, AppState},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    if dotenv().is_ok() {
        info!("Loaded .env file");
    }

    // 3. Load the application configuration
    let app_config = AppConfig::from_env()
        .inspect_err(|e| error!("Invalid application configuration: {}", e))?;

    // 4. Initialize database
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed access codes from the seed file and the environment
    let seed = access_codes::load_config(&app_config.access_codes_file)?;
    let seeded = access_gate::seed_codes(
        &db,
        seed.access
            .codes
            .iter()
            .chain(app_config.extra_access_codes.iter()),
    )
    .await?;
    if access_gate::list_codes(&db).await?.is_empty() {
        warn!("No access codes configured; nobody will be able to add or view records");
    } else {
        info!(seeded, "Access codes seeded");
    }

    // 6. Repair counters left behind by an interrupted create or clear
    if app_config.reconcile_counters_on_startup {
        counters::reconcile(&db)
            .await
            .inspect_err(|e| error!("Failed to reconcile department counters: {}", e))?;
    }

    // 7. Wire the controller
    let attachments = build_attachment_store(&app_config.attachment_backend).await?;
    let controller = Arc::new(SessionController::new(
        db,
        attachments,
        ControllerSettings {
            max_upload_bytes: app_config.max_upload_bytes,
            admin_password: app_config.admin_password.clone(),
            session_ttl: app_config.session_ttl,
        },
    ));

    // 8. Serve
    let static_dir = app_config
        .static_dir
        .is_dir()
        .then_some(app_config.static_dir.as_path());
    if static_dir.is_none() {
        warn!(path = %app_config.static_dir.display(), "Static directory not found; serving API only");
    }
    let app = web::router(
        AppState::new(controller),
        static_dir,
        app_config.max_upload_bytes,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Session records server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn build_attachment_store(backend: &AttachmentBackend) -> Result<Arc<dyn AttachmentStore>> {
    match backend {
        AttachmentBackend::Local { upload_dir } => {
            let store = LocalAttachmentStore::new(upload_dir);
            store.ensure_dir().await?;
            info!(path = %upload_dir.display(), "Using local attachment storage");
            Ok(Arc::new(store))
        }
        AttachmentBackend::Remote {
            api_url,
            api_key,
            api_version,
        } => {
            let store = RemoteAttachmentStore::new(api_url, api_key, api_version)?;
            info!(url = %api_url, "Using remote attachment storage");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
