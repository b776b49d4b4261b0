use std::sync::Arc;
use std::time::Duration;
use anyhow::Context as _;
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use crate::common::{Config, DataPaths};
use crate::service::routes;
use crate::service::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    // Exported files are fetched by the name /summary and /export_csv return
    let exports = ServeDir::new(state.paths.csv_dir.clone());

    Router::new()
        .route("/", get(routes::index))
        .route("/login", get(routes::login_page).post(routes::login))
        .route("/logout", get(routes::logout))
        .route("/selection", get(routes::selection_options).post(routes::select_class))
        .route("/get_groups/{section_id}", get(routes::get_groups))
        .route("/attendance", get(routes::attendance_page))
        .route("/process_attendance", post(routes::process_attendance))
        .route("/summary", get(routes::summary))
        .route("/export_csv", get(routes::export_csv))
        .nest_service("/static/csv", exports)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: Config, paths: DataPaths) -> anyhow::Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);

    info!("Initializing state...");
    let state = AppState::new(config, paths)?;
    info!(
        "Data root {}, {} students on the roster",
        state.paths.base_dir.display(),
        state.config.roster.students.len()
    );

    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
