//! Box Office command-line client.
//!
//! Loads the category catalog, resolves the category names given as
//! arguments, then stays connected to the configured realtime channels and
//! logs their events until interrupted.
//!
//! ```text
//! BOXOFFICE_CHANNELS=notification,ticket boxoffice Music "Tech Talks"
//! ```

use boxoffice::{BoxOffice, Config};
use boxoffice_runtime::metrics::MetricsRecorder;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Box Office client");

    let recorder = match MetricsRecorder::install() {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    // Load configuration
    let config = Config::from_env();
    info!(
        api_url = %config.api.url,
        hub_url = %config.hub.url,
        channels = ?config.hub.channels,
        authenticated = config.access_token.is_some(),
        "Configuration loaded"
    );

    let app = BoxOffice::from_config(config)?;

    match app.load_categories().await {
        Ok(_) => {
            let names: Vec<String> = std::env::args().skip(1).collect();
            if names.is_empty() {
                info!(names = ?app.categories().list_names(), "Known categories");
            } else {
                let ids = app.resolve_categories(&names);
                info!(?names, ?ids, "Resolved categories");
            }
        }
        Err(e) => error!(error = %e, "Category lookups unavailable"),
    }

    let connected = app.connect_configured().await;
    if connected.is_empty() {
        warn!("No realtime channel connected");
    } else {
        info!(?connected, "Listening for server events (Ctrl+C to stop)");
        shutdown_signal().await;
    }

    app.shutdown().await;

    if let Some(recorder) = recorder {
        info!(metrics = %recorder.render(), "Final metrics");
    }
    info!("Box Office client stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
