use launchpad_sdk::{Config, EventFilter, LaunchpadSdk, StreamHealth};
use tokio::signal;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,alloy=warn".into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let config_path =
        std::env::var("LAUNCHPAD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::from_yaml(&config_path).expect("failed to load configuration");

    let tokens: Vec<String> = std::env::var("LAUNCHPAD_TOKENS")
        .map(|v| {
            v.split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let filter = EventFilter::all()
        .with_token_strs(&tokens)
        .expect("invalid LAUNCHPAD_TOKENS");

    let sdk = LaunchpadSdk::new(config).expect("failed to initialize launchpad SDK");
    let stream = sdk
        .curve_stream()
        .await
        .expect("failed to open curve event stream");

    stream.set_filter(filter);
    stream.on_event(|event| {
        tracing::info!(target: "launchpad_watch", "{}", serde_json::to_string(event)?);
        Ok(())
    });
    stream.on_error(|error| tracing::warn!("{error}"));
    stream.start();

    let cancellation_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancellation_token.clone()));

    let mut health_check = interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = health_check.tick() => {
                if stream.health() == StreamHealth::Dead {
                    tracing::error!("curve stream is dead, exiting");
                    break;
                }
            }
        }
    }

    stream.stop().await;
    tracing::info!("curve stream stopped");
}

async fn shutdown_signal(cancellation_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping stream...");
    cancellation_token.cancel();
}
