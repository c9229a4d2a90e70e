use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info};

use feedsub::cli::Cli;
use feedsub::cli::exit::{codes, exit_code};
use feedsub::config::load_config;
use feedsub::feeds::{self, RunningFeeds};
use feedsub::router::OutputSink;
use feedsub::session::{SessionController, SessionOptions};
use feedsub::transport::websocket::WebSocketTransport;
use feedsub::utils::error::StartupError;
use feedsub::utils::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose));

    let code = match run(cli).await {
        Ok(code) => code,
        Err(StartupError::NoFeeds) => {
            error!("You must specify at least one feed!");
            eprintln!("List of possible feeds:");
            for name in feeds::names() {
                eprintln!("  {name}");
            }
            codes::CONFIG_ERROR
        }
        Err(e) => {
            error!("{e}");
            exit_code(&e)
        }
    };
    process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, StartupError> {
    let program = env!("CARGO_PKG_NAME");
    debug!("{program} version {}", env!("CARGO_PKG_VERSION"));

    if cli.feeds.is_empty() {
        return Err(StartupError::NoFeeds);
    }

    let mut settings = load_config(cli.config.as_deref())?;
    if let Some(dest) = &cli.dest {
        if !settings.destinations.dests.contains_key(dest) {
            return Err(StartupError::UnknownDestination(dest.clone()));
        }
        settings.destinations.default = Some(dest.clone());
    }
    let url = settings.endpoint.url();
    debug!("Config is {url}");
    debug!(
        "Destination is {:?} ({:?})",
        settings.destinations.default,
        settings.destinations.consumer()
    );

    let running = RunningFeeds::select(&cli.feeds);
    let sink = Arc::new(OutputSink::open(cli.output_path())?);

    let transport = WebSocketTransport::connect(
        &url,
        settings.destinations.consumer().map(str::to_string),
        settings.session.request_timeout(),
    )
    .await?;

    let controller = SessionController::new(
        Arc::new(transport),
        sink,
        SessionOptions {
            subscribe_delay: settings.session.subscribe_delay(),
            timeout: Some(cli.session_timeout()),
        },
    );
    controller.register_feeds(&running);

    info!("Starting server for {:?}...", running.names());
    let report = controller.run().await;
    Ok(report.exit_code())
}
