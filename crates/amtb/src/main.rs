use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use teloxide::Bot;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use amtb_alertmanager::AlertmanagerClient;
use amtb_core::{
    bot::App,
    config::Config,
    ingress::WebhookIngress,
    messaging::{dispatcher::MessageDispatcher, port::MessagingPort},
    ports::AlertingPort,
    session::SessionStore,
    PROGRAM_NAME, VERSION,
};
use amtb_prometheus::PrometheusClient;
use amtb_telegram::TelegramMessenger;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "amtb", version, about = "Telegram bot for Alertmanager")]
struct Cli {
    /// YAML config file; overrides environment variables.
    #[arg(short = 'c', long = "config", env = "CONFIG_PATH", value_name = "CONFIGPATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(Config::load(cli.config.as_deref()).context("error loading configuration")?);
    amtb_core::logging::init(PROGRAM_NAME, cfg.logfile_path.as_deref())?;
    tracing::info!(version = VERSION, "starting {PROGRAM_NAME}");

    let alertmanager = Arc::new(AlertmanagerClient::new(&cfg.alertmanager_url, cfg.api_timeout)?);
    let status = alertmanager
        .status()
        .await
        .context("error connecting to alertmanager")?;
    tracing::info!(
        url = alertmanager.base_url(),
        version = %status.version,
        "connected to alertmanager"
    );
    let prometheus = Arc::new(PrometheusClient::new(&cfg.prometheus_url, cfg.api_timeout)?);

    let cancel = CancellationToken::new();
    let sessions = Arc::new(SessionStore::new(cfg.session_ttl));
    let sweeper = sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL, cancel.clone());

    let bot = Bot::new(cfg.telegram_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let dispatcher = Arc::new(MessageDispatcher::from_config(messenger, &cfg));

    let webhook = if cfg.disable_http {
        tracing::info!("webhook listener disabled");
        None
    } else {
        let addr = cfg.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("error binding webhook listener to {addr}"))?;
        let ingress = Arc::new(WebhookIngress::new(
            cfg.clone(),
            sessions.clone(),
            dispatcher.clone(),
        ));
        Some(tokio::spawn(amtb_webhook::serve(
            listener,
            ingress,
            cancel.clone(),
        )))
    };

    let app = Arc::new(App::new(
        cfg.clone(),
        alertmanager,
        prometheus,
        sessions,
        dispatcher,
    ));

    tokio::spawn(cancel_on_signal(cancel.clone()));
    amtb_telegram::router::run_polling(bot, app, cancel.clone()).await;

    // Polling can also end on its own; make sure everything else follows.
    cancel.cancel();
    if let Some(handle) = webhook {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "webhook listener failed"),
            Err(e) => tracing::error!(error = %e, "webhook listener task panicked"),
        }
    }
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "session sweeper task panicked");
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
    cancel.cancel();
}
