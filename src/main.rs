use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mpaia::assistant::{Assistant, AssistantRouter, EchoAssistant, ProviderAssistant};
use mpaia::channels::{CliChannel, MessageChannel};
use mpaia::commands::CommandHandler;
use mpaia::config::AppConfig;
use mpaia::error::ConfigError;
use mpaia::jobs::Scheduler;
use mpaia::llm::create_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config)?;

    eprintln!("Mpaia v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    let llm = create_provider(&config.llm)?;

    let general: Arc<dyn Assistant> = Arc::new(
        ProviderAssistant::new(llm.clone(), "general questions and conversation")
            .with_persona(&config.system_prompt)
            .with_timeout(config.provider_timeout),
    );
    let echo: Arc<dyn Assistant> =
        Arc::new(EchoAssistant::new().with_used_for("repeating the message back verbatim"));

    let router = Arc::new(AssistantRouter::new(vec![general.clone(), echo], llm)?);

    let cli = Arc::new(CliChannel::new());
    let channel: Arc<dyn MessageChannel> = cli.clone();
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&channel)));

    let handler = CommandHandler::new(router, Arc::clone(&scheduler), general)
        .with_allowed(config.allowed_destinations.clone())
        .with_admin_destination(config.admin_destination.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted");
                stop_tx.send_replace(true);
            }
            Err(e) => tracing::warn!("Could not listen for ctrl-c: {}", e),
        }
        // Hold the sender so receivers never see it closed.
        stop_tx.closed().await;
    });

    handler
        .serve(cli.start(), channel.as_ref(), config.shutdown_grace, stop_rx)
        .await;

    scheduler.shutdown(config.shutdown_grace).await;
    Ok(())
}

/// Console logging, plus a daily rolling file when `ASSIST_LOG_DIR` is set.
fn init_tracing(
    config: &AppConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(dir) = &config.log_dir else {
        tracing_subscriber::registry().with(filter).with(console).init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "mpaia.log"));
    let file = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(Some(guard))
}
