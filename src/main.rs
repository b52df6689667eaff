use hh_vacancy_bot::bot::api::TelegramApi;
use hh_vacancy_bot::bot::dispatcher::BotDispatcher;
use hh_vacancy_bot::bot::handlers::BotContext;
use hh_vacancy_bot::infra::db;
use hh_vacancy_bot::infra::settings::{BotSettings, DEFAULT_CONFIG_FILE};
use hh_vacancy_bot::oauth::coordinator::AuthCoordinator;
use hh_vacancy_bot::oauth::listener;
use hh_vacancy_bot::oauth::provider::HhOAuthConfig;
use hh_vacancy_bot::oauth::registry::PendingAuthRegistry;
use hh_vacancy_bot::shared::error::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "hh-vacancy-bot.log";

fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Route `log` records from dependencies into tracing as well.
    let _ = tracing_log::LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

async fn run() -> AppResult<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let bot_settings = BotSettings::load(&config_path)?;
    let _log_guard = init_logging(bot_settings.log_dir.as_deref());
    bot_settings.validate()?;
    tracing::info!(config = %config_path.display(), "starting hh-vacancy-bot");

    let db = db::init(&bot_settings.database.path)?;

    // The registry and the listener are the process-wide shared state of the
    // authorization flow: one bound address, one map of pending attempts.
    let registry = Arc::new(PendingAuthRegistry::new(Duration::from_secs(
        bot_settings.oauth.attempt_timeout_secs,
    )));
    let sweeper = registry.spawn_sweeper(Duration::from_secs(
        bot_settings.oauth.sweep_interval_secs,
    ));

    let bound = listener::bind(&bot_settings.oauth.bind_host, bot_settings.oauth.bind_port)?;
    let callback_server = listener::serve(
        bound,
        &bot_settings.oauth.callback_path,
        Arc::clone(&registry),
    )?;

    let provider = HhOAuthConfig::from_settings(&bot_settings);
    let coordinator = AuthCoordinator::new(Arc::clone(&registry), provider.clone(), db.clone())?;

    let api = Arc::new(TelegramApi::new(
        &bot_settings.telegram.api_base_url,
        &bot_settings.telegram.token,
    )?);
    let ctx = Arc::new(BotContext::new(
        Arc::clone(&api),
        db,
        coordinator,
        provider,
        bot_settings.hh.api_base_url.clone(),
    )?);

    let dispatcher = BotDispatcher::new(api, ctx);
    let poll_task = tokio::spawn(async move { dispatcher.run().await });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: failed to listen for shutdown signal: {e}"))?;
    tracing::info!("shutdown signal received");

    poll_task.abort();
    sweeper.abort();
    callback_server.shutdown().await;
    tracing::info!("hh-vacancy-bot stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}
