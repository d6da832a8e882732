use anyhow::Context;
use clap::Parser;
use mobilizon_bot::apis::concertcloud::ConcertCloudApi;
use mobilizon_bot::apis::local_file::LocalFileSource;
use mobilizon_bot::apis::EventSource;
use mobilizon_bot::app::auth_manager::{register_app, AuthManager, StdinPrompt};
use mobilizon_bot::app::context::BotContext;
use mobilizon_bot::app::ports::HttpClientPort;
use mobilizon_bot::app::reconcile_use_case::{ReconcileReport, ReconcileUseCase};
use mobilizon_bot::config::{BotConfig, Cli, Mode};
use mobilizon_bot::constants::CLIENT_ID_ENV;
use mobilizon_bot::infra::http_client::ReqwestHttp;
use mobilizon_bot::logging::init_logging;
use mobilizon_bot::storage::CacheStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match BotConfig::load(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&config.log_dir(), config.debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let span = info_span!("bot", mode = ?config.mode, mobilizon = %config.mobilizon_url);
    match run(config).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {:#}", e);
            println!("❌ Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new());

    match config.mode {
        Mode::Register => {
            let client_id = register_app(http.as_ref(), &config.mobilizon_url)
                .await
                .context("registering the bot")?;
            info!("bot registered");
            println!("✅ Registered. Add this to your environment:");
            println!("export {CLIENT_ID_ENV}={client_id}");
        }
        Mode::Authorize => {
            let auth = AuthManager::new(
                http,
                &config.mobilizon_url,
                &config.auth_file,
                config.client_id.clone(),
            );
            auth.ensure_authorized(Some(&StdinPrompt))
                .await
                .context("authorizing the bot")?;
            println!("✅ Authorized, tokens saved to {}", auth.auth_file().display());
        }
        Mode::Run => {
            let auth = Arc::new(AuthManager::new(
                http.clone(),
                &config.mobilizon_url,
                &config.auth_file,
                config.client_id.clone(),
            ));
            auth.ensure_authorized(None).await?;

            let source: Box<dyn EventSource> = match &config.file {
                Some(path) => Box::new(LocalFileSource::new(path)),
                None => Box::new(ConcertCloudApi::new(http.clone(), config.query.clone())),
            };
            println!("🔄 Fetching events from {}...", source.source_name());
            let events = source
                .fetch_events()
                .await
                .with_context(|| format!("fetching events from {}", source.source_name()))?;
            info!(count = events.len(), "events fetched");

            let ctx = BotContext::new(http, &config.mobilizon_url, auth);
            let use_case = ReconcileUseCase::new(&ctx, config.reconcile_options());
            let store = CacheStore::new(&config.config_dir);
            let report = use_case.run_batch(events, &store).await?;
            print_report(&report, config.noop);
        }
    }
    Ok(())
}

fn print_report(report: &ReconcileReport, noop: bool) {
    println!("\n📊 Results:");
    println!("   Total events: {}", report.total);
    println!("   Created: {}", report.created);
    println!("   Updated: {}", report.updated);
    println!("   Already on server: {}", report.found_remote);
    println!("   Unchanged: {}", report.unchanged);
    println!("   Duplicates in batch: {}", report.duplicates);
    println!("   Opted out: {}", report.skipped);
    if noop {
        println!("   Would publish: {}", report.reported);
    }
    if report.failed > 0 {
        println!("\n⚠️  {} events could not be published, see the log", report.failed);
    } else {
        println!("✅ Run completed successfully");
    }
}
