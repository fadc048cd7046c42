use std::{process, sync::Arc};

use spacetraveling::{
    application::{
        chrome::ChromeService, error::AppError, export::SiteExporter, feed::FeedService,
    },
    cms::{ContentRepo, PrismicClient},
    config::{self, Settings},
    infra::{
        cache::ResponseCache,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Export(_) => run_export(settings).await,
    }
}

struct ApplicationContext {
    feed: FeedService,
    chrome: ChromeService,
}

fn build_application_context(settings: &Settings) -> Result<ApplicationContext, AppError> {
    let client = PrismicClient::new(&settings.cms)?;
    let repo: Arc<dyn ContentRepo> = Arc::new(client);

    Ok(ApplicationContext {
        feed: FeedService::new(repo, &settings.cms, settings.site.timezone),
        chrome: ChromeService::new(&settings.site, &settings.comments),
    })
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    if settings.comments.repo.is_none() {
        warn!("comments.utterances_repo is not set; the comment widget is disabled");
    }

    let cache = settings
        .cache
        .enabled
        .then(|| ResponseCache::from_settings(&settings.cache));

    let router = http::build_router(HttpState {
        feed: Arc::new(app.feed),
        chrome: Arc::new(app.chrome),
        cache,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;

    info!(
        target = "spacetraveling::serve",
        addr = %settings.server.addr,
        cms = %settings.cms.api_endpoint,
        cache = settings.cache.enabled,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "spacetraveling::serve", "server stopped");
    Ok(())
}

async fn run_export(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    let concurrency = usize::try_from(settings.export.concurrency.get()).unwrap_or(1);

    info!(
        target = "spacetraveling::export",
        path = %settings.export.output_dir.display(),
        concurrency,
        "Starting export"
    );

    let exporter = SiteExporter::new(
        app.feed,
        app.chrome,
        settings.export.output_dir.clone(),
        concurrency,
    );
    exporter.run().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "spacetraveling::serve", "shutdown requested");
}
