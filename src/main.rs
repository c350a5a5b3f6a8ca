use std::{process, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{
        catalog::CatalogService,
        error::AppError,
        logic::LogicStage,
        mutations::ProductMutationService,
        params::RawParams,
        repos::{ProductsRepo, ProductsWriteRepo},
        shell::{ResolveState, ShellStage},
    },
    cache::{
        CacheConfig, CacheConsumer, CacheRegistry, CacheState, CacheTrigger, EventQueue, L0Store,
        L1Store,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        store::InMemoryCatalogStore,
        telemetry,
    },
};

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
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings);

    // Queues the startup warmup and consumes it before the listener opens.
    app.cache_trigger.warmup_on_startup().await;

    let cache_handle = spawn_cache_consumer(app.cache_trigger.clone());

    let result = serve_http(&settings, app.http_state).await;

    if let Some(handle) = cache_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings);
    let raw = RawParams::from_query(&args.query);

    info!(target = "vitrine::render", query = %raw, "Rendering products listing");

    let mut shell = ShellStage::mount(app.http_state.logic.clone(), raw);
    let pending = shell
        .render()
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{pending}");

    let settled = shell.settled().await;
    let html = settled
        .render()
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{html}");

    // Releasing the stage drops the channel's copy of the state.
    drop(shell);
    match settled {
        ResolveState::Failed(err) => Err(match Arc::try_unwrap(err) {
            Ok(err) => AppError::from(err),
            Err(shared) => AppError::unexpected(format!("products resolve failed: {shared}")),
        }),
        ResolveState::Resolved(_) | ResolveState::Pending => Ok(()),
    }
}

struct ApplicationContext {
    http_state: HttpState,
    cache_trigger: Arc<CacheTrigger>,
}

fn build_application_context(settings: &config::Settings) -> ApplicationContext {
    let store = Arc::new(InMemoryCatalogStore::from_settings(&settings.catalog));
    let products_repo: Arc<dyn ProductsRepo> = store.clone();
    let products_write_repo: Arc<dyn ProductsWriteRepo> = store;

    let cache_config = CacheConfig::from(&settings.cache);
    let l0 = Arc::new(L0Store::new(&cache_config));
    let l1 = Arc::new(L1Store::new(&cache_config));
    let registry = Arc::new(CacheRegistry::new());
    let queue = Arc::new(EventQueue::new());

    let consumer = Arc::new(CacheConsumer::new(
        cache_config.clone(),
        l0.clone(),
        l1.clone(),
        registry.clone(),
        queue.clone(),
        products_repo.clone(),
    ));
    let cache_trigger = Arc::new(CacheTrigger::new(cache_config.clone(), queue, consumer));

    let catalog = if cache_config.enable_l0_cache {
        CatalogService::with_cache(products_repo, l0, registry)
    } else {
        CatalogService::new(products_repo)
    };
    let logic = LogicStage::new(Arc::new(catalog));
    let mutations = Arc::new(ProductMutationService::new(
        products_write_repo,
        cache_trigger.clone(),
    ));

    let cache = cache_config.enable_l1_cache.then(|| CacheState {
        config: cache_config.clone(),
        l1,
    });

    info!(
        target = "vitrine::startup",
        l0 = cache_config.enable_l0_cache,
        l1 = cache_config.enable_l1_cache,
        fetch_delay_ms = settings.catalog.fetch_delay_ms,
        write_delay_ms = settings.catalog.write_delay_ms,
        "Application context ready"
    );

    ApplicationContext {
        http_state: HttpState {
            logic,
            mutations,
            cache,
        },
        cache_trigger,
    }
}

fn spawn_cache_consumer(trigger: Arc<CacheTrigger>) -> Option<JoinHandle<()>> {
    if !trigger.config().is_enabled() {
        return None;
    }

    let interval_ms = trigger.config().auto_consume_interval_ms;
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            trigger.consumer().consume().await;
        }
    }))
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "vitrine::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = shutdown_rx.wait_for(|requested| *requested).await;
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        _ = shutdown_signal() => {}
    }

    info!(
        target = "vitrine::serve",
        timeout_secs = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested, draining connections"
    );
    shutdown_tx.send_replace(true);

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "vitrine::serve",
                "Graceful shutdown timed out, dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "vitrine::serve",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
