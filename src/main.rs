use std::{process, sync::Arc, time::Duration};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use murmur::{
    application::{
        error::AppError,
        feed::FeedManager,
        jobs::{
            JobScheduler, JobWorkerContext, process_collect_feed_job, process_spread_post_job,
            run_local_dispatcher,
        },
        posts::PostService,
        repos::{FeedRepo, JobsRepo, PostsRepo, SubscriptionsRepo},
        subscriptions::SubscriptionService,
    },
    cache::{CacheBackend, CacheBackendKind, CacheConfig, CachedPostsRepo, MemoryBackend},
    config,
    domain::types::JobType,
    infra::{
        db::{PgCacheBackend, PostgresRepositories},
        error::InfraError,
        http::{self, ApiState},
        memory::{MemoryFeedRepo, MemoryJobQueue, MemoryPostsRepo, MemorySubscriptionsRepo},
        telemetry,
    },
};
use tokio::sync::mpsc;
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
        config::Command::Serve(args) if args.in_memory => run_serve_in_memory(settings).await,
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Worker(_) => run_worker(settings).await,
    }
}

/// Storage seams shared by the HTTP services and the fan-out manager.
struct Storage {
    posts: Arc<dyn PostsRepo>,
    subscriptions: Arc<dyn SubscriptionsRepo>,
    feed: Arc<dyn FeedRepo>,
    jobs: Arc<dyn JobsRepo>,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache_config = CacheConfig::from(&settings.cache);

    let cache_backend: Arc<dyn CacheBackend> = match cache_config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        CacheBackendKind::Postgres => Arc::new(PgCacheBackend::new(repositories.pool().clone())),
    };
    let purge_handle = cache_config
        .enabled
        .then(|| spawn_cache_purge(cache_backend.clone(), cache_config.ttl()));

    let storage = Storage {
        posts: Arc::new(repositories.clone()),
        subscriptions: Arc::new(repositories.clone()),
        feed: Arc::new(repositories.clone()),
        jobs: Arc::new(repositories),
    };
    let state = build_api_state(storage, cache_backend, &cache_config, &settings.jobs);

    let result = serve_http(&settings, state).await;

    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_serve_in_memory(settings: config::Settings) -> Result<(), AppError> {
    let mut cache_config = CacheConfig::from(&settings.cache);
    if cache_config.backend != CacheBackendKind::Memory {
        warn!(
            target = "murmur::serve",
            "in-memory mode ignores the configured cache backend"
        );
        cache_config.backend = CacheBackendKind::Memory;
    }

    let posts = Arc::new(MemoryPostsRepo::new());
    let subscriptions = Arc::new(MemorySubscriptionsRepo::new());
    let feed = Arc::new(MemoryFeedRepo::new());

    let manager = Arc::new(FeedManager::new(
        posts.clone(),
        subscriptions.clone(),
        feed.clone(),
    ));
    let (sender, receiver) = mpsc::unbounded_channel();
    let dispatcher_handle = tokio::spawn(run_local_dispatcher(receiver, manager));

    let storage = Storage {
        posts,
        subscriptions,
        feed,
        jobs: Arc::new(MemoryJobQueue::with_dispatch(sender)),
    };
    let cache_backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new());
    let purge_handle = cache_config
        .enabled
        .then(|| spawn_cache_purge(cache_backend.clone(), cache_config.ttl()));
    let state = build_api_state(storage, cache_backend, &cache_config, &settings.jobs);

    info!(target = "murmur::serve", "serving from process memory");
    let result = serve_http(&settings, state).await;

    dispatcher_handle.abort();
    let _ = dispatcher_handle.await;
    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let shared = Arc::new(repositories.clone());

    // Fan-out reads the primary store; the post cache is a request-path concern.
    let context = JobWorkerContext {
        feed: Arc::new(FeedManager::new(
            shared.clone(),
            shared.clone(),
            shared,
        )),
    };

    let spread_post_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::SpreadPost.as_str()),
    );
    let collect_feed_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::CollectFeed.as_str()),
    );

    let spread_post_worker = WorkerBuilder::new("spread-post-worker")
        .concurrency(settings.jobs.spread_post_concurrency.get() as usize)
        .data(context.clone())
        .backend(spread_post_storage)
        .build_fn(process_spread_post_job);
    let collect_feed_worker = WorkerBuilder::new("collect-feed-worker")
        .concurrency(settings.jobs.collect_feed_concurrency.get() as usize)
        .data(context)
        .backend(collect_feed_storage)
        .build_fn(process_collect_feed_job);

    info!(
        target = "murmur::worker",
        spread_post_concurrency = settings.jobs.spread_post_concurrency.get(),
        collect_feed_concurrency = settings.jobs.collect_feed_concurrency.get(),
        "starting job workers"
    );

    Monitor::new()
        .register(spread_post_worker)
        .register(collect_feed_worker)
        .run()
        .await
        .map_err(|err| AppError::from(InfraError::worker(err.to_string())))
}

async fn init_repositories(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool).await?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(repositories)
}

fn build_api_state(
    storage: Storage,
    cache_backend: Arc<dyn CacheBackend>,
    cache_config: &CacheConfig,
    jobs: &config::JobsSettings,
) -> ApiState {
    let Storage {
        posts,
        subscriptions,
        feed,
        jobs: jobs_repo,
    } = storage;

    let request_posts: Arc<dyn PostsRepo> = if cache_config.enabled {
        Arc::new(CachedPostsRepo::new(posts.clone(), cache_backend, cache_config))
    } else {
        posts.clone()
    };

    let scheduler = JobScheduler::new(jobs_repo, jobs.max_attempts_i32());
    let manager = Arc::new(FeedManager::new(posts, subscriptions.clone(), feed));

    ApiState {
        posts: Arc::new(PostService::new(request_posts, scheduler.clone())),
        subscriptions: Arc::new(SubscriptionService::new(subscriptions, manager, scheduler)),
    }
}

/// Reclaim expired cache entries once per TTL.
fn spawn_cache_purge(
    backend: Arc<dyn CacheBackend>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match backend.purge_expired().await {
                Ok(purged) if purged > 0 => {
                    info!(target = "murmur::cache", purged, "purged expired cache entries")
                }
                Ok(_) => {}
                Err(err) => warn!(target = "murmur::cache", error = %err, "cache purge failed"),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state, settings.server.request_timeout);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "murmur::serve", addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}
