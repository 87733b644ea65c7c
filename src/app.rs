//! Process wiring and lifecycle
//!
//! Startup order: store, cache, warm-up, stream, router. Warm-up failure
//! aborts startup before any traffic is accepted. Afterwards the consumer,
//! the producer and the HTTP server run as tasks of one [`TaskSet`] sharing
//! a single [`CancellationToken`]. A shutdown signal or the exit of any task
//! cancels the token and every task is joined before [`App::run`] returns.

use crate::cache::InMemoryOrderCache;
use crate::config::{AppConfig, StoreBackend, StreamBackend};
use crate::core::{OrderCache, OrderPublisher, OrderStore, OrderStream};
use crate::pipeline::{
    OrderConsumer, OrderProducer, OrderReader, RetryPolicy, WarmUpConfig, warm_up,
};
use crate::server::{self, AppState, RouterOptions};
use crate::storage::InMemoryOrderStore;
use crate::stream::InMemoryBroker;
use anyhow::Context;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RegisteredTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Long-running tasks that live and die together
///
/// Every task is wrapped to capture panics. When any task returns, for any
/// reason, [`TaskSet::any_exited`] resolves so the owner can shut the rest
/// down.
pub struct TaskSet {
    tasks: Vec<RegisteredTask>,
    cancel: CancellationToken,
    exited: Arc<Notify>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancel: CancellationToken::new(),
            exited: Arc::new(Notify::new()),
        }
    }

    /// Token observed by every task of the set
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let exited = self.exited.clone();
        let cancel = self.cancel.clone();

        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if cancel.is_cancelled() => {
                    tracing::debug!(task = %name, "task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = %name, "task exited before shutdown");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(task = %name, panic = %message, "task panicked");
                }
            }
            exited.notify_one();
        };

        tracing::debug!(task = %name, "task spawned");
        self.tasks.push(RegisteredTask {
            name,
            handle: tokio::spawn(wrapped),
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve once at least one task has returned.
    pub async fn any_exited(&self) {
        if self.is_empty() {
            return std::future::pending().await;
        }
        self.exited.notified().await;
    }

    /// Cancel every task and wait for all of them. Safe to call after the
    /// token was already cancelled.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} tasks...", self.tasks.len());
        self.cancel.cancel();

        for task in self.tasks {
            if let Err(e) = task.handle.await {
                tracing::error!(task = %task.name, error = ?e, "task failed to join");
            }
        }

        tracing::info!("All tasks stopped");
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Fully initialised service, ready to run
pub struct App {
    config: AppConfig,
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    stream: Arc<dyn OrderStream>,
    publisher: Arc<dyn OrderPublisher>,
}

impl App {
    /// Initialise every collaborator and warm the cache.
    ///
    /// Fails if the store is unreachable or the warm-up does not complete.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let store = build_store(&config).await?;
        let cache: Arc<dyn OrderCache> = Arc::new(InMemoryOrderCache::new());

        let warm_up_config = WarmUpConfig::from(&config.warmup);
        let warmed = warm_up(store.as_ref(), cache.as_ref(), &warm_up_config)
            .await
            .context("cache warm-up failed")?;
        tracing::info!(orders = warmed, "cache ready");

        let (stream, publisher) = build_stream(&config)?;

        Ok(Self {
            config,
            store,
            cache,
            stream,
            publisher,
        })
    }

    pub fn cache(&self) -> &Arc<dyn OrderCache> {
        &self.cache
    }

    pub fn publisher(&self) -> &Arc<dyn OrderPublisher> {
        &self.publisher
    }

    /// Router serving the read API over this app's store and cache
    pub fn router(&self) -> axum::Router {
        let reader = OrderReader::new(self.store.clone(), self.cache.clone())
            .with_store_timeout(self.config.server.request_timeout());
        let options = RouterOptions {
            request_timeout: self.config.server.request_timeout(),
            static_dir: self.config.server.static_dir.clone(),
        };
        server::build_router(AppState { reader }, &options)
    }

    /// Run until `shutdown` resolves or any task exits, then stop everything.
    pub async fn run_until<S>(self, listener: TcpListener, shutdown: S) -> anyhow::Result<()>
    where
        S: Future<Output = ()>,
    {
        let mut tasks = TaskSet::new();
        let router = self.router();

        let consumer = OrderConsumer::new(self.stream.clone(), self.store.clone(), self.cache.clone())
            .with_retry_policy(RetryPolicy::fixed(
                self.config.consumer.max_attempts,
                Duration::from_millis(self.config.consumer.retry_delay_ms),
            ));
        let cancel = tasks.cancel_token();
        tasks.spawn("consumer", async move { consumer.run(cancel).await });

        if let Some(interval) = self.config.stream.produce_interval() {
            let producer = OrderProducer::new(self.publisher.clone(), interval);
            let cancel = tasks.cancel_token();
            tasks.spawn("producer", async move { producer.run(cancel).await });
        }

        let cancel = tasks.cancel_token();
        let grace = self.config.server.shutdown_grace();
        tasks.spawn("http", async move {
            if let Err(e) = server::serve(listener, router, cancel, grace).await {
                tracing::error!(error = %e, "http server failed");
            }
        });

        tokio::select! {
            _ = shutdown => tracing::info!("shutdown requested"),
            _ = tasks.any_exited() => tracing::warn!("a task exited, shutting down"),
        }

        tasks.shutdown().await;
        Ok(())
    }

    /// Build the app, bind the configured address and run until SIGINT or
    /// SIGTERM.
    pub async fn run(config: AppConfig) -> anyhow::Result<()> {
        let addr = config.server.bind_addr();
        let app = Self::build(config).await?;
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        app.run_until(listener, server::shutdown_signal()).await
    }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory order store");
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            use crate::storage::postgres;

            let pool = postgres::connect(&config.postgres)
                .await
                .context("failed to connect to postgres")?;
            if config.store.ensure_schema {
                postgres::ensure_schema(&pool).await?;
            }
            tracing::info!(host = %config.postgres.host, "using postgres order store");
            Ok(Arc::new(crate::storage::PostgresOrderStore::new(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("store.backend is postgres but the `postgres` feature is disabled")
        }
    }
}

type StreamPair = (Arc<dyn OrderStream>, Arc<dyn OrderPublisher>);

fn build_stream(config: &AppConfig) -> anyhow::Result<StreamPair> {
    match config.stream.backend {
        StreamBackend::Memory => {
            tracing::info!("using in-memory order stream");
            let broker = InMemoryBroker::new();
            Ok((Arc::new(broker.clone()), Arc::new(broker)))
        }
        #[cfg(feature = "kafka")]
        StreamBackend::Kafka => {
            use crate::stream::{KafkaOrderPublisher, KafkaOrderStream};

            let stream = KafkaOrderStream::new(&config.stream)?;
            let publisher = KafkaOrderPublisher::new(&config.stream)?;
            tracing::info!(brokers = ?config.stream.brokers, topic = %config.stream.topic, "using kafka order stream");
            Ok((Arc::new(stream), Arc::new(publisher)))
        }
        #[cfg(not(feature = "kafka"))]
        StreamBackend::Kafka => {
            anyhow::bail!("stream.backend is kafka but the `kafka` feature is disabled")
        }
    }
}
