//! Binary entry point: wires the cache engine into a [`ledge::router::Router`]
//! and serves it, the same way the framework's own quickstart does.

use std::sync::Arc;
use std::time::Duration;

use ledge::cache::{
  config::CacheConfig,
  jobqueue::{memory::MemoryJobQueue, redis_queue::RedisJobQueue, JobQueue},
  storage::{memory::MemoryBlobStore, sled_store::SledStore, BlobStore},
  store::{memory::MemoryStore, redis_store::RedisStore, KvStore},
  worker, CacheEngine,
};
use ledge::plugins::metrics::MetricsPlugin;
use ledge::router::Router;
use ledge::tracing::init_tracing;
use ledge::Method;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  init_tracing();

  let config = CacheConfig::from_env()?;

  let store: Arc<dyn KvStore> = match RedisStore::connect(&config.redis_url).await {
    Ok(store) => Arc::new(store),
    Err(err) => {
      tracing::warn!(error = %err, "redis unavailable, falling back to in-memory store");
      Arc::new(MemoryStore::new())
    }
  };

  let storage: Arc<dyn BlobStore> = match SledStore::open(&config.blob_path) {
    Ok(store) => {
      let store = Arc::new(store);
      store.spawn_janitor(Duration::from_secs(60));
      store
    }
    Err(err) => {
      tracing::warn!(error = %err, "sled unavailable, falling back to in-memory blob store");
      Arc::new(MemoryBlobStore::new())
    }
  };

  let jobs: Arc<dyn JobQueue> = match RedisJobQueue::connect(&config.redis_url).await {
    Ok(queue) => Arc::new(queue),
    Err(err) => {
      tracing::warn!(error = %err, "redis unavailable, falling back to in-memory job queue");
      Arc::new(MemoryJobQueue::new())
    }
  };

  let listen_addr = config.listen_addr.clone();
  let engine = CacheEngine::new(config, store, storage, jobs);

  tokio::spawn(worker::run(Arc::new(engine.clone()), Duration::from_secs(5)));

  let purge = Method::from_bytes(b"PURGE").expect("PURGE is a valid method token");

  let mut router = Router::new();
  router.plugin(MetricsPlugin::default());
  for method in [Method::GET, Method::HEAD, purge] {
    router.route(method.clone(), "/", ledge::cache::handlers::serve);
    router.route(method, "/{*rest}", ledge::cache::handlers::serve);
  }
  router.state(engine);

  let listener = TcpListener::bind(&listen_addr).await?;
  tracing::info!(addr = %listen_addr, "ledge listening");
  ledge::serve(listener, router).await;

  Ok(())
}
