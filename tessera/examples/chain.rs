//! Chains tasks across a thread pool, joins them from `main` and shows a
//! failure travelling up the chain unchanged.
//!
//! Run with `RUST_LOG=tessera=trace,chain=info cargo run --example chain`.

use anyhow::Result;
use std::sync::Arc;
use tessera::runtime::{TaskRegistry, ThreadPool};
use tessera::sync_await;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tessera::task]
async fn parse_port(raw: String) -> Result<u16> {
    Ok(raw.parse()?)
}

#[tessera::task]
async fn resolve(host: &'static str, raw_port: String, pool: Arc<ThreadPool>) -> Result<String> {
    // Parsing starts on the pool, everything after it resumes inline.
    let port = parse_port(raw_port).set_executor(pool).await?;
    Ok(format!("{host}:{port}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let pool = ThreadPool::new(4)?;

    let addr = sync_await(resolve("localhost", "8080".into(), pool.clone()).set_executor(pool.clone()))?;
    info!(%addr, "resolved");

    if let Err(e) = sync_await(resolve("localhost", "eighty".into(), pool.clone())) {
        warn!(error = %e, "resolve failed");
    }

    let registry = TaskRegistry::new();
    for port in 9000..9010 {
        let task = resolve("127.0.0.1", port.to_string(), pool.clone()).set_executor(pool.clone());
        registry.start(task, |outcome| match outcome.value() {
            Ok(addr) => info!(%addr, "resolved in background"),
            Err(e) => warn!(error = %e, "background resolve failed"),
        });
    }

    registry.wait_idle();
    info!("all background chains done");
    Ok(())
}
