use anyhow::Result;
use dockstats::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = config::AppConfig::load()?;
    let collector = &app_config.collector;

    let pool = writer::WritePool::spawn(
        writer::WritePoolConfig {
            workers: collector.workers,
            queue_capacity: collector.queue_capacity,
        },
        Arc::new(store::InfluxConnector::new(app_config.store.clone())),
        Arc::new(writer::DirectWrite::new(app_config.store.ignore_fail)),
    );

    let app = routes::app(pool.dispatcher());
    let addr = format!("{}:{}", collector.host, collector.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        workers = collector.workers,
        store = %format!("{}:{}/{}", app_config.store.host, app_config.store.port, app_config.store.database),
        "Listening on http://{}",
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Received shutdown signal");
    pool.shutdown(Duration::from_secs(collector.shutdown_grace_secs))
        .await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
