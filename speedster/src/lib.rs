pub mod api;
pub mod auditor;
pub mod config;
pub mod decode;
pub mod metrics_defs;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutils;

use crate::api::AppState;
use crate::auditor::Auditor;
use crate::config::{Config, MetricsConfig};
use crate::store::{MongoScanStore, StoreError};
use metrics_exporter_statsd::StatsdBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not connect to the document store: {0}")]
    Store(#[from] StoreError),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
}

/// Brings up the service: metrics recorder (when configured), document
/// store connection, then the HTTP listener. Any failure before the
/// listener is serving aborts startup.
pub async fn run(config: Config) -> Result<(), ServerError> {
    if let Some(metrics_config) = &config.metrics {
        init_metrics(metrics_config)?;
    }

    let store = MongoScanStore::connect(&config.database).await?;
    let auditor = Auditor::new(&config.auditor);
    let state = AppState {
        store: Arc::new(store),
        auditor: Arc::new(auditor),
    };

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, api::router(state)).await?;
    Ok(())
}

fn init_metrics(config: &MetricsConfig) -> Result<(), ServerError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("speedster"))
        .map_err(|err| ServerError::Metrics(err.to_string()))?;

    metrics::set_global_recorder(recorder).map_err(|err| ServerError::Metrics(err.to_string()))?;
    Ok(())
}
