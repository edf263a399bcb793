//! HTTP surface of the broker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::broker::{Broker, InputSource};
use crate::compose::Composer;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::signals::{signal_name, SignalGuard};

/// How long the server waits for the producer after the listener closes.
const PRODUCER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQuery {
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub program_name: String,
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        (self.status(), format!("{self}\n")).into_response()
    }
}

pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/", get(follow_up_handler))
        .route("/kill", get(kill_handler))
        .with_state(broker)
}

async fn follow_up_handler(
    State(broker): State<Arc<Broker>>,
    Query(query): Query<FollowUpQuery>,
) -> Response {
    let working_dir = (!query.working_dir.is_empty()).then(|| PathBuf::from(&query.working_dir));
    info!(
        working_dir = %query.working_dir,
        program = %query.program_name,
        "follow-up requested"
    );
    match broker.respond(working_dir).await {
        Ok(reply) => (StatusCode::OK, reply.body()).into_response(),
        Err(error) => {
            warn!(%error, "follow-up request failed");
            error.into_response()
        }
    }
}

async fn kill_handler(State(broker): State<Arc<Broker>>) -> StatusCode {
    broker.request_shutdown();
    // Off the handler's task so graceful shutdown is not waiting on itself.
    tokio::spawn(async move { broker.shutdown() });
    info!("server killed");
    StatusCode::OK
}

/// Serves until the broker shuts down.
pub async fn serve(listener: TcpListener, broker: Arc<Broker>) -> std::io::Result<()> {
    let shutdown = broker.shutdown_token();
    axum::serve(listener, router(broker))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Binds the listener, starts the producer on `source` and serves until shutdown.
pub async fn run(
    config: BrokerConfig,
    composer: Composer,
    source: impl InputSource,
) -> anyhow::Result<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    println!("Starting server on port {}...", config.port);

    let (broker, producer) = Broker::new(config, composer);
    let signals = {
        let broker = Arc::clone(&broker);
        SignalGuard::install(&[libc::SIGTERM, libc::SIGHUP], move |signal| {
            info!(signal = signal_name(signal), "shutdown signal received");
            broker.shutdown();
        })
    };
    if let Err(error) = &signals {
        warn!(%error, "failed to install shutdown signal handlers");
    }

    let producer = producer.spawn(source);
    let served = serve(listener, Arc::clone(&broker)).await;
    broker.shutdown();
    if tokio::time::timeout(PRODUCER_GRACE, producer).await.is_err() {
        warn!("input session did not stop in time");
    }
    drop(signals);
    served.context("server failed")
}
