use crate::config::Config;
use crate::server::Node;
use crate::statistics::Statistics;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

#[derive(Clone)]
struct AppState {
    node: Arc<Node>,
    statistics: Statistics,
}

/// Starts the status API. Read-only; carries no authentication, so bind
/// it to loopback unless the network is trusted.
pub async fn start(config: &Config, node: Arc<Node>, statistics: Statistics) -> anyhow::Result<()> {
    let state = AppState { node, statistics };

    let router = Router::new()
        .route("/info", get(info))
        .route("/stats", get(stats))
        .route("/streams", get(streams))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.api.listen)
        .await
        .context("bind api listener")?;

    log::info!("api server listening: addr={}", config.api.listen);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            log::error!("api server error: err={:?}", e);
        }
    });

    Ok(())
}

async fn info(State(state): State<AppState>) -> Json<Value> {
    let clock = state.node.clock();

    Json(json!({
        "software": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "ptp": {
            "calibrated": clock.calibrated(),
            "offset_ns": clock.offset_ns(),
            "mean_path_delay_ns": clock.mean_path_delay_ns(),
            "grandmaster": clock.grandmaster_identity().map(|id| id.to_string()),
            "last_sync_unix_ns": clock.last_sync_unix_ns(),
        },
    }))
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    let mut entries = serde_json::Map::new();

    for name in state.statistics.names() {
        if let Some(counts) = state.statistics.get(&name) {
            entries.insert(
                name,
                json!({
                    "received_bytes": counts.received_bytes,
                    "received_pkts": counts.received_pkts,
                    "invalid_pkts": counts.invalid_pkts,
                    "rejected_pkts": counts.rejected_pkts,
                    "rtcp_pkts": counts.rtcp_pkts,
                }),
            );
        }
    }

    Json(Value::Object(entries))
}

async fn streams(State(state): State<AppState>) -> Json<Value> {
    let streams: Vec<Value> = state
        .node
        .streams()
        .map(|(name, stream)| {
            let description = stream.description();
            let counters = stream.counters();

            json!({
                "name": name,
                "group": description.connection_address.to_string(),
                "port": description.port,
                "payload_type": description.payload_type,
                "sample_rate": description.sample_rate,
                "channels": description.channels,
                "bits_per_sample": description.bits_per_sample,
                "source_ssrc": stream.source_ssrc(),
                "counters": {
                    "out_of_order": counters.out_of_order,
                    "duplicates": counters.duplicates,
                    "dropped": counters.dropped,
                    "too_late": counters.too_late,
                    "jitter": counters.jitter,
                },
            })
        })
        .collect();

    Json(json!(streams))
}
