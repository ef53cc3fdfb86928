// SPDX-License-Identifier: Apache-2.0

//! In-process request metrics and the `/metrics` text endpoint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::http::respond::{make_request_id, with_request_id};
use crate::AppState;

#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency_ns: Mutex<HashMap<String, Vec<u64>>>,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);

        let mut latency_ns = self.latency_ns.lock().await;
        latency_ns
            .entry(route.to_string())
            .or_insert_with(Vec::new)
            .push(latency.as_nanos() as u64);
    }
}

fn percentile_ns(values: &[u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64 - 1.0) * pct).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let request_id = make_request_id(&state);

    let counts = state.metrics.counts.lock().await.clone();
    let latencies = state.metrics.latency_ns.lock().await.clone();

    let mut lines = Vec::with_capacity(counts.len() + latencies.len() + 2);
    lines.push("# TYPE vitrine_http_requests_total counter".to_string());
    let mut count_lines: Vec<String> = counts
        .into_iter()
        .map(|((route, status), total)| {
            format!("vitrine_http_requests_total{{route=\"{route}\",status=\"{status}\"}} {total}")
        })
        .collect();
    count_lines.sort();
    lines.append(&mut count_lines);

    lines.push("# TYPE vitrine_http_request_latency_p95_seconds gauge".to_string());
    let mut latency_lines: Vec<String> = latencies
        .into_iter()
        .map(|(route, samples)| {
            let p95 = percentile_ns(&samples, 0.95) as f64 / 1_000_000_000.0;
            format!("vitrine_http_request_latency_p95_seconds{{route=\"{route}\"}} {p95:.9}")
        })
        .collect();
    latency_lines.sort();
    lines.append(&mut latency_lines);

    let body = format!("{}\n", lines.join("\n"));
    let resp = (StatusCode::OK, body).into_response();
    state
        .metrics
        .observe_request("/metrics", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}
