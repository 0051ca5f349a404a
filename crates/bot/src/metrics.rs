use anyhow::Result;
use moonwatch_core::metrics::Metrics;
use prometheus::{IntCounter, IntCounterVec, IntGauge};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

pub struct BotMetrics {
    metrics: Metrics,
    pub blocks_scanned: IntCounter,
    pub candidates_total: IntCounter,
    pub resolved_total: IntCounter,
    pub expired_total: IntCounter,
    pub queue_dropped_total: IntCounter,
    pub fetch_failures_total: IntCounterVec,
    pub delivery_failures_total: IntCounter,
    pub iteration_failures_total: IntCounter,
    pub pending: IntGauge,
}

impl BotMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Metrics::new();
        let blocks_scanned =
            metrics.counter("blocks_scanned_total", "Blocks fully scanned for launches")?;
        let candidates_total =
            metrics.counter("candidates_total", "New token candidates discovered")?;
        let resolved_total =
            metrics.counter("resolved_total", "Candidates resolved with market data")?;
        let expired_total = metrics.counter(
            "expired_total",
            "Candidates dropped after exhausting their retry budget",
        )?;
        let queue_dropped_total = metrics.counter(
            "queue_dropped_total",
            "Candidates rejected because the waiting queue was full",
        )?;
        let fetch_failures_total = metrics.counter_vec(
            "fetch_failures_total",
            "Market data fetch failures by kind",
            &["kind"],
        )?;
        let delivery_failures_total = metrics.counter(
            "delivery_failures_total",
            "Alert deliveries that failed for a single chat",
        )?;
        let iteration_failures_total = metrics.counter(
            "iteration_failures_total",
            "Main loop iterations aborted by an error",
        )?;
        let pending = metrics.gauge("pending", "Candidates waiting for market data")?;

        Ok(Self {
            metrics,
            blocks_scanned,
            candidates_total,
            resolved_total,
            expired_total,
            queue_dropped_total,
            fetch_failures_total,
            delivery_failures_total,
            iteration_failures_total,
            pending,
        })
    }

    pub fn gather(&self) -> String {
        self.metrics.gather()
    }
}

pub fn spawn_metrics_server(bind: &str, metrics: Arc<BotMetrics>) -> Result<()> {
    let listener = TcpListener::bind(bind)?;
    let bind = bind.to_string();
    thread::spawn(move || {
        info!(%bind, "metrics server listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = handle_connection(stream, &metrics) {
                        warn!(?err, "metrics server connection failed");
                    }
                }
                Err(err) => {
                    warn!(?err, "metrics server accept failed");
                }
            }
        }
    });
    Ok(())
}

fn handle_connection(mut stream: TcpStream, metrics: &BotMetrics) -> Result<()> {
    let mut buffer = [0u8; 512];
    if let Err(err) = stream.read(&mut buffer) {
        debug!(?err, "metrics request read failed");
    }
    let body = metrics.gather();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}
