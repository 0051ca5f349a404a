use crate::metrics::{spawn_metrics_server, BotMetrics};
use crate::notifier::{AlertTransport, Notifier, TelegramTransport};
use crate::queue::{QueuePolicy, TickOutcome, WaitingQueue};
use alloy::primitives::Address;
use anyhow::Result;
use moonwatch_chain::{ChainScanner, ChainSource, NodeClient, RpcChainSource};
use moonwatch_core::config::AppConfig;
use moonwatch_core::dedupe::SeenSet;
use moonwatch_core::utils::{now_ms, parse_address};
use moonwatch_market::{DexScreenerClient, SnapshotSource};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const SUMMARY_INTERVAL_MS: u64 = 30_000;
const STARTUP_MESSAGE: &str =
    "✅ Bot connected and monitoring Moonshot launches with token data...";

pub type LiveBot = Bot<RpcChainSource, DexScreenerClient, TelegramTransport>;

/// Owns every piece of watcher state: the scanner cursor, the seen set, the
/// waiting queue and the process epoch.
pub struct Bot<C, S, T> {
    cfg: AppConfig,
    scanner: ChainScanner<C>,
    seen: SeenSet<Address>,
    queue: WaitingQueue,
    market: S,
    notifier: Notifier<T>,
    metrics: Option<Arc<BotMetrics>>,
    epoch_ms: u64,
    counters: CounterSummary,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    pub block_scanned: bool,
    pub candidates: usize,
    pub resolved: usize,
    pub expired: usize,
    pub alerts_delivered: usize,
    pub delivery_failures: usize,
}

#[derive(Default, Clone, Copy)]
struct Counters {
    blocks_scanned: u64,
    candidates: u64,
    queue_dropped: u64,
    resolved: u64,
    expired: u64,
    fetch_failures: u64,
    alerts: u64,
    delivery_failures: u64,
    iteration_failures: u64,
}

impl Counters {
    fn delta(&self, previous: &Counters) -> Counters {
        Counters {
            blocks_scanned: self.blocks_scanned.saturating_sub(previous.blocks_scanned),
            candidates: self.candidates.saturating_sub(previous.candidates),
            queue_dropped: self.queue_dropped.saturating_sub(previous.queue_dropped),
            resolved: self.resolved.saturating_sub(previous.resolved),
            expired: self.expired.saturating_sub(previous.expired),
            fetch_failures: self.fetch_failures.saturating_sub(previous.fetch_failures),
            alerts: self.alerts.saturating_sub(previous.alerts),
            delivery_failures: self
                .delivery_failures
                .saturating_sub(previous.delivery_failures),
            iteration_failures: self
                .iteration_failures
                .saturating_sub(previous.iteration_failures),
        }
    }
}

struct CounterSummary {
    totals: Counters,
    last: Counters,
    last_log_ms: u64,
}

impl CounterSummary {
    fn new(now_ms: u64) -> Self {
        Self {
            totals: Counters::default(),
            last: Counters::default(),
            last_log_ms: now_ms,
        }
    }

    fn maybe_log(&mut self, now_ms: u64, pending: usize) {
        if now_ms.saturating_sub(self.last_log_ms) < SUMMARY_INTERVAL_MS {
            return;
        }
        let delta = self.totals.delta(&self.last);
        self.last = self.totals;
        self.last_log_ms = now_ms;
        info!(
            blocks = delta.blocks_scanned,
            candidates = delta.candidates,
            queue_dropped = delta.queue_dropped,
            resolved = delta.resolved,
            expired = delta.expired,
            fetch_failures = delta.fetch_failures,
            alerts = delta.alerts,
            delivery_failures = delta.delivery_failures,
            iteration_failures = delta.iteration_failures,
            pending,
            "counter summary (last 30s)"
        );
    }
}

impl LiveBot {
    pub async fn new(cfg: AppConfig) -> Result<Self> {
        let client = NodeClient::connect(&cfg.chain).await?;
        let chain = RpcChainSource::new(client.http, cfg.chain.request_timeout_ms);
        let market = DexScreenerClient::new(&cfg.market)?;
        let transport = TelegramTransport::from_config(&cfg.telegram)?;
        let metrics = if cfg.observability.metrics_enabled {
            let metrics = Arc::new(BotMetrics::new()?);
            spawn_metrics_server(&cfg.observability.metrics_bind, metrics.clone())?;
            Some(metrics)
        } else {
            None
        };
        Self::with_parts(cfg, chain, market, transport, metrics)
    }
}

impl<C, S, T> Bot<C, S, T>
where
    C: ChainSource,
    S: SnapshotSource,
    T: AlertTransport,
{
    pub fn with_parts(
        cfg: AppConfig,
        chain: C,
        market: S,
        transport: T,
        metrics: Option<Arc<BotMetrics>>,
    ) -> Result<Self> {
        let watched = parse_address(&cfg.chain.watched_contract)?;
        let policy = QueuePolicy::from_config(&cfg.queue)?;
        let notifier = Notifier::new(
            transport,
            cfg.telegram.chat_ids(),
            cfg.telegram.buy_link_base.clone(),
        );
        let epoch_ms = now_ms();
        Ok(Self {
            scanner: ChainScanner::new(chain, watched),
            seen: SeenSet::new(),
            queue: WaitingQueue::new(policy),
            market,
            notifier,
            metrics,
            epoch_ms,
            counters: CounterSummary::new(epoch_ms),
            cfg,
        })
    }

    /// Pairs created at or before this instant never produce an alert.
    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            watched = %self.scanner.watched(),
            epoch_ms = self.epoch_ms,
            chats = self.notifier.chat_count(),
            poll_interval_ms = self.cfg.queue.poll_interval_ms,
            "watcher started"
        );
        if self.cfg.telegram.announce_startup {
            let report = self.notifier.announce(STARTUP_MESSAGE).await;
            if report.failed > 0 {
                warn!(failed = report.failed, "startup announcement not delivered everywhere");
            }
        }

        loop {
            let delay_ms = match self.iteration(now_ms()).await {
                Ok(report) => {
                    debug!(?report, pending = self.queue.len(), "iteration complete");
                    self.cfg.queue.poll_interval_ms
                }
                Err(err) => {
                    warn!(?err, backoff_ms = self.cfg.queue.error_backoff_ms, "iteration failed");
                    self.counters.totals.iteration_failures += 1;
                    if let Some(metrics) = self.metrics.as_ref() {
                        metrics.iteration_failures_total.inc();
                    }
                    self.cfg.queue.error_backoff_ms
                }
            };
            self.counters.maybe_log(now_ms(), self.queue.len());
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Scan the latest block, admit new candidates, run one queue tick and
    /// alert on everything that resolved. A scan failure aborts the iteration
    /// before the queue is touched.
    pub async fn iteration(&mut self, now_ms: u64) -> Result<IterationReport> {
        let mut report = IterationReport::default();
        let previous_block = self.scanner.last_scanned();
        let candidates = self.scanner.scan(&mut self.seen).await?;
        report.block_scanned = self.scanner.last_scanned() != previous_block;
        report.candidates = candidates.len();

        let admission = self.queue.enqueue(candidates);
        let outcome = self.queue.tick(&self.market, self.epoch_ms, now_ms).await;
        report.resolved = outcome.resolved.len();
        report.expired = outcome.expired.len();

        for (candidate, snapshot) in &outcome.resolved {
            let delivery = self.notifier.notify(candidate, snapshot, now_ms).await;
            report.alerts_delivered += delivery.delivered;
            report.delivery_failures += delivery.failed;
        }

        self.record(&report, admission.rejected, &outcome);
        Ok(report)
    }

    fn record(&mut self, report: &IterationReport, rejected: usize, outcome: &TickOutcome) {
        let totals = &mut self.counters.totals;
        totals.blocks_scanned += u64::from(report.block_scanned);
        totals.candidates += report.candidates as u64;
        totals.queue_dropped += rejected as u64;
        totals.resolved += report.resolved as u64;
        totals.expired += report.expired as u64;
        totals.fetch_failures += outcome.fetch_failures.len() as u64;
        totals.alerts += report.alerts_delivered as u64;
        totals.delivery_failures += report.delivery_failures as u64;

        let Some(metrics) = self.metrics.as_ref() else {
            return;
        };
        if report.block_scanned {
            metrics.blocks_scanned.inc();
        }
        metrics.candidates_total.inc_by(report.candidates as u64);
        metrics.queue_dropped_total.inc_by(rejected as u64);
        metrics.resolved_total.inc_by(report.resolved as u64);
        metrics.expired_total.inc_by(report.expired as u64);
        metrics
            .delivery_failures_total
            .inc_by(report.delivery_failures as u64);
        for kind in &outcome.fetch_failures {
            metrics.fetch_failures_total.with_label_values(&[*kind]).inc();
        }
        metrics.pending.set(self.queue.len() as i64);
    }
}
