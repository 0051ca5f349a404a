use alloy::primitives::Address;
use futures_util::stream::{self, StreamExt};
use moonwatch_core::config::QueueConfig;
use moonwatch_core::modes::FetchErrorPolicy;
use moonwatch_core::types::{CandidateToken, Snapshot};
use moonwatch_market::SnapshotSource;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub max_retries: u32,
    pub max_pending: usize,
    /// Age ceiling for candidates whose failed fetches are not counted. Only
    /// applies under `FetchErrorPolicy::Ignore`; zero disables it.
    pub max_pending_age_ms: u64,
    pub fetch_concurrency: usize,
    pub error_policy: FetchErrorPolicy,
}

impl QueuePolicy {
    pub fn from_config(cfg: &QueueConfig) -> moonwatch_core::Result<Self> {
        Ok(Self {
            max_retries: cfg.max_retries,
            max_pending: cfg.max_pending.max(1),
            max_pending_age_ms: cfg.max_pending_age_ms,
            fetch_concurrency: cfg.fetch_concurrency.max(1),
            error_policy: FetchErrorPolicy::parse(&cfg.fetch_error_policy)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Pending,
    Resolved,
    Expired,
}

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub resolved: Vec<(CandidateToken, Snapshot)>,
    pub expired: Vec<CandidateToken>,
    /// Kind label of every failed fetch this tick.
    pub fetch_failures: Vec<&'static str>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: usize,
    pub rejected: usize,
}

/// Candidates waiting for the market-data indexer to price their pair.
///
/// Every candidate leaves the queue either resolved or expired; it is never
/// Pending for more than `max_retries` ticks, and the queue never holds more
/// than `max_pending` entries.
pub struct WaitingQueue {
    policy: QueuePolicy,
    entries: HashMap<Address, CandidateToken>,
}

impl WaitingQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<&CandidateToken> {
        self.entries.get(address)
    }

    pub fn enqueue(&mut self, candidates: Vec<CandidateToken>) -> Admission {
        let mut admission = Admission::default();
        for candidate in candidates {
            if self.entries.contains_key(&candidate.address) {
                continue;
            }
            if self.entries.len() >= self.policy.max_pending {
                warn!(
                    address = %candidate.address,
                    max_pending = self.policy.max_pending,
                    "waiting queue full; dropping candidate"
                );
                admission.rejected += 1;
                continue;
            }
            self.entries.insert(candidate.address, candidate);
            admission.admitted += 1;
        }
        admission
    }

    /// One resolution round: expire exhausted candidates, fetch a snapshot for
    /// every live one, then settle each result. Fetches run concurrently; all
    /// queue mutation happens after they complete.
    pub async fn tick<S>(&mut self, source: &S, epoch_ms: u64, now_ms: u64) -> TickOutcome
    where
        S: SnapshotSource,
    {
        let mut outcome = TickOutcome::default();

        let mut order: Vec<(u64, Address)> = self
            .entries
            .values()
            .map(|candidate| (candidate.first_seen_ms, candidate.address))
            .collect();
        order.sort();

        let mut live = Vec::with_capacity(order.len());
        for (_, address) in order {
            let exhausted = self
                .entries
                .get(&address)
                .map(|candidate| self.is_exhausted(candidate, now_ms))
                .unwrap_or(false);
            if exhausted {
                self.expire(address, &mut outcome);
            } else {
                live.push(address);
            }
        }

        let fetched: Vec<_> = stream::iter(live)
            .map(|address| async move { (address, source.fetch(address).await) })
            .buffered(self.policy.fetch_concurrency)
            .collect()
            .await;

        for (address, result) in fetched {
            let counts_attempt = match result {
                Ok(Some(snapshot)) if snapshot.is_eligible(epoch_ms) => {
                    if let Some(candidate) = self.entries.remove(&address) {
                        debug!(%address, retries = candidate.retry_count, "candidate resolved");
                        outcome.resolved.push((candidate, snapshot));
                    }
                    continue;
                }
                Ok(Some(snapshot)) => {
                    if snapshot.is_usable() {
                        debug!(
                            %address,
                            pair_created_at_ms = snapshot.pair_created_at_ms,
                            epoch_ms,
                            "pair predates process start"
                        );
                    }
                    true
                }
                Ok(None) => true,
                Err(err) => {
                    debug!(?err, %address, "snapshot fetch failed");
                    outcome.fetch_failures.push(err.kind());
                    self.policy.error_policy == FetchErrorPolicy::Count
                }
            };

            if counts_attempt && self.record_attempt(address) == Resolution::Expired {
                self.expire(address, &mut outcome);
            }
        }

        outcome
    }

    fn is_exhausted(&self, candidate: &CandidateToken, now_ms: u64) -> bool {
        if candidate.retry_count >= self.policy.max_retries {
            return true;
        }
        self.policy.error_policy == FetchErrorPolicy::Ignore
            && self.policy.max_pending_age_ms > 0
            && now_ms.saturating_sub(candidate.first_seen_ms) > self.policy.max_pending_age_ms
    }

    fn record_attempt(&mut self, address: Address) -> Resolution {
        let Some(candidate) = self.entries.get_mut(&address) else {
            return Resolution::Expired;
        };
        candidate.retry_count = candidate.retry_count.saturating_add(1);
        if candidate.retry_count >= self.policy.max_retries {
            Resolution::Expired
        } else {
            Resolution::Pending
        }
    }

    fn expire(&mut self, address: Address, outcome: &mut TickOutcome) {
        if let Some(candidate) = self.entries.remove(&address) {
            info!(
                %address,
                retries = candidate.retry_count,
                "candidate expired without market data"
            );
            outcome.expired.push(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_number;
    use alloy::primitives::{address, B256};
    use moonwatch_market::FetchError;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const EPOCH_MS: u64 = 1_700_000_000_000;
    const TOKEN: Address = address!("0xabc0000000000000000000000000000000000001");
    const OTHER: Address = address!("0xdef0000000000000000000000000000000000002");

    enum Scripted {
        Absent,
        Found(Snapshot),
        Failed,
    }

    #[derive(Default)]
    struct ScriptedSource {
        scripts: Mutex<HashMap<Address, VecDeque<Scripted>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push(&self, address: Address, response: Scripted) {
            self.scripts
                .lock()
                .unwrap()
                .entry(address)
                .or_default()
                .push_back(response);
        }
    }

    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self, address: Address) -> Result<Option<Snapshot>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&address)
                .and_then(|script| script.pop_front())
                .unwrap_or(Scripted::Absent);
            match next {
                Scripted::Absent => Ok(None),
                Scripted::Found(snapshot) => Ok(Some(snapshot)),
                Scripted::Failed => Err(FetchError::Status(StatusCode::BAD_GATEWAY)),
            }
        }
    }

    fn policy(max_retries: u32) -> QueuePolicy {
        QueuePolicy {
            max_retries,
            max_pending: 16,
            max_pending_age_ms: 0,
            fetch_concurrency: 4,
            error_policy: FetchErrorPolicy::Count,
        }
    }

    fn candidate(address: Address, first_seen_ms: u64) -> CandidateToken {
        CandidateToken::new(address, 1, B256::ZERO, first_seen_ms)
    }

    fn launch_snapshot(created_ms: u64) -> Snapshot {
        Snapshot {
            price_usd: Some(0.000123),
            fdv: Some(1_500_000.0),
            liquidity_usd: Some(5_000.0),
            volume_24h: Some(20_000.0),
            pair_created_at_ms: Some(created_ms),
            symbol: Some("FOO".to_string()),
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn resolves_once_indexer_catches_up() {
        let source = ScriptedSource::default();
        for _ in 0..5 {
            source.push(TOKEN, Scripted::Absent);
        }
        source.push(TOKEN, Scripted::Found(launch_snapshot(EPOCH_MS + 1_000)));

        let mut queue = WaitingQueue::new(policy(60));
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);

        let mut resolved = Vec::new();
        for tick in 0..6u64 {
            let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS + tick * 2_000).await;
            assert!(outcome.expired.is_empty());
            resolved.extend(outcome.resolved);
        }

        assert_eq!(resolved.len(), 1);
        let (candidate, snapshot) = &resolved[0];
        assert_eq!(candidate.address, TOKEN);
        assert_eq!(candidate.retry_count, 5);
        assert_eq!(format_number(snapshot.price_usd), "0.000123");
        assert_eq!(format_number(snapshot.fdv), "1.50M");
        assert_eq!(format_number(snapshot.liquidity_usd), "5.00k");
        assert_eq!(format_number(snapshot.volume_24h), "20.00k");
        assert!(queue.is_empty());

        let later = queue.tick(&source, EPOCH_MS, EPOCH_MS + 20_000).await;
        assert!(later.resolved.is_empty());
    }

    #[tokio::test]
    async fn expires_after_max_retries_without_alert() {
        let source = ScriptedSource::default();
        let mut queue = WaitingQueue::new(policy(60));
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);

        let mut pending_ticks = 0;
        let mut expired_at = None;
        for tick in 1..=100u32 {
            let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS).await;
            assert!(outcome.resolved.is_empty());
            if !outcome.expired.is_empty() {
                expired_at = Some(tick);
                break;
            }
            pending_ticks += 1;
        }

        assert_eq!(expired_at, Some(60));
        assert!(pending_ticks <= 60);
        assert_eq!(source.calls.load(Ordering::SeqCst), 60);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn pair_created_before_epoch_never_resolves() {
        let source = ScriptedSource::default();
        for _ in 0..3 {
            source.push(TOKEN, Scripted::Found(launch_snapshot(EPOCH_MS)));
        }
        let mut queue = WaitingQueue::new(policy(3));
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);

        let mut expired = 0;
        for _ in 0..3 {
            let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS).await;
            assert!(outcome.resolved.is_empty());
            expired += outcome.expired.len();
        }
        assert_eq!(expired, 1);
    }

    #[tokio::test]
    async fn snapshot_without_creation_time_keeps_waiting() {
        let source = ScriptedSource::default();
        let mut unpriced = launch_snapshot(EPOCH_MS + 1);
        unpriced.pair_created_at_ms = None;
        source.push(TOKEN, Scripted::Found(unpriced));

        let mut queue = WaitingQueue::new(policy(10));
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);
        let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS).await;

        assert!(outcome.resolved.is_empty());
        assert_eq!(queue.get(&TOKEN).map(|c| c.retry_count), Some(1));
    }

    #[tokio::test]
    async fn fetch_errors_follow_policy() {
        let source = ScriptedSource::default();
        source.push(TOKEN, Scripted::Failed);
        source.push(OTHER, Scripted::Failed);

        let mut counting = WaitingQueue::new(policy(10));
        counting.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);
        let outcome = counting.tick(&source, EPOCH_MS, EPOCH_MS).await;
        assert_eq!(outcome.fetch_failures, vec!["status"]);
        assert_eq!(counting.get(&TOKEN).map(|c| c.retry_count), Some(1));

        let mut ignoring = WaitingQueue::new(QueuePolicy {
            error_policy: FetchErrorPolicy::Ignore,
            ..policy(10)
        });
        ignoring.enqueue(vec![candidate(OTHER, EPOCH_MS)]);
        let outcome = ignoring.tick(&source, EPOCH_MS, EPOCH_MS).await;
        assert_eq!(outcome.fetch_failures.len(), 1);
        assert_eq!(ignoring.get(&OTHER).map(|c| c.retry_count), Some(0));
    }

    #[tokio::test]
    async fn age_ceiling_expires_without_fetch() {
        let source = ScriptedSource::default();
        let mut queue = WaitingQueue::new(QueuePolicy {
            max_pending_age_ms: 10_000,
            error_policy: FetchErrorPolicy::Ignore,
            ..policy(60)
        });
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);

        let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS + 10_001).await;
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn counted_retries_survive_long_stall() {
        let source = ScriptedSource::default();
        let mut queue = WaitingQueue::new(QueuePolicy::from_config(&QueueConfig::default()).unwrap());
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS)]);

        let first = queue.tick(&source, EPOCH_MS, EPOCH_MS + 2_000).await;
        assert!(first.expired.is_empty());

        let after_stall = queue.tick(&source, EPOCH_MS, EPOCH_MS + 600_001).await;
        assert!(after_stall.expired.is_empty());
        assert_eq!(queue.get(&TOKEN).map(|c| c.retry_count), Some(2));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn candidates_resolve_independently() {
        let source = ScriptedSource::default();
        source.push(OTHER, Scripted::Found(launch_snapshot(EPOCH_MS + 5)));

        let mut queue = WaitingQueue::new(policy(60));
        queue.enqueue(vec![candidate(TOKEN, EPOCH_MS), candidate(OTHER, EPOCH_MS + 1)]);
        let outcome = queue.tick(&source, EPOCH_MS, EPOCH_MS).await;

        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].0.address, OTHER);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(&TOKEN).map(|c| c.retry_count), Some(1));
    }

    #[test]
    fn enqueue_respects_capacity_and_ignores_duplicates() {
        let mut queue = WaitingQueue::new(QueuePolicy {
            max_pending: 1,
            ..policy(60)
        });
        let admission = queue.enqueue(vec![
            candidate(TOKEN, EPOCH_MS),
            candidate(TOKEN, EPOCH_MS),
            candidate(OTHER, EPOCH_MS),
        ]);

        assert_eq!(
            admission,
            Admission {
                admitted: 1,
                rejected: 1
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn policy_from_config_rejects_unknown_error_policy() {
        let mut cfg = QueueConfig::default();
        assert!(QueuePolicy::from_config(&cfg).is_ok());
        cfg.fetch_error_policy = "bogus".to_string();
        assert!(QueuePolicy::from_config(&cfg).is_err());
    }
}
