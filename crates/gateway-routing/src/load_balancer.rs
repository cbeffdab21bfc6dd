//! Load balancer for distributing requests across a route's backends.
//!
//! The round-robin balancer tracks per-backend health from the outcomes the
//! dispatcher reports, marks backends unhealthy after repeated consecutive
//! failures, and heals them passively once enough time has passed since their
//! last failure. When every backend is unhealthy it fails open and resets them
//! all, trading possible retries against dead backends for never locking a
//! route out completely.
//!
//! Locking is two-tiered. The backend arena sits behind a coarse `RwLock` that
//! is taken exclusively only for reset-all; enumeration and per-backend updates
//! share it and then take the backend's own `Mutex`.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Consecutive failures after which a backend is marked unhealthy
pub const DEFAULT_MAX_FAIL_COUNT: u32 = 3;

/// Time after the last failure before an unhealthy backend is retried
pub const DEFAULT_FAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of recent response latencies kept per backend
pub const DEFAULT_LATENCY_WINDOW: usize = 10;

/// Load balancer configuration
#[derive(Debug, Clone)]
pub struct LoadBalancerConfig {
    /// Consecutive failures before a backend is marked unhealthy
    pub max_fail_count: u32,
    /// Elapsed time since the last failure after which a backend heals
    pub fail_timeout: Duration,
    /// Capacity of the recent-latency ring
    pub latency_window: usize,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            max_fail_count: DEFAULT_MAX_FAIL_COUNT,
            fail_timeout: DEFAULT_FAIL_TIMEOUT,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

impl LoadBalancerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    #[must_use]
    pub fn with_max_fail_count(mut self, count: u32) -> Self {
        self.max_fail_count = count.max(1);
        self
    }

    /// Set the passive recovery timeout
    #[must_use]
    pub fn with_fail_timeout(mut self, timeout: Duration) -> Self {
        self.fail_timeout = timeout;
        self
    }

    /// Set the latency ring capacity
    #[must_use]
    pub fn with_latency_window(mut self, window: usize) -> Self {
        self.latency_window = window.max(1);
        self
    }
}

/// Backend selection and outcome tracking for one route
pub trait LoadBalancer: Send + Sync {
    /// Select the next backend. `None` only when the route has no backends.
    fn next_backend(&self) -> Option<String>;

    /// Record a completed exchange with a backend
    fn report_success(&self, backend: &str, latency: Duration);

    /// Record a transport or protocol failure against a backend
    fn report_failure(&self, backend: &str);

    /// All configured backends, in configuration order
    fn backends(&self) -> Vec<String>;

    /// Backends currently eligible for selection, healing any that timed out
    fn healthy_backends(&self) -> Vec<String>;

    /// Point-in-time view of every backend's health state
    fn statuses(&self) -> Vec<BackendStatus>;

    /// Get the strategy name
    fn name(&self) -> &'static str;
}

/// Snapshot of one backend's health state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    /// Backend base URL
    pub url: String,
    /// Whether the backend is eligible for selection
    pub healthy: bool,
    /// Consecutive failures since the last success or reset
    pub fail_count: u32,
    /// When the most recent failure was reported
    pub last_fail_time: Option<Instant>,
    /// Most recent response latencies, oldest first
    pub recent_latencies: Vec<Duration>,
}

impl BackendStatus {
    /// Mean of the recent latencies, if any were recorded
    #[must_use]
    pub fn avg_latency(&self) -> Option<Duration> {
        let count = u32::try_from(self.recent_latencies.len()).ok().filter(|c| *c > 0)?;
        Some(self.recent_latencies.iter().sum::<Duration>() / count)
    }
}

#[derive(Debug)]
struct BackendState {
    healthy: bool,
    fail_count: u32,
    last_fail_time: Option<Instant>,
    latencies: VecDeque<Duration>,
}

impl BackendState {
    fn new(window: usize) -> Self {
        Self {
            healthy: true,
            fail_count: 0,
            last_fail_time: None,
            latencies: VecDeque::with_capacity(window),
        }
    }

    fn reset(&mut self) {
        self.healthy = true;
        self.fail_count = 0;
    }
}

/// Round robin over the healthy subset of a route's backends.
///
/// The cursor is reduced modulo the size of the healthy subset at call time,
/// so the rotation is exact only while health is stable. Under churn the
/// distribution is approximately fair.
pub struct RoundRobinBalancer {
    config: LoadBalancerConfig,
    /// Backend URLs, indexed in parallel with `states`
    urls: Box<[String]>,
    states: RwLock<Box<[Mutex<BackendState>]>>,
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    /// Create a balancer with default policy
    #[must_use]
    pub fn new<I, S>(backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(backends, LoadBalancerConfig::default())
    }

    /// Create a balancer with a custom policy
    #[must_use]
    pub fn with_config<I, S>(backends: I, config: LoadBalancerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Box<[String]> = backends.into_iter().map(Into::into).collect();
        let states = urls
            .iter()
            .map(|_| Mutex::new(BackendState::new(config.latency_window)))
            .collect();

        Self {
            config,
            urls,
            states: RwLock::new(states),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &LoadBalancerConfig {
        &self.config
    }

    /// Snapshot of a single backend
    #[must_use]
    pub fn backend_status(&self, backend: &str) -> Option<BackendStatus> {
        let idx = self.index_of(backend)?;
        let states = self.states.read();
        let state = states[idx].lock();
        Some(Self::snapshot(&self.urls[idx], &state))
    }

    fn index_of(&self, backend: &str) -> Option<usize> {
        self.urls.iter().position(|url| url == backend)
    }

    fn snapshot(url: &str, state: &BackendState) -> BackendStatus {
        BackendStatus {
            url: url.to_string(),
            healthy: state.healthy,
            fail_count: state.fail_count,
            last_fail_time: state.last_fail_time,
            recent_latencies: state.latencies.iter().copied().collect(),
        }
    }

    /// Indices of healthy backends as of `now`, healing those past `fail_timeout`
    fn healthy_indices_at(&self, now: Instant) -> Vec<usize> {
        let states = self.states.read();
        let mut healthy = Vec::with_capacity(states.len());

        for (idx, slot) in states.iter().enumerate() {
            let mut state = slot.lock();

            if !state.healthy {
                if let Some(failed_at) = state.last_fail_time {
                    if now.saturating_duration_since(failed_at) > self.config.fail_timeout {
                        state.reset();
                        info!(backend = %self.urls[idx], "Backend recovery attempt");
                    }
                }
            }

            if state.healthy {
                healthy.push(idx);
            }
        }

        healthy
    }

    fn healthy_backends_at(&self, now: Instant) -> Vec<String> {
        self.healthy_indices_at(now)
            .into_iter()
            .map(|idx| self.urls[idx].clone())
            .collect()
    }

    fn next_backend_at(&self, now: Instant) -> Option<String> {
        let healthy = self.healthy_indices_at(now);

        if healthy.is_empty() {
            self.reset_all();
            return self.urls.first().cloned();
        }

        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        let idx = healthy[turn % healthy.len()];
        Some(self.urls[idx].clone())
    }

    /// Mark every backend healthy and clear failure counts
    fn reset_all(&self) {
        let states = self.states.write();
        if states.is_empty() {
            return;
        }

        warn!(
            backends = states.len(),
            "No healthy backends available, resetting all backends"
        );

        for slot in states.iter() {
            slot.lock().reset();
        }
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn next_backend(&self) -> Option<String> {
        self.next_backend_at(Instant::now())
    }

    fn report_success(&self, backend: &str, latency: Duration) {
        let Some(idx) = self.index_of(backend) else {
            debug!(backend = %backend, "Success reported for unknown backend");
            return;
        };

        let states = self.states.read();
        let mut state = states[idx].lock();
        state.reset();

        if state.latencies.len() >= self.config.latency_window {
            state.latencies.pop_front();
        }
        state.latencies.push_back(latency);

        debug!(
            backend = %backend,
            latency_ms = latency.as_millis(),
            "Backend reported success"
        );
    }

    fn report_failure(&self, backend: &str) {
        let Some(idx) = self.index_of(backend) else {
            debug!(backend = %backend, "Failure reported for unknown backend");
            return;
        };

        let all_unhealthy = {
            let states = self.states.read();
            {
                let mut state = states[idx].lock();
                state.fail_count += 1;
                state.last_fail_time = Some(Instant::now());

                if state.fail_count >= self.config.max_fail_count && state.healthy {
                    state.healthy = false;
                    warn!(
                        backend = %backend,
                        fail_count = state.fail_count,
                        "Backend marked as unhealthy"
                    );
                } else {
                    debug!(
                        backend = %backend,
                        fail_count = state.fail_count,
                        "Backend reported failure"
                    );
                }
            }

            states.iter().all(|slot| !slot.lock().healthy)
        };

        if all_unhealthy {
            self.reset_all();
        }
    }

    fn backends(&self) -> Vec<String> {
        self.urls.to_vec()
    }

    fn healthy_backends(&self) -> Vec<String> {
        self.healthy_backends_at(Instant::now())
    }

    fn statuses(&self) -> Vec<BackendStatus> {
        let states = self.states.read();
        self.urls
            .iter()
            .zip(states.iter())
            .map(|(url, slot)| Self::snapshot(url, &slot.lock()))
            .collect()
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B1: &str = "http://b1.local";
    const B2: &str = "http://b2.local";
    const B3: &str = "http://b3.local";

    /// Mark a backend unhealthy without triggering the fail-open check
    fn mark_unhealthy(lb: &RoundRobinBalancer, backend: &str) {
        let idx = lb.index_of(backend).unwrap();
        let states = lb.states.read();
        let mut state = states[idx].lock();
        state.healthy = false;
        state.fail_count = lb.config.max_fail_count;
        state.last_fail_time = Some(Instant::now());
    }

    #[test]
    fn test_round_robin_visits_each_backend_once() {
        let lb = RoundRobinBalancer::new([B1, B2, B3]);

        let picks: Vec<String> = (0..3).filter_map(|_| lb.next_backend()).collect();
        assert_eq!(picks, vec![B1, B2, B3]);

        // And the rotation keeps going
        assert_eq!(lb.next_backend().as_deref(), Some(B1));
    }

    #[test]
    fn test_no_backends() {
        let lb = RoundRobinBalancer::new(Vec::<String>::new());
        assert_eq!(lb.next_backend(), None);
        assert!(lb.healthy_backends().is_empty());
    }

    #[test]
    fn test_failures_below_threshold_keep_backend_healthy() {
        let lb = RoundRobinBalancer::new([B1, B2]);

        lb.report_failure(B1);
        lb.report_failure(B1);

        let status = lb.backend_status(B1).unwrap();
        assert!(status.healthy);
        assert_eq!(status.fail_count, 2);
        assert!(status.last_fail_time.is_some());
        assert_eq!(lb.healthy_backends(), vec![B1, B2]);
    }

    #[test]
    fn test_max_failures_exclude_backend() {
        let lb = RoundRobinBalancer::new([B1, B2]);

        for _ in 0..DEFAULT_MAX_FAIL_COUNT {
            lb.report_failure(B1);
        }

        let status = lb.backend_status(B1).unwrap();
        assert!(!status.healthy);
        assert_eq!(status.fail_count, DEFAULT_MAX_FAIL_COUNT);
        assert_eq!(lb.healthy_backends(), vec![B2]);

        for _ in 0..4 {
            assert_eq!(lb.next_backend().as_deref(), Some(B2));
        }
    }

    #[test]
    fn test_success_resets_failures() {
        let lb = RoundRobinBalancer::new([B1, B2]);

        lb.report_failure(B1);
        lb.report_failure(B1);
        lb.report_success(B1, Duration::from_millis(12));
        lb.report_failure(B1);

        let status = lb.backend_status(B1).unwrap();
        assert!(status.healthy);
        assert_eq!(status.fail_count, 1);
        assert_eq!(status.recent_latencies, vec![Duration::from_millis(12)]);
    }

    #[test]
    fn test_latency_ring_drops_oldest() {
        let lb = RoundRobinBalancer::new([B1]);

        for ms in 1..=12 {
            lb.report_success(B1, Duration::from_millis(ms));
        }

        let status = lb.backend_status(B1).unwrap();
        assert_eq!(status.recent_latencies.len(), DEFAULT_LATENCY_WINDOW);
        assert_eq!(status.recent_latencies.first(), Some(&Duration::from_millis(3)));
        assert_eq!(status.recent_latencies.last(), Some(&Duration::from_millis(12)));
        assert_eq!(status.avg_latency(), Some(Duration::from_micros(7_500)));
    }

    #[test]
    fn test_all_failed_reports_fail_open() {
        let lb = RoundRobinBalancer::new([B1, B2]);

        for _ in 0..DEFAULT_MAX_FAIL_COUNT {
            lb.report_failure(B1);
        }
        for _ in 0..DEFAULT_MAX_FAIL_COUNT {
            lb.report_failure(B2);
        }

        // The last failure left nothing healthy, so everything was reset
        assert!(lb.statuses().iter().all(|s| s.healthy && s.fail_count == 0));
        assert_eq!(lb.healthy_backends(), vec![B1, B2]);
    }

    #[test]
    fn test_next_backend_fails_open_when_all_unhealthy() {
        let lb = RoundRobinBalancer::new([B1, B2]);
        mark_unhealthy(&lb, B1);
        mark_unhealthy(&lb, B2);

        assert_eq!(lb.next_backend().as_deref(), Some(B1));
        assert!(lb.statuses().iter().all(|s| s.healthy && s.fail_count == 0));
        assert_eq!(lb.healthy_backends(), vec![B1, B2]);
    }

    #[test]
    fn test_passive_recovery_boundary() {
        let lb = RoundRobinBalancer::new([B1, B2]);
        for _ in 0..DEFAULT_MAX_FAIL_COUNT {
            lb.report_failure(B1);
        }

        let failed_at = lb.backend_status(B1).unwrap().last_fail_time.unwrap();

        let before = failed_at + DEFAULT_FAIL_TIMEOUT - Duration::from_secs(1);
        assert_eq!(lb.healthy_backends_at(before), vec![B2]);
        assert!(!lb.backend_status(B1).unwrap().healthy);

        let after = failed_at + DEFAULT_FAIL_TIMEOUT + Duration::from_secs(1);
        assert_eq!(lb.healthy_backends_at(after), vec![B1, B2]);

        let status = lb.backend_status(B1).unwrap();
        assert!(status.healthy);
        assert_eq!(status.fail_count, 0);
    }

    #[test]
    fn test_custom_policy() {
        let config = LoadBalancerConfig::new()
            .with_max_fail_count(1)
            .with_fail_timeout(Duration::from_millis(0));
        let lb = RoundRobinBalancer::with_config([B1, B2], config);

        lb.report_failure(B1);
        assert!(!lb.backend_status(B1).unwrap().healthy);

        // Any elapsed time exceeds a zero timeout
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(lb.healthy_backends(), vec![B1, B2]);
    }

    #[test]
    fn test_unknown_backend_reports_ignored() {
        let lb = RoundRobinBalancer::new([B1]);
        lb.report_failure("http://unknown");
        lb.report_success("http://unknown", Duration::from_millis(1));
        assert_eq!(lb.statuses().len(), 1);
        assert!(lb.statuses()[0].healthy);
    }

    #[test]
    fn test_concurrent_selection_and_reports() {
        use std::sync::Arc;

        let lb = Arc::new(RoundRobinBalancer::new([B1, B2, B3]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lb = Arc::clone(&lb);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let backend = lb.next_backend().unwrap();
                        if i % 2 == 0 {
                            lb.report_failure(&backend);
                        } else {
                            lb.report_success(&backend, Duration::from_millis(1));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Fail-open guarantees at least one selectable backend
        assert!(!lb.healthy_backends().is_empty());
        assert_eq!(lb.backends().len(), 3);
    }
}
