//! Generic, bounded resource pool: create-on-demand up to a cap, recycle
//! idle resources subject to health/lifetime/idle-time checks, and queue
//! callers FIFO when the pool is at capacity.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Tunables for one [`Pool`]. Mirrors the environment-driven configuration
/// convention used by the rest of this crate's runtime knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_conns: usize,
    pub min_conns: usize,
    pub max_idle_time: Duration,
    pub max_lifetime: Duration,
    pub wait_timeout: Duration,
    pub maintenance_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_conns: 10,
            min_conns: 0,
            max_idle_time: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(5),
            maintenance_interval: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Read overrides from `TRANCER_POOL_*` environment variables, falling
    /// back to [`PoolConfig::default`] for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = PoolConfig::default();
        if let Ok(v) = std::env::var("TRANCER_POOL_MAX_CONNS") {
            if let Ok(n) = v.parse() {
                cfg.max_conns = n;
            }
        }
        if let Ok(v) = std::env::var("TRANCER_POOL_MIN_CONNS") {
            if let Ok(n) = v.parse() {
                cfg.min_conns = n;
            }
        }
        if let Ok(v) = std::env::var("TRANCER_POOL_MAX_IDLE_SECS") {
            if let Ok(n) = v.parse() {
                cfg.max_idle_time = Duration::from_secs(n);
            }
        }
        if let Ok(v) = std::env::var("TRANCER_POOL_MAX_LIFETIME_SECS") {
            if let Ok(n) = v.parse() {
                cfg.max_lifetime = Duration::from_secs(n);
            }
        }
        if let Ok(v) = std::env::var("TRANCER_POOL_WAIT_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.wait_timeout = Duration::from_millis(n);
            }
        }
        cfg
    }
}

#[derive(Default)]
pub struct PoolStats {
    pub created: AtomicU64,
    pub closed: AtomicU64,
    pub reused: AtomicU64,
    pub timeouts: AtomicU64,
    pub health_failures: AtomicU64,
    pub wait_count: AtomicU64,
}

/// Point-in-time snapshot of [`PoolStats`], each field loaded independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatsSnapshot {
    pub created: u64,
    pub closed: u64,
    pub reused: u64,
    pub timeouts: u64,
    pub health_failures: u64,
    pub wait_count: u64,
    pub idle: usize,
    pub active: usize,
}

struct Entry<R> {
    resource: R,
    created_at: Instant,
    last_used_at: Instant,
}

type Waiter<R> = SyncSender<Option<Entry<R>>>;

/// A bounded pool of user-created resources of type `R`.
pub struct Pool<R: Send + 'static> {
    config: PoolConfig,
    factory: Box<dyn Fn() -> Result<R> + Send + Sync>,
    health_check: Option<Box<dyn Fn(&R) -> bool + Send + Sync>>,
    on_close: Option<Box<dyn Fn(&R) + Send + Sync>>,
    idle: Mutex<VecDeque<Entry<R>>>,
    waiters: Mutex<VecDeque<Waiter<R>>>,
    total: AtomicUsize,
    closed: AtomicBool,
    stats: PoolStats,
}

/// A resource on loan from a [`Pool`]. Returned to the pool (or destroyed,
/// if the pool has since closed) when dropped.
pub struct PooledGuard<R: Send + 'static> {
    pool: Arc<Pool<R>>,
    entry: Option<Entry<R>>,
}

impl<R: Send + 'static> std::ops::Deref for PooledGuard<R> {
    type Target = R;
    fn deref(&self) -> &R {
        #[allow(clippy::unwrap_used)]
        &self.entry.as_ref().unwrap().resource
    }
}

impl<R: Send + 'static> std::ops::DerefMut for PooledGuard<R> {
    fn deref_mut(&mut self) -> &mut R {
        #[allow(clippy::unwrap_used)]
        &mut self.entry.as_mut().unwrap().resource
    }
}

impl<R: Send + 'static> Drop for PooledGuard<R> {
    fn drop(&mut self) {
        if let Some(mut entry) = self.entry.take() {
            entry.last_used_at = Instant::now();
            self.pool.release(entry);
        }
    }
}

impl<R: Send + 'static> Pool<R> {
    /// Build the pool and pre-warm it with `min_conns` resources (clamped
    /// to `max_conns`), calling `factory` once per pre-warmed resource.
    #[must_use]
    pub fn new(
        mut config: PoolConfig,
        factory: impl Fn() -> Result<R> + Send + Sync + 'static,
    ) -> Arc<Self> {
        config.min_conns = config.min_conns.min(config.max_conns);
        let prewarm = config.min_conns;
        let pool = Arc::new(Pool {
            config,
            factory: Box::new(factory),
            health_check: None,
            on_close: None,
            idle: Mutex::new(VecDeque::new()),
            waiters: Mutex::new(VecDeque::new()),
            total: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            stats: PoolStats::default(),
        });
        pool.prewarm(prewarm);
        pool
    }

    fn prewarm(&self, count: usize) {
        for _ in 0..count {
            match (self.factory)() {
                Ok(resource) => {
                    self.total.fetch_add(1, Ordering::SeqCst);
                    self.stats.created.fetch_add(1, Ordering::Relaxed);
                    let now = Instant::now();
                    #[allow(clippy::unwrap_used)]
                    self.idle.lock().unwrap().push_back(Entry {
                        resource,
                        created_at: now,
                        last_used_at: now,
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "pool pre-warm factory call failed");
                }
            }
        }
    }

    #[must_use]
    pub fn with_health_check(
        mut self: Arc<Self>,
        check: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        #[allow(clippy::unwrap_used)]
        let inner = Arc::get_mut(&mut self).expect("pool must be unshared during construction");
        inner.health_check = Some(Box::new(check));
        self
    }

    #[must_use]
    pub fn with_on_close(
        mut self: Arc<Self>,
        on_close: impl Fn(&R) + Send + Sync + 'static,
    ) -> Arc<Self> {
        #[allow(clippy::unwrap_used)]
        let inner = Arc::get_mut(&mut self).expect("pool must be unshared during construction");
        inner.on_close = Some(Box::new(on_close));
        self
    }

    fn expired(&self, entry: &Entry<R>) -> bool {
        let now = Instant::now();
        now.duration_since(entry.created_at) > self.config.max_lifetime
            || now.duration_since(entry.last_used_at) > self.config.max_idle_time
    }

    fn healthy(&self, resource: &R) -> bool {
        self.health_check
            .as_ref()
            .map_or(true, |check| check(resource))
    }

    fn destroy(&self, entry: Entry<R>) {
        if let Some(on_close) = &self.on_close {
            on_close(&entry.resource);
        }
        self.total.fetch_sub(1, Ordering::SeqCst);
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Acquire a resource, creating one if under capacity, waiting
    /// `wait_timeout` for a release otherwise.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledGuard<R>> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::PoolClosed);
            }

            if let Some(entry) = self.idle.lock().ok().and_then(|mut q| q.pop_front()) {
                if self.expired(&entry) {
                    self.destroy(entry);
                    continue;
                }
                if !self.healthy(&entry.resource) {
                    self.stats.health_failures.fetch_add(1, Ordering::Relaxed);
                    self.destroy(entry);
                    continue;
                }
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                return Ok(PooledGuard {
                    pool: self.clone(),
                    entry: Some(entry),
                });
            }

            let reserved = self
                .total
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                    if t < self.config.max_conns {
                        Some(t + 1)
                    } else {
                        None
                    }
                })
                .is_ok();

            if reserved {
                return match (self.factory)() {
                    Ok(resource) => {
                        self.stats.created.fetch_add(1, Ordering::Relaxed);
                        let now = Instant::now();
                        Ok(PooledGuard {
                            pool: self.clone(),
                            entry: Some(Entry {
                                resource,
                                created_at: now,
                                last_used_at: now,
                            }),
                        })
                    }
                    Err(e) => {
                        self.total.fetch_sub(1, Ordering::SeqCst);
                        Err(e)
                    }
                };
            }

            let (tx, rx) = sync_channel::<Option<Entry<R>>>(1);
            #[allow(clippy::unwrap_used)]
            self.waiters.lock().unwrap().push_back(tx);
            self.stats.wait_count.fetch_add(1, Ordering::Relaxed);

            match rx.recv_timeout(self.config.wait_timeout) {
                Ok(Some(entry)) => {
                    return Ok(PooledGuard {
                        pool: self.clone(),
                        entry: Some(entry),
                    })
                }
                Ok(None) => return Err(Error::PoolClosed),
                Err(RecvTimeoutError::Timeout) => {
                    self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(Error::Timeout("pool acquire timed out".into()));
                }
                Err(RecvTimeoutError::Disconnected) => continue,
            }
        }
    }

    fn release(&self, mut entry: Entry<R>) {
        if self.closed.load(Ordering::SeqCst) {
            self.destroy(entry);
            return;
        }
        loop {
            #[allow(clippy::unwrap_used)]
            let next_waiter = self.waiters.lock().unwrap().pop_front();
            let Some(waiter) = next_waiter else { break };
            match waiter.try_send(Some(entry)) {
                Ok(()) => return,
                Err(TrySendError::Disconnected(Some(back))) | Err(TrySendError::Full(Some(back))) => {
                    entry = back;
                    continue;
                }
                _ => return,
            }
        }
        entry.last_used_at = Instant::now();
        #[allow(clippy::unwrap_used)]
        self.idle.lock().unwrap().push_back(entry);
    }

    /// Scan idle resources once, destroying those past `max_idle_time` or
    /// `max_lifetime`. Intended to be called periodically by
    /// [`Pool::spawn_maintenance`] or directly in tests.
    pub fn maintain(&self) {
        #[allow(clippy::unwrap_used)]
        let mut idle = self.idle.lock().unwrap();
        let mut kept = VecDeque::with_capacity(idle.len());
        while let Some(entry) = idle.pop_front() {
            if self.expired(&entry) {
                drop(idle);
                self.destroy(entry);
                #[allow(clippy::unwrap_used)]
                {
                    idle = self.idle.lock().unwrap();
                }
            } else {
                kept.push_back(entry);
            }
        }
        *idle = kept;
    }

    /// Spawn a background thread that calls [`Pool::maintain`] on a fixed
    /// interval until the pool closes.
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        let pool = self.clone();
        let interval = self.config.maintenance_interval;
        let handle = std::thread::spawn(move || {
            while !pool.closed.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                pool.maintain();
            }
        });
        MaintenanceHandle { handle }
    }

    /// Stop accepting new resources, destroy all idle resources, and wake
    /// every waiter with a closed error. In-flight guards still release
    /// normally but are destroyed rather than recycled.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        let mut idle = self.idle.lock().unwrap();
        while let Some(entry) = idle.pop_front() {
            if let Some(on_close) = &self.on_close {
                on_close(&entry.resource);
            }
            self.total.fetch_sub(1, Ordering::SeqCst);
            self.stats.closed.fetch_add(1, Ordering::Relaxed);
        }
        drop(idle);
        #[allow(clippy::unwrap_used)]
        let mut waiters = self.waiters.lock().unwrap();
        while let Some(w) = waiters.pop_front() {
            let _ = w.try_send(None);
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStatsSnapshot {
        #[allow(clippy::unwrap_used)]
        let idle = self.idle.lock().unwrap().len();
        let total = self.total.load(Ordering::SeqCst);
        PoolStatsSnapshot {
            created: self.stats.created.load(Ordering::Relaxed),
            closed: self.stats.closed.load(Ordering::Relaxed),
            reused: self.stats.reused.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            health_failures: self.stats.health_failures.load(Ordering::Relaxed),
            wait_count: self.stats.wait_count.load(Ordering::Relaxed),
            idle,
            active: total.saturating_sub(idle),
        }
    }
}

/// Handle to a pool's background maintenance thread.
pub struct MaintenanceHandle {
    handle: JoinHandle<()>,
}

impl MaintenanceHandle {
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counting_pool(max: usize) -> (Arc<Pool<i32>>, Arc<AtomicI32>) {
        let counter = Arc::new(AtomicI32::new(0));
        let c = counter.clone();
        let cfg = PoolConfig {
            max_conns: max,
            wait_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let pool = Pool::new(cfg, move || {
            Ok(c.fetch_add(1, Ordering::SeqCst))
        });
        (pool, counter)
    }

    #[test]
    fn acquire_creates_up_to_max_then_waits() {
        let (pool, _counter) = counting_pool(1);
        let g1 = pool.acquire().unwrap();
        let err = pool.acquire();
        assert!(matches!(err, Err(Error::Timeout(_))));
        drop(g1);
        let g2 = pool.acquire();
        assert!(g2.is_ok());
    }

    #[test]
    fn release_hands_directly_to_waiter() {
        let (pool, _counter) = counting_pool(1);
        let g1 = pool.acquire().unwrap();
        let pool2 = pool.clone();
        let waiter = std::thread::spawn(move || pool2.acquire());
        std::thread::sleep(Duration::from_millis(20));
        drop(g1);
        let got = waiter.join().unwrap();
        assert!(got.is_ok());
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn acquire_after_close_fails() {
        let (pool, _counter) = counting_pool(2);
        pool.close();
        assert!(matches!(pool.acquire(), Err(Error::PoolClosed)));
    }

    #[test]
    fn unhealthy_resources_are_destroyed_on_acquire() {
        let cfg = PoolConfig {
            max_conns: 2,
            ..Default::default()
        };
        let pool = Pool::new(cfg, || Ok(1)).with_health_check(|_r| false);
        let g = pool.acquire().unwrap();
        drop(g);
        let stats_before = pool.stats();
        assert_eq!(stats_before.idle, 1);
        let g2 = pool.acquire().unwrap();
        drop(g2);
        assert_eq!(pool.stats().health_failures, 1);
    }

    #[test]
    fn maintain_expires_idle_past_max_idle_time() {
        let cfg = PoolConfig {
            max_conns: 2,
            max_idle_time: Duration::from_millis(10),
            ..Default::default()
        };
        let pool = Pool::new(cfg, || Ok(1));
        let g = pool.acquire().unwrap();
        drop(g);
        assert_eq!(pool.stats().idle, 1);
        std::thread::sleep(Duration::from_millis(30));
        pool.maintain();
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn stats_count_created_and_reused() {
        let (pool, _counter) = counting_pool(2);
        let g1 = pool.acquire().unwrap();
        drop(g1);
        let g2 = pool.acquire().unwrap();
        drop(g2);
        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
    }

    #[test]
    fn min_conns_are_prewarmed_at_construction() {
        let counter = Arc::new(AtomicI32::new(0));
        let c = counter.clone();
        let cfg = PoolConfig {
            max_conns: 5,
            min_conns: 3,
            ..Default::default()
        };
        let pool = Pool::new(cfg, move || Ok(c.fetch_add(1, Ordering::SeqCst)));
        let stats = pool.stats();
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.created, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn min_conns_is_clamped_to_max_conns() {
        let cfg = PoolConfig {
            max_conns: 2,
            min_conns: 10,
            ..Default::default()
        };
        let pool = Pool::new(cfg, || Ok(1));
        assert_eq!(pool.stats().idle, 2);
    }
}
