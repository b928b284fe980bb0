//! Advisory, name-scoped locks serializing mutations of a single project
//!
//! The lock manager is an explicit component with a lifecycle: construct it
//! with [`LockManager::new`], optionally start the expiry sweep with
//! [`LockManager::start_sweeper`], and tear it down with
//! [`LockManager::shutdown`]. Locks are advisory and coordinate callers inside
//! one process; a distributed implementation can be swapped in behind the
//! [`ProjectLocker`] trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of acquisition attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default fixed delay between acquisition attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Default age after which a held lock is considered abandoned
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default period of the expiry sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Lock errors for project lock operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error(
        "Could not acquire lock '{name}' after {attempts} attempts; another operation is in progress, try again"
    )]
    AcquisitionFailed { name: String, attempts: u32 },

    #[error("Lock manager has been shut down; lock '{name}' cannot be acquired")]
    ShutDown { name: String },
}

/// Retry and expiry settings for a [`LockManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Name of the lock guarding a project's phase state.
#[must_use]
pub fn project_lock_name(project_id: &str) -> String {
    format!("project:{project_id}")
}

/// Hash a lock name to its 64-bit key (first 8 bytes of BLAKE3).
#[must_use]
pub fn lock_key(name: &str) -> u64 {
    let hash = blake3::hash(name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_be_bytes(prefix)
}

/// Held lock. Releases on drop.
///
/// A holder that outlives the TTL can be taken over; [`LockGuard::is_held`]
/// reports whether this guard is still the holder, so callers can fence
/// their final write.
pub struct LockGuard {
    name: String,
    key: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
    holder_check: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl LockGuard {
    /// Build a guard for a custom [`ProjectLocker`]; `release` runs once on drop.
    pub fn new(name: impl Into<String>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        let name = name.into();
        Self {
            key: lock_key(&name),
            name,
            release: Some(Box::new(release)),
            holder_check: None,
        }
    }

    /// Attach the check behind [`LockGuard::is_held`].
    #[must_use]
    pub fn with_holder_check(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.holder_check = Some(Box::new(check));
        self
    }

    /// Whether this guard still owns its lock.
    ///
    /// False once another caller took the lock over after expiry, or the
    /// sweeper removed it. Guards without a check always report true.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.holder_check.as_ref().is_none_or(|check| check())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn key(&self) -> u64 {
        self.key
    }

    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("name", &self.name)
            .field("key", &format_args!("{:016x}", self.key))
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Seam for whatever serializes project mutations.
#[async_trait]
pub trait ProjectLocker: Send + Sync {
    /// Acquire the lock for one project, waiting within the retry budget.
    async fn lock_project(&self, project_id: &str) -> Result<LockGuard, LockError>;
}

#[derive(Debug)]
struct Holder {
    name: String,
    token: u64,
    acquired_at: Instant,
}

#[derive(Debug)]
struct Inner {
    settings: LockSettings,
    held: Mutex<HashMap<u64, Holder>>,
    next_token: AtomicU64,
    shut_down: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn held(&self) -> MutexGuard<'_, HashMap<u64, Holder>> {
        // A poisoned map only means a holder panicked mid-insert; the data is still usable.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_acquire(&self, name: &str, key: u64) -> Option<u64> {
        let mut held = self.held();
        if let Some(existing) = held.get(&key) {
            if existing.acquired_at.elapsed() < self.settings.ttl {
                return None;
            }
            warn!(
                lock = %existing.name,
                held_for_ms = existing.acquired_at.elapsed().as_millis() as u64,
                "Taking over expired lock"
            );
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        held.insert(
            key,
            Holder {
                name: name.to_string(),
                token,
                acquired_at: Instant::now(),
            },
        );
        Some(token)
    }

    fn holds(&self, key: u64, token: u64) -> bool {
        self.held().get(&key).is_some_and(|h| h.token == token)
    }

    fn release(&self, key: u64, token: u64) {
        let mut held = self.held();
        // A guard whose lock was taken over after expiry must not release the new holder.
        if held.get(&key).is_some_and(|h| h.token == token) {
            held.remove(&key);
        }
    }

    fn sweep_expired(&self) -> usize {
        let ttl = self.settings.ttl;
        let mut held = self.held();
        let before = held.len();
        held.retain(|_, h| h.acquired_at.elapsed() < ttl);
        before - held.len()
    }
}

/// In-process advisory lock manager.
///
/// Cloning is cheap; clones share the same lock table.
#[derive(Debug, Clone)]
pub struct LockManager {
    inner: Arc<Inner>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockSettings::default())
    }
}

impl LockManager {
    #[must_use]
    pub fn new(settings: LockSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                held: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
                sweeper: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &LockSettings {
        &self.inner.settings
    }

    /// Acquire `name`, retrying with a fixed backoff up to `max_attempts` times.
    ///
    /// # Errors
    ///
    /// [`LockError::AcquisitionFailed`] once every attempt found the lock held,
    /// [`LockError::ShutDown`] after [`LockManager::shutdown`].
    pub async fn acquire(&self, name: &str) -> Result<LockGuard, LockError> {
        let key = lock_key(name);
        let attempts = self.inner.settings.max_attempts.max(1);

        for attempt in 1..=attempts {
            if self.inner.shut_down.load(Ordering::Acquire) {
                return Err(LockError::ShutDown {
                    name: name.to_string(),
                });
            }
            if let Some(token) = self.inner.try_acquire(name, key) {
                debug!(lock = %name, attempt, "Lock acquired");
                let inner = Arc::downgrade(&self.inner);
                let table = inner.clone();
                let guard = LockGuard::new(name, move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.release(key, token);
                    }
                })
                .with_holder_check(move || table.upgrade().is_some_and(|i| i.holds(key, token)));
                return Ok(guard);
            }
            if attempt < attempts {
                debug!(lock = %name, attempt, "Lock busy, retrying");
                tokio::time::sleep(self.inner.settings.backoff).await;
            }
        }

        warn!(lock = %name, attempts, "Lock acquisition failed");
        Err(LockError::AcquisitionFailed {
            name: name.to_string(),
            attempts,
        })
    }

    /// Whether `name` is currently held by an unexpired holder.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        let ttl = self.inner.settings.ttl;
        self.inner
            .held()
            .get(&lock_key(name))
            .is_some_and(|h| h.acquired_at.elapsed() < ttl)
    }

    /// Number of entries in the lock table, expired ones included.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.inner.held().len()
    }

    /// Drop expired entries now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Start the periodic expiry sweep on the current tokio runtime.
    ///
    /// Calling it again while a sweep is running does nothing.
    pub fn start_sweeper(&self) {
        let mut slot = self.inner.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.settings.sweep_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.shut_down.load(Ordering::Acquire) {
                    break;
                }
                let removed = inner.sweep_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired locks");
                }
            }
        }));
    }

    /// Whether the sweep task is running.
    #[must_use]
    pub fn sweeper_running(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the sweep and clear every held lock. Later acquisitions fail.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        if let Some(handle) = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.inner.held().clear();
    }
}

#[async_trait]
impl ProjectLocker for LockManager {
    async fn lock_project(&self, project_id: &str) -> Result<LockGuard, LockError> {
        self.acquire(&project_lock_name(project_id)).await
    }
}
