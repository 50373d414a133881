use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Lifecycle of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Complete,
    /// Last chunk write failed; resubmitting the chunk revives the transfer.
    Failed,
}

/// Per-transfer bookkeeping.
#[derive(Debug)]
pub struct TransferState {
    id: String,
    working_path: PathBuf,
    bytes_written: u64,
    declared_length: u64,
    status: TransferStatus,
    seeded: bool,
    last_activity: Instant,
}

impl TransferState {
    fn new(id: String, working_path: PathBuf) -> Self {
        Self {
            id,
            working_path,
            bytes_written: 0,
            declared_length: 0,
            status: TransferStatus::InProgress,
            seeded: false,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Working file path, fixed when the transfer was first seen.
    pub fn working_path(&self) -> &PathBuf {
        &self.working_path
    }

    /// Contiguous bytes persisted from offset 0.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn declared_length(&self) -> u64 {
        self.declared_length
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Returns `true` once the byte count has been seeded from disk.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Sets the starting byte count from an existing working file.
    pub fn seed(&mut self, persisted: u64) {
        self.bytes_written = persisted;
        self.seeded = true;
    }

    /// Records the client's declared total (last seen wins).
    pub fn declare_length(&mut self, total: u64) {
        self.declared_length = total;
        self.last_activity = Instant::now();
    }

    /// Advances the contiguous byte count after a successful write ending at `end`.
    pub fn record_write(&mut self, end: u64) {
        self.bytes_written = self.bytes_written.max(end);
        self.status = TransferStatus::InProgress;
        self.last_activity = Instant::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = TransferStatus::Failed;
        self.last_activity = Instant::now();
    }

    pub fn mark_complete(&mut self) {
        self.status = TransferStatus::Complete;
        self.last_activity = Instant::now();
    }

    /// Completion test: a chunk ending at `end` completes the payload.
    pub fn completes_with(&self, end: u64) -> bool {
        end >= self.declared_length
    }

    fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Result of looking up a transfer id.
pub enum Lookup {
    /// Live record; lock it before touching the working file.
    Active(Arc<tokio::sync::Mutex<TransferState>>),
    /// The id already finished; further chunks are a protocol error.
    Completed,
}

/// Finished ids remembered at most, oldest forgotten first.
pub const DEFAULT_TOMBSTONE_LIMIT: usize = 10_000;

/// Tracks in-flight transfers (thread-safe).
///
/// The map itself sits behind a short synchronous lock; each transfer has
/// its own async mutex held for the whole write-then-advance step, so two
/// chunks for one id never race while different ids never wait on each
/// other.
pub struct TransferTracker {
    inner: Mutex<TrackerInner>,
    tombstone_limit: usize,
}

#[derive(Default)]
struct TrackerInner {
    active: HashMap<String, Arc<tokio::sync::Mutex<TransferState>>>,
    completed: HashMap<String, Instant>,
    /// Completion order; entries no longer matching `completed` are skipped.
    completed_order: VecDeque<(String, Instant)>,
}

impl TrackerInner {
    fn remember_completed(&mut self, id: &str, limit: usize) {
        let now = Instant::now();
        self.completed.insert(id.to_string(), now);
        self.completed_order.push_back((id.to_string(), now));

        while self.completed.len() > limit {
            let Some((oldest, at)) = self.completed_order.pop_front() else {
                break;
            };
            if self.completed.get(&oldest) == Some(&at) {
                self.completed.remove(&oldest);
            }
        }
    }
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::with_tombstone_limit(DEFAULT_TOMBSTONE_LIMIT)
    }
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker remembering at most `limit` finished ids.
    pub fn with_tombstone_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner::default()),
            tombstone_limit: limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `id`, creating it on first contact.
    ///
    /// `working_path` is only called when the record is created, so the
    /// path stays fixed for the life of the transfer.
    pub fn acquire(&self, id: &str, working_path: impl FnOnce() -> PathBuf) -> Lookup {
        let mut inner = self.lock();
        if inner.completed.contains_key(id) {
            return Lookup::Completed;
        }
        let state = inner
            .active
            .entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(TransferState::new(
                    id.to_string(),
                    working_path(),
                )))
            })
            .clone();
        Lookup::Active(state)
    }

    /// Returns the live record for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Arc<tokio::sync::Mutex<TransferState>>> {
        self.lock().active.get(id).cloned()
    }

    /// Returns `true` if `id` finished and is still remembered.
    pub fn is_completed(&self, id: &str) -> bool {
        self.lock().completed.contains_key(id)
    }

    /// Evicts a finished transfer and remembers its id.
    ///
    /// Only removes the map entry if it is still `state`.
    pub fn complete(&self, id: &str, state: &Arc<tokio::sync::Mutex<TransferState>>) {
        let mut inner = self.lock();
        if inner
            .active
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, state))
        {
            inner.active.remove(id);
        }
        inner.remember_completed(id, self.tombstone_limit);
    }

    /// Drops records idle for longer than `max_idle`.
    ///
    /// A record is busy, and kept, while anyone besides the map holds it:
    /// a caller between [`acquire`](Self::acquire) and `lock` must not see
    /// its record replaced. Returns the number of active records evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut inner = self.lock();
        let before = inner.active.len();
        inner.active.retain(|_, state| {
            if Arc::strong_count(state) > 1 {
                return true;
            }
            match state.try_lock() {
                Ok(s) => s.idle_for() < max_idle,
                Err(_) => true,
            }
        });
        let evicted = before - inner.active.len();

        let TrackerInner {
            completed,
            completed_order,
            ..
        } = &mut *inner;
        completed.retain(|_, finished| finished.elapsed() < max_idle);
        completed_order.retain(|(id, at)| completed.get(id) == Some(at));
        evicted
    }

    /// Number of finished ids still remembered.
    pub fn completed_len(&self) -> usize {
        self.lock().completed.len()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
