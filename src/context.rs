use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Trait for providing the current time.
/// Decouples risk accounting and request timestamps from `Utc::now()`
/// so day rollovers and cooldowns can be driven deterministically.
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;
    fn now(&self) -> DateTime<Utc>;
}

/// Context holding the providers.
/// Passed down to the risk gate and executors.
#[derive(Clone)]
pub struct ExecutionContext {
    pub time: Arc<dyn TimeProvider>,
}

impl ExecutionContext {
    pub fn new_system() -> Self {
        Self {
            time: Arc::new(SystemTimeProvider),
        }
    }

    pub fn new_simulated(start_time_ms: i64) -> (Self, Arc<SimulatedTimeProvider>) {
        let clock = Arc::new(SimulatedTimeProvider::new(start_time_ms));
        let ctx = Self {
            time: clock.clone(),
        };
        (ctx, clock)
    }
}

// --- Live Implementation ---

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// --- Simulated Implementation ---

pub struct SimulatedTimeProvider {
    current_time_ms: AtomicI64,
}

impl SimulatedTimeProvider {
    pub fn new(start_time_ms: i64) -> Self {
        Self {
            current_time_ms: AtomicI64::new(start_time_ms),
        }
    }

    pub fn set_time(&self, time_ms: i64) {
        self.current_time_ms.store(time_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, duration_ms: i64) {
        self.current_time_ms.fetch_add(duration_ms, Ordering::SeqCst);
    }
}

impl TimeProvider for SimulatedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }

    fn now(&self) -> DateTime<Utc> {
        // Out-of-range instants clamp to the epoch rather than panic.
        Utc.timestamp_millis_opt(self.now_millis())
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
