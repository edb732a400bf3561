//! Circular focus over a changing item list, with an optional self-advancing timer.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    runtime::{Handle, TryCurrentError},
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

const EVENT_CAPACITY: usize = 64;
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CarouselError {
    #[error("carousel index {index} out of range for {len} items")]
    OutOfRange { index: usize, len: usize },
    #[error("auto-advance interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselPhase {
    Idle,
    Active { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceCause {
    Manual,
    Auto,
    Clamped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarouselEvent {
    pub index: usize,
    pub cause: AdvanceCause,
}

pub type Tick = Arc<dyn Fn() + Send + Sync>;

/// Repeating-callback capability supplied by the host environment.
pub trait TickerHost: Send + Sync {
    /// Calls `tick` every `interval`, first after one full interval, until the
    /// returned handle is cancelled.
    fn schedule_repeating(&self, interval: Duration, tick: Tick) -> Box<dyn TickerHandle>;
}

pub trait TickerHandle: Send {
    fn cancel(&self);
}

/// Runs ticks on a tokio runtime.
#[derive(Clone)]
pub struct TokioTicker {
    runtime: Handle,
}

impl TokioTicker {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    pub fn current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl TickerHost for TokioTicker {
    fn schedule_repeating(&self, interval: Duration, tick: Tick) -> Box<dyn TickerHandle> {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let task = self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                tick();
            }
        });
        Box::new(TokioTickerHandle(task))
    }
}

struct TokioTickerHandle(JoinHandle<()>);

impl TickerHandle for TokioTickerHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}

/// Ticker driven by explicit calls to [`ManualTicker::advance`], for hosts that
/// run their own frame loop and for deterministic tests.
#[derive(Clone, Default)]
pub struct ManualTicker {
    inner: Arc<Mutex<ManualTickerState>>,
}

#[derive(Default)]
struct ManualTickerState {
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

struct ManualTimer {
    id: u64,
    interval: Duration,
    due: Duration,
    tick: Tick,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`, firing every tick that falls due, in
    /// deadline order.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.inner).now + by;
        loop {
            let tick = {
                let mut guard = lock(&self.inner);
                let state = &mut *guard;
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by_key(|(_, timer)| (timer.due, timer.id))
                    .map(|(pos, _)| pos);
                let Some(pos) = next else {
                    state.now = target;
                    break;
                };
                let timer = &mut state.timers[pos];
                let due = timer.due;
                timer.due += timer.interval;
                let tick = Arc::clone(&timer.tick);
                state.now = due;
                tick
            };
            tick();
        }
    }

    pub fn armed(&self) -> usize {
        lock(&self.inner).timers.len()
    }
}

impl TickerHost for ManualTicker {
    fn schedule_repeating(&self, interval: Duration, tick: Tick) -> Box<dyn TickerHandle> {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let mut state = lock(&self.inner);
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + interval;
        state.timers.push(ManualTimer {
            id,
            interval,
            due,
            tick,
        });
        Box::new(ManualTickerHandle {
            id,
            ticker: Arc::downgrade(&self.inner),
        })
    }
}

struct ManualTickerHandle {
    id: u64,
    ticker: Weak<Mutex<ManualTickerState>>,
}

impl TickerHandle for ManualTickerHandle {
    fn cancel(&self) {
        if let Some(ticker) = self.ticker.upgrade() {
            lock(&ticker).timers.retain(|timer| timer.id != self.id);
        }
    }
}

struct CarouselState<T> {
    items: Arc<[T]>,
    index: usize,
    // Bumped on every arm/disarm; ticks from an older generation are dropped.
    generation: u64,
}

impl<T> CarouselState<T> {
    fn step(&mut self, forward: bool) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
        Some(self.index)
    }
}

struct AutoAdvance {
    interval: Duration,
    handle: Box<dyn TickerHandle>,
}

static NEXT_CAROUSEL_ID: AtomicU64 = AtomicU64::new(1);

pub struct CarouselController<T> {
    id: u64,
    shared: Arc<Mutex<CarouselState<T>>>,
    events: broadcast::Sender<CarouselEvent>,
    ticker: Arc<dyn TickerHost>,
    auto: Option<AutoAdvance>,
}

impl<T> CarouselController<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(ticker: Arc<dyn TickerHost>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: NEXT_CAROUSEL_ID.fetch_add(1, Ordering::Relaxed),
            shared: Arc::new(Mutex::new(CarouselState {
                items: Arc::from(Vec::<T>::new()),
                index: 0,
                generation: 0,
            })),
            events,
            ticker,
            auto: None,
        }
    }

    /// Replaces the item snapshot, clamping the active index if the list shrank.
    pub fn set_items(&mut self, items: impl Into<Arc<[T]>>) {
        let items = items.into();
        let clamped = {
            let mut state = lock(&self.shared);
            let previous = state.index;
            state.items = items;
            state.index = previous.min(state.items.len().saturating_sub(1));
            (!state.items.is_empty() && state.index != previous).then_some(state.index)
        };
        debug!("carousel: items replaced id={} len={}", self.id, self.len());
        if let Some(index) = clamped {
            self.emit(index, AdvanceCause::Clamped);
        }
    }

    pub fn phase(&self) -> CarouselPhase {
        let state = lock(&self.shared);
        if state.items.is_empty() {
            CarouselPhase::Idle
        } else {
            CarouselPhase::Active { index: state.index }
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self.phase() {
            CarouselPhase::Idle => None,
            CarouselPhase::Active { index } => Some(index),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.shared).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> Arc<[T]> {
        Arc::clone(&lock(&self.shared).items)
    }

    pub fn next(&mut self) -> Option<usize> {
        self.navigate(true)
    }

    pub fn previous(&mut self) -> Option<usize> {
        self.navigate(false)
    }

    pub fn jump_to(&mut self, index: usize) -> Result<usize, CarouselError> {
        {
            let mut state = lock(&self.shared);
            let len = state.items.len();
            if index >= len {
                return Err(CarouselError::OutOfRange { index, len });
            }
            state.index = index;
        }
        self.rearm();
        self.emit(index, AdvanceCause::Manual);
        Ok(index)
    }

    pub fn start_auto_advance(&mut self, interval: Duration) -> Result<(), CarouselError> {
        if interval.is_zero() {
            return Err(CarouselError::ZeroInterval);
        }
        self.cancel_timer();
        self.arm(interval);
        debug!(
            "carousel: auto-advance armed id={} interval_ms={}",
            self.id,
            interval.as_millis()
        );
        Ok(())
    }

    pub fn stop_auto_advance(&mut self) {
        if self.cancel_timer() {
            debug!("carousel: auto-advance stopped id={}", self.id);
        }
    }

    pub fn is_auto_advancing(&self) -> bool {
        self.auto.is_some()
    }

    pub fn auto_advance_interval(&self) -> Option<Duration> {
        self.auto.as_ref().map(|auto| auto.interval)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CarouselEvent> {
        self.events.subscribe()
    }

    fn navigate(&mut self, forward: bool) -> Option<usize> {
        let index = lock(&self.shared).step(forward)?;
        self.rearm();
        self.emit(index, AdvanceCause::Manual);
        Some(index)
    }

    fn arm(&mut self, interval: Duration) {
        let generation = {
            let mut state = lock(&self.shared);
            state.generation += 1;
            state.generation
        };
        let shared = Arc::downgrade(&self.shared);
        let events = self.events.clone();
        let tick: Tick = Arc::new(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let advanced = {
                let mut state = lock(&shared);
                if state.generation != generation {
                    return;
                }
                state.step(true)
            };
            if let Some(index) = advanced {
                let _ = events.send(CarouselEvent {
                    index,
                    cause: AdvanceCause::Auto,
                });
            }
        });
        let handle = self.ticker.schedule_repeating(interval, tick);
        self.auto = Some(AutoAdvance { interval, handle });
    }

    // Manual navigation defers the next automatic tick by a full interval.
    fn rearm(&mut self) {
        if let Some(interval) = self.auto_advance_interval() {
            self.cancel_timer();
            self.arm(interval);
        }
    }

    fn emit(&self, index: usize, cause: AdvanceCause) {
        let _ = self.events.send(CarouselEvent { index, cause });
    }
}

impl<T: Clone + Send + Sync + 'static> CarouselController<T> {
    pub fn active(&self) -> Option<T> {
        self.relative(0)
    }

    /// Item `distance` steps away from the active one, wrapping in both directions.
    pub fn relative(&self, distance: isize) -> Option<T> {
        let state = lock(&self.shared);
        let len = state.items.len();
        if len == 0 {
            return None;
        }
        let offset = distance.rem_euclid(len as isize) as usize;
        state.items.get((state.index + offset) % len).cloned()
    }

    /// `(offset, item)` pairs for every offset in `-radius..=radius`.
    pub fn window(&self, radius: usize) -> Vec<(isize, T)> {
        let radius = radius as isize;
        (-radius..=radius)
            .filter_map(|offset| self.relative(offset).map(|item| (offset, item)))
            .collect()
    }
}

impl<T> CarouselController<T> {
    fn cancel_timer(&mut self) -> bool {
        let Some(auto) = self.auto.take() else {
            return false;
        };
        lock(&self.shared).generation += 1;
        auto.handle.cancel();
        true
    }
}

impl<T> Drop for CarouselController<T> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/carousel_tests.rs"]
mod tests;
