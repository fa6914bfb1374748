//! The accumulation strategy: per-owner running totals of exclusive zone
//! time, folded in at zone end.
//!
//! Each execution context keeps its own stack of zone frames; only the top
//! frame accumulates. Entering a child pauses the parent, leaving the child
//! folds its total into the process-wide table and resumes the parent. That
//! makes every owner's total "self time", so totals are additive across
//! owners.

use std::cell::RefCell;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use strum::EnumCount;

use crate::owner::Owner;
use crate::zone::CodeLocation;
use crate::zone::TimingBackend;

static TOTALS: [AtomicU64; Owner::COUNT] = [const { AtomicU64::new(0) }; Owner::COUNT];
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Total exclusive time folded into `owner`'s accumulator so far.
///
/// Cross-thread folds are relaxed atomic adds; a snapshot taken while other
/// threads are folding is approximate by design.
pub fn accumulated(owner: Owner) -> Duration {
    Duration::from_nanos(TOTALS[owner.index()].load(Ordering::Relaxed))
}

pub(crate) fn fold(owner: Owner, elapsed: Duration) {
    let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
    TOTALS[owner.index()].fetch_add(nanos, Ordering::Relaxed);
}

pub(crate) fn mark_epoch() {
    EPOCH.get_or_init(Instant::now);
}

pub(crate) fn elapsed_since_init() -> Option<Duration> {
    EPOCH.get().map(Instant::elapsed)
}

/// Counts sub-state of one active zone.
#[derive(Debug)]
struct ZoneFrame {
    owner: Owner,
    started_at: Instant,
    accumulated: Duration,
    #[cfg(debug_assertions)]
    running: bool,
}

impl ZoneFrame {
    fn start(owner: Owner, t: Instant) -> Self {
        Self {
            owner,
            started_at: t,
            accumulated: Duration::ZERO,
            #[cfg(debug_assertions)]
            running: true,
        }
    }

    /// Stop accumulating, either because a child zone takes over or because
    /// this zone is ending.
    fn pause(&mut self, t: Instant) {
        #[cfg(debug_assertions)]
        {
            assert!(self.running, "paused a zone frame that was not running");
            self.running = false;
        }
        self.accumulated += t.saturating_duration_since(self.started_at);
    }

    fn resume(&mut self, t: Instant) {
        #[cfg(debug_assertions)]
        {
            assert!(!self.running, "resumed a zone frame that was already running");
            self.running = true;
        }
        self.started_at = t;
    }

    fn finish(mut self, t: Instant) -> (Owner, Duration) {
        self.pause(t);
        (self.owner, self.accumulated)
    }
}

/// One execution context's stack of active zone frames. Touched only by the
/// context that owns it, so nothing here synchronizes.
#[derive(Debug, Default)]
struct ZoneStack {
    frames: Vec<ZoneFrame>,
}

impl ZoneStack {
    // Reserved up front so deeply nested zones rarely reallocate mid-zone.
    const INITIAL_CAPACITY: usize = 64;

    fn with_reserve() -> Self {
        Self {
            frames: Vec::with_capacity(Self::INITIAL_CAPACITY),
        }
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame for `owner`, pausing the parent. Returns the frame's
    /// depth, the token required to pop it.
    fn push(&mut self, owner: Owner, t: Instant) -> usize {
        if let Some(parent) = self.frames.last_mut() {
            parent.pause(t);
        }
        self.frames.push(ZoneFrame::start(owner, t));
        self.frames.len() - 1
    }

    /// Pop the frame identified by `token`, resuming the parent.
    ///
    /// `token` must identify the current top; release builds pop the actual
    /// top without checking.
    fn pop(&mut self, token: usize, t: Instant) -> Option<(Owner, Duration)> {
        debug_assert_eq!(
            token + 1,
            self.frames.len(),
            "zone frames must be popped in stack order",
        );
        let finished = self.frames.pop()?.finish(t);
        if let Some(parent) = self.frames.last_mut() {
            parent.resume(t);
        }
        Some(finished)
    }
}

thread_local! {
    static ZONE_STACK: RefCell<ZoneStack> = RefCell::new(ZoneStack::with_reserve());
}

/// Number of zones currently open in this execution context.
pub fn zone_depth() -> usize {
    ZONE_STACK.with_borrow(ZoneStack::depth)
}

/// The accumulation strategy. Maintains the zone stack and the totals table.
#[derive(Debug)]
pub(crate) struct CountsBackend;

impl TimingBackend for CountsBackend {
    type ZoneState = usize;

    fn zone_begin(owner: Owner, _event: &'static str, _location: CodeLocation) -> usize {
        let t = Instant::now();
        ZONE_STACK.with_borrow_mut(|stack| stack.push(owner, t))
    }

    fn zone_end(token: usize) {
        let t = Instant::now();
        let finished = ZONE_STACK.with_borrow_mut(|stack| stack.pop(token, t));
        if let Some((owner, total)) = finished {
            fold(owner, total);
        }
    }

    fn zone_text(_state: &usize, _text: &str) {}

    fn wants_text(_state: &usize) -> bool {
        false
    }
}

/// A context's zone stack, detached so a scheduler can carry its open zones
/// to another carrier thread.
///
/// Open zones keep accumulating wall time while detached; detaching marks a
/// task switch, not a pause.
#[derive(Debug, Default)]
pub struct TaskZoneStack(ZoneStack);

impl TaskZoneStack {
    /// Take the current thread's zone stack, leaving an empty, pre-reserved
    /// one behind.
    #[must_use = "dropping a detached stack abandons its open zones"]
    pub fn detach() -> Self {
        Self(ZONE_STACK.replace(ZoneStack::with_reserve()))
    }

    /// Install this stack on the current thread.
    ///
    /// The thread's own stack must be empty: a scheduler detaches the
    /// previous task before attaching the next one.
    pub fn attach(self) {
        ZONE_STACK.with_borrow_mut(|stack| {
            debug_assert_eq!(0, stack.depth(), "attaching would bury open zones");
            *stack = self.0;
        });
    }
}
