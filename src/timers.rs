//! Named, cancelable timers on a caller-driven clock.
//!
//! Nothing here sleeps or spawns. The host passes the current time (any
//! monotonic origin) into the state machine, which asks the coordinator for
//! the timers that fell due. At most one timer per [`TimerKind`] exists:
//! scheduling a kind again supersedes the pending one.
//!
//! # Invariants
//!
//! 1. Due timers pop in order of due time; ties resolve in `TimerKind` order.
//! 2. A periodic timer is re-armed relative to its previous due time, so a
//!    late `advance` fires each missed period once, in order.
//! 3. A cancelled timer never fires.

use std::collections::BTreeMap;
use std::time::Duration;

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Hover delay before a preview starts loading.
    Preview,
    /// Debounce before a resolve is dispatched.
    Resolver,
    /// Delay before the loading indicator appears.
    DelayedLoader,
    /// End of the hide animation.
    AnimEnd,
    /// Periodic poll for media dimensions becoming available.
    ContentReady,
    /// Periodic natural-size probe for SVG media.
    SvgProbe,
    /// Hides the cursor after the pointer rests over the popup.
    IdleCursor,
    /// Blinks an album caption.
    CaptionFlash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    due: Duration,
    period: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct TimerCoordinator {
    armed: BTreeMap<TimerKind, Armed>,
}

impl TimerCoordinator {
    pub fn new() -> Self {
        TimerCoordinator::default()
    }

    /// Arms a one-shot timer firing `delay` after `now`.
    pub fn schedule(&mut self, kind: TimerKind, now: Duration, delay: Duration) {
        self.arm(kind, Armed { due: now + delay, period: None });
    }

    /// Arms a periodic timer, first firing one `period` after `now`.
    pub fn schedule_every(&mut self, kind: TimerKind, now: Duration, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        self.arm(kind, Armed { due: now + period, period: Some(period) });
    }

    fn arm(&mut self, kind: TimerKind, timer: Armed) {
        if self.armed.insert(kind, timer).is_some() {
            tracing::trace!(?kind, "timer superseded");
        }
    }

    /// Returns `true` when a pending timer was cancelled.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.armed.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    pub fn due_at(&self, kind: TimerKind) -> Option<Duration> {
        self.armed.get(&kind).map(|t| t.due)
    }

    /// Earliest due time of any pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.armed.values().map(|t| t.due).min()
    }

    /// Pops the earliest timer due at or before `now`, with its due time.
    ///
    /// One-shot timers are removed; periodic ones are re-armed.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerKind, Duration)> {
        let (kind, timer) = self
            .armed
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(kind, t)| (t.due, **kind))
            .map(|(k, t)| (*k, *t))?;
        match timer.period {
            Some(period) => {
                self.armed.insert(kind, Armed { due: timer.due + period, period: Some(period) });
            }
            None => {
                self.armed.remove(&kind);
            }
        }
        Some((kind, timer.due))
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
