use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    time::Duration,
};

use crate::core::PieceId;

/// Cancellation handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("timer#{_0}")]
pub struct TimerToken(u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum TimerKind {
    /// Move the piece one cell along the gravity vector.
    Gravity,
    /// Freeze countdown elapsed; lock the piece in.
    Freeze,
    /// Fade-out of a discarded piece finished.
    DiscardFade,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub token: TimerToken,
    pub piece: PieceId,
    pub kind: TimerKind,
    pub due: Duration,
}

/// Scheduled events on a simulated clock.
///
/// Timers never fire on their own: the owner pops due events one at a time
/// with [`Timers::pop_due`], which keeps every transition on a single
/// timeline. Events due at the same instant fire in scheduling order, and a
/// cancelled timer is never returned.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use blockfall_engine::{PieceId, TimerKind, Timers};
///
/// let mut timers = Timers::new();
/// let gravity = timers.schedule(PieceId(0), TimerKind::Gravity, Duration::from_millis(500));
/// let freeze = timers.schedule(PieceId(0), TimerKind::Freeze, Duration::from_millis(300));
/// assert!(timers.cancel(freeze));
///
/// let event = timers.pop_due(Duration::from_secs(1)).unwrap();
/// assert_eq!(event.token, gravity);
/// assert_eq!(timers.now(), Duration::from_millis(500));
/// assert!(timers.pop_due(Duration::from_secs(1)).is_none());
/// ```
#[derive(Debug, Default)]
pub struct Timers {
    now: Duration,
    next_token: u64,
    queue: BinaryHeap<Reverse<(Duration, TimerToken)>>,
    pending: HashMap<TimerToken, TimerEvent>,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, piece: PieceId, kind: TimerKind, after: Duration) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        let due = self.now.saturating_add(after);
        self.queue.push(Reverse((due, token)));
        self.pending.insert(
            token,
            TimerEvent {
                token,
                piece,
                kind,
                due,
            },
        );
        token
    }

    /// Cancels a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.pending.remove(&token).is_some()
    }

    #[must_use]
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.contains_key(&token)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn pending_for(&self, piece: PieceId) -> usize {
        self.pending.values().filter(|e| e.piece == piece).count()
    }

    /// Returns the due time of the earliest pending timer.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.values().map(|e| e.due).min()
    }

    /// Pops the earliest pending timer due at or before `until`, moving the
    /// clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerEvent> {
        while let Some(&Reverse((due, token))) = self.queue.peek() {
            if !self.pending.contains_key(&token) {
                self.queue.pop();
                continue;
            }
            if due > until {
                return None;
            }
            self.queue.pop();
            self.now = self.now.max(due);
            return self.pending.remove(&token);
        }
        None
    }

    /// Moves the clock forward to `until` without firing anything.
    pub fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
