use std::{
    fmt,
    time::{Duration, Instant},
};

use ember_board::Color;

use crate::{INCREMENT_SHARE, MIN_THINK_FRACTION, MIN_THINK_TIME_MS, MOVES_TO_GO};

/// Clock state sent with a timed `go` command.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub struct ClockParams {
    /// Time White has left on the clock.
    pub w_time: Duration,

    /// Time Black has left on the clock.
    pub b_time: Duration,

    /// White's increment per move.
    pub w_inc: Duration,

    /// Black's increment per move.
    pub b_inc: Duration,
}

impl ClockParams {
    /// Remaining time and increment of `color`.
    pub fn for_side(&self, color: Color) -> (Duration, Duration) {
        match color {
            Color::White => (self.w_time, self.w_inc),
            Color::Black => (self.b_time, self.b_inc),
        }
    }
}

/// How long a single search may think for.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct SearchBudget(Duration);

impl SearchBudget {
    /// A budget of exactly `duration`.
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Computes the budget for a side with `remaining` time on its clock and `increment` per move.
    ///
    /// A fortieth of the remaining time is used, plus most of the increment unless the clock is
    /// nearly down to the increment. The result never drops below 50ms or a quarter of the
    /// remaining time, and is rounded up to whole milliseconds.
    ///
    /// # Example
    /// ```
    /// # use std::time::Duration;
    /// # use ember::search::SearchBudget;
    /// let budget = SearchBudget::from_clock(Duration::from_millis(60_000), Duration::ZERO);
    /// assert_eq!(budget.as_millis(), 15_000);
    /// ```
    pub fn from_clock(remaining: Duration, increment: Duration) -> Self {
        let remaining_ms = remaining.as_millis() as f64;
        let increment_ms = increment.as_millis() as f64;

        let mut slice = remaining_ms / MOVES_TO_GO;
        if remaining_ms > 2.0 * increment_ms {
            slice += INCREMENT_SHARE * increment_ms;
        }

        let floor = MIN_THINK_TIME_MS.max(MIN_THINK_FRACTION * remaining_ms);

        Self(Duration::from_millis(floor.max(slice).ceil() as u64))
    }

    /// Computes the budget for whichever side is `to_move`.
    pub fn for_side(clock: &ClockParams, to_move: Color) -> Self {
        let (remaining, increment) = clock.for_side(to_move);
        Self::from_clock(remaining, increment)
    }

    /// The budget as a [`Duration`].
    pub const fn duration(&self) -> Duration {
        self.0
    }

    /// The budget in whole milliseconds.
    pub fn as_millis(&self) -> u128 {
        self.0.as_millis()
    }
}

impl fmt::Display for SearchBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis())
    }
}

/// A monotonic stopwatch started when a search request arrives.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct SearchClock {
    starttime: Instant,
}

impl SearchClock {
    /// Starts the clock now.
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    /// A clock that has been running since `starttime`.
    pub const fn started_at(starttime: Instant) -> Self {
        Self { starttime }
    }

    /// Time since the clock was started.
    pub fn elapsed(&self) -> Duration {
        self.starttime.elapsed()
    }

    /// Returns `true` once the elapsed time strictly exceeds `budget`.
    pub fn is_expired(&self, budget: SearchBudget) -> bool {
        self.elapsed() > budget.duration()
    }
}
