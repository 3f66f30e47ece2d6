//! # Tick Pacing
//!
//! Deadline pacing for the simulation thread, and per-phase accounting of
//! where each tick's time went.
//!
//! ```text
//! deadline:   d0        d1        d2        d3
//!             │ tick ░░ │ tick ░░ │ tick ████│██ tick │
//!                                       └ late: busy > period
//! ```
//!
//! Deadlines advance by one period per tick, so a late tick is followed by
//! back-to-back ticks until the schedule is met again. A stall longer than
//! [`MAX_BACKLOG`] periods drops the backlog instead.
//!
//! A streaming exchange blocks on the peer inside the tick. A late tick that
//! would have fit its budget without the exchange is counted as peer-bound.

use std::time::{Duration, Instant};

/// Periods a pacer may fall behind before it drops the backlog.
pub const MAX_BACKLOG: u32 = 8;

/// Time spent in each phase of one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickPhases {
    /// Spawn and destroy drains.
    pub lifecycle: Duration,
    /// Peer round trip (or negotiation poll).
    pub exchange: Duration,
    /// Simulation step and state publishing.
    pub step: Duration,
}

impl TickPhases {
    /// Total busy time.
    #[must_use]
    pub fn busy(&self) -> Duration {
        self.lifecycle + self.exchange + self.step
    }
}

/// Accumulated pacing statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickStats {
    /// Ticks recorded.
    pub ticks: u64,
    /// Ticks whose busy time exceeded the period.
    pub late_ticks: u64,
    /// Late ticks that would have been on time without the peer exchange.
    pub peer_bound_ticks: u64,
    /// Times the backlog was dropped after a stall.
    pub resyncs: u64,
    /// Longest busy time seen.
    pub max_busy: Duration,
    /// Sum of busy times.
    pub total_busy: Duration,
    /// Sum of exchange times.
    pub total_exchange: Duration,
    /// Simulated seconds advanced.
    pub simulated_secs: f64,
}

impl TickStats {
    /// Mean busy time per tick.
    #[must_use]
    pub fn mean_busy(&self) -> Duration {
        mean(self.total_busy, self.ticks)
    }

    /// Mean exchange time per tick.
    #[must_use]
    pub fn mean_exchange(&self) -> Duration {
        mean(self.total_exchange, self.ticks)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

/// Paces the simulation thread at a fixed rate.
pub struct TickPacer {
    period: Duration,
    started: Instant,
    next_deadline: Instant,
    stats: TickStats,
}

impl TickPacer {
    /// Creates a pacer for `tick_rate` ticks per second (at least 1).
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let now = Instant::now();
        Self {
            period: Duration::from_secs(1) / tick_rate.max(1),
            started: now,
            next_deadline: now,
            stats: TickStats::default(),
        }
    }

    /// Wall-clock budget of one tick.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Blocks until the next tick is due and schedules the one after.
    ///
    /// Returns immediately while catching up.
    pub fn wait_for_tick(&mut self) {
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        } else if now - self.next_deadline > self.period * MAX_BACKLOG {
            self.stats.resyncs += 1;
            tracing::debug!(
                "tick pacer {:?} behind, dropping backlog",
                now - self.next_deadline
            );
            self.next_deadline = now;
        }
        self.next_deadline += self.period;
    }

    /// Records one finished tick that advanced the simulation by `step_dt`.
    pub fn record(&mut self, phases: TickPhases, step_dt: f64) {
        let busy = phases.busy();
        let stats = &mut self.stats;
        stats.ticks += 1;
        stats.total_busy += busy;
        stats.total_exchange += phases.exchange;
        stats.max_busy = stats.max_busy.max(busy);
        stats.simulated_secs += step_dt;

        if busy > self.period {
            stats.late_ticks += 1;
            if busy - phases.exchange <= self.period {
                stats.peer_bound_ticks += 1;
            }
        }
    }

    /// Statistics so far.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Wall-clock time since the pacer was created.
    #[must_use]
    pub fn wall_time(&self) -> Duration {
        self.started.elapsed()
    }

    /// Simulated seconds per wall-clock second.
    #[must_use]
    pub fn real_time_factor(&self) -> f64 {
        let wall = self.wall_time().as_secs_f64();
        if wall > 0.0 {
            self.stats.simulated_secs / wall
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_period_from_rate() {
        assert_eq!(TickPacer::new(100).period(), ms(10));
        assert_eq!(TickPacer::new(0).period(), Duration::from_secs(1));
    }

    #[test]
    fn test_late_tick_attributed_to_peer() {
        let mut pacer = TickPacer::new(100);

        // 4ms of local work plus a 9ms round trip: late only because of the peer
        pacer.record(TickPhases { lifecycle: ms(1), exchange: ms(9), step: ms(3) }, 0.01);
        // 12ms of local work: late on its own
        pacer.record(TickPhases { lifecycle: ms(2), exchange: ms(1), step: ms(10) }, 0.01);
        // on time
        pacer.record(TickPhases { lifecycle: ms(1), exchange: ms(2), step: ms(2) }, 0.01);

        let stats = pacer.stats();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.late_ticks, 2);
        assert_eq!(stats.peer_bound_ticks, 1);
        assert_eq!(stats.max_busy, ms(13));
        assert_eq!(stats.mean_exchange(), ms(4));
    }

    #[test]
    fn test_simulated_time_accumulates() {
        let mut pacer = TickPacer::new(50);
        for _ in 0..4 {
            pacer.record(TickPhases::default(), 0.005);
        }
        assert!((pacer.stats().simulated_secs - 0.02).abs() < 1e-12);
        assert_eq!(pacer.stats().mean_busy(), Duration::ZERO);
    }

    #[test]
    fn test_wait_paces_ticks() {
        let start = Instant::now();
        let mut pacer = TickPacer::new(200);
        // first tick is due immediately, the other four one period apart
        for _ in 0..5 {
            pacer.wait_for_tick();
        }
        assert!(start.elapsed() >= ms(20));
        assert_eq!(pacer.stats().resyncs, 0);
    }

    #[test]
    fn test_stall_drops_backlog() {
        let mut pacer = TickPacer::new(1000);
        pacer.wait_for_tick();
        std::thread::sleep(ms(30));

        let before = Instant::now();
        pacer.wait_for_tick();
        assert_eq!(pacer.stats().resyncs, 1);

        // rescheduled from now instead of 28 periods in the past
        assert!(pacer.next_deadline > before);
    }
}
