//! Interval timers for the cooperative tick loop.
//!
//! Every periodic concern in the agent (session reconnect gating,
//! telemetry, actuator position log) is an [`IntervalTimer`] checked once
//! per tick against the monotonic uptime. Nothing here sleeps; the loop
//! asks "is it due?" and moves on.
//!
//! ```text
//!   tick ──▶ timer.poll(now) ──▶ true  ──▶ do work, next_due = now + period
//!                         └───▶ false ──▶ skip
//! ```

/// A re-arming deadline expressed in milliseconds of uptime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    period_ms: u64,
    next_due_ms: u64,
}

impl IntervalTimer {
    /// First fire one full period after `now_ms`.
    pub fn new(period_ms: u32, now_ms: u64) -> Self {
        Self {
            period_ms: u64::from(period_ms),
            next_due_ms: now_ms.saturating_add(u64::from(period_ms)),
        }
    }

    /// Due on the very first check.
    pub fn immediate(period_ms: u32) -> Self {
        Self {
            period_ms: u64::from(period_ms),
            next_due_ms: 0,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_due_ms
    }

    /// Returns `true` and re-arms when due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.is_due(now_ms) {
            self.rearm(now_ms);
            true
        } else {
            false
        }
    }

    /// Push the deadline one period past `now_ms`.
    ///
    /// Re-arming from `now` (not from the old deadline) means a tick that
    /// ran late never triggers a burst of catch-up fires.
    pub fn rearm(&mut self, now_ms: u64) {
        self.next_due_ms = now_ms.saturating_add(self.period_ms);
    }
}
