use crate::prelude::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Wall-clock source for the scheduler.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utils::utc()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Something the scheduler can run repeatedly. Any `FnMut() -> Future` works.
#[async_trait]
pub trait Job: Send {
    async fn run(&mut self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Job for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&mut self) -> Result<()> {
        (self)().await
    }
}

/// Runs one job at a time, phase-locked to the wall clock so that it fires
/// when `now mod interval == offset`.
///
/// The next deadline is always recomputed from a fresh clock reading after
/// the job returns, so time spent in the job or lost to sleep overshoot never
/// accumulates.
pub struct Scheduler<C = SystemClock> {
    interval: u64,
    offset: u64,
    period: chrono::Duration,
    clock: C,
}

/// Longest supported interval, one week.
pub const MAX_INTERVAL: u64 = 7 * 24 * 3600;

impl Scheduler<SystemClock> {
    pub fn new(interval: u64, offset: u64) -> Result<Self> {
        Self::with_clock(interval, offset, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(interval: u64, offset: u64, clock: C) -> Result<Self> {
        if interval == 0 {
            bail!("scheduler interval must be at least 1 second");
        }
        if interval > MAX_INTERVAL {
            bail!("scheduler interval {} exceeds {} seconds", interval, MAX_INTERVAL);
        }
        if offset >= interval {
            bail!("scheduler offset {} must be less than interval {}", offset, interval);
        }

        Ok(Self {
            interval,
            offset,
            period: chrono::Duration::seconds(i64::try_from(interval)?),
            clock,
        })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The first aligned instant strictly after `now`.
    pub fn next_tick(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        const NANOS: i128 = 1_000_000_000;

        let t = i128::from(now.timestamp()) * NANOS + i128::from(now.timestamp_subsec_nanos());
        let interval = i128::from(self.interval) * NANOS;
        let offset = i128::from(self.offset) * NANOS;

        let phase = (t - offset).rem_euclid(interval);
        // (0, interval], and interval is bounded by MAX_INTERVAL
        let delay = i64::try_from(interval - phase).unwrap_or(i64::MAX);

        now + chrono::Duration::nanoseconds(delay)
    }

    /// Runs `job` forever, returning only when it fails.
    ///
    /// If a run overruns the tick after the one it started on, the next run
    /// starts straight away instead of waiting for the following tick. Missed
    /// ticks are never queued up.
    pub async fn run<J>(&self, job: &mut J) -> Result<()>
    where
        J: Job + ?Sized,
    {
        let mut due = self.next_tick(self.clock.now());

        loop {
            let now = self.clock.now();
            if let Ok(delay) = (due - now).to_std() {
                debug!("deltat: {:?}", delay);
                self.clock.sleep(delay).await;
            }

            job.run().await?;

            let now = self.clock.now();
            let missed = due + self.period;
            due = if now >= missed {
                warn!(
                    "job overran its {}s interval by {}, running again immediately",
                    self.interval,
                    now - missed
                );
                now
            } else {
                // a wall clock read a little short of `due` must not land
                // on the same tick again
                self.next_tick(now.max(due))
            };
        }
    }
}
