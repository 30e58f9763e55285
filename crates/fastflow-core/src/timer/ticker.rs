//! Background display refresh for a shared [`FastingService`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::FastingService;

pub type SharedService = Arc<Mutex<FastingService>>;

fn lock(service: &SharedService) -> MutexGuard<'_, FastingService> {
    // Service state is re-derived from the clock on every tick, so a
    // poisoned lock is still usable.
    service.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to a running ticker task.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the ticker to exit on its own.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "ticker task panicked");
            }
        }
    }
}

/// Call [`FastingService::tick`] every `period` until the service disarms.
///
/// Ticks missed while the process was suspended are skipped, not replayed.
/// The lock is held only for the duration of one tick.
pub fn spawn_ticker(service: SharedService, period: Duration) -> TickerHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period_ms = period.as_millis() as u64, "ticker started");
        loop {
            interval.tick().await;
            let armed = {
                let mut guard = lock(&service);
                let armed = guard.is_ticking();
                if armed {
                    guard.tick();
                }
                armed
            };
            if !armed {
                break;
            }
        }
        tracing::debug!("ticker stopped");
    });
    TickerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::Event;
    use crate::notifications::MemoryGateway;
    use crate::storage::{Config, FastStateStore, MemoryStore};
    use chrono::{TimeZone, Utc};

    fn shared() -> (SharedService, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 1, 20, 0, 0).unwrap());
        let service = FastingService::new(
            FastStateStore::new(MemoryStore::new()),
            MemoryGateway::new(),
            Arc::new(clock.clone()),
        );
        (Arc::new(Mutex::new(service)), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let (service, clock) = shared();
        let updates = Arc::new(Mutex::new(0u32));
        {
            let mut guard = lock(&service);
            let counter = Arc::clone(&updates);
            guard.subscribe(move |e| {
                if matches!(e, Event::TimerUpdate { .. }) {
                    *counter.lock().unwrap() += 1;
                }
            });
            guard.start("16_8");
        }

        let period = Config::default().tick_interval();
        let handle = spawn_ticker(Arc::clone(&service), period);
        for _ in 0..3 {
            clock.advance(chrono::Duration::seconds(1));
            tokio::time::sleep(period).await;
        }
        assert!(*updates.lock().unwrap() >= 3);
        assert!(!handle.is_finished());

        lock(&service).stop().unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exits_immediately_when_idle() {
        let (service, _) = shared();
        let handle = spawn_ticker(service, Duration::from_secs(1));
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn abort_cancels_task() {
        let (service, _) = shared();
        lock(&service).start("12_12");
        let handle = spawn_ticker(Arc::clone(&service), Duration::from_secs(1));
        handle.abort();
        handle.join().await;
        assert!(lock(&service).is_fasting());
    }
}
