use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// the drawer took too long to pick a word
    WordChoiceTimeout,
    RevealHint,
    TurnEnd,
}

/// Background task of one turn. Fires its scheduled events in order until it
/// is cancelled or `fire` returns false.
///
/// Every event is fired together with the turn generation the timer was
/// started for, the receiver has to ignore events of older generations.
pub struct TurnTimer {
    cancelled: Arc<(Mutex<bool>, Condvar)>,
}

impl TurnTimer {
    pub fn spawn<F>(generation: u64, schedule: Vec<(Duration, TimerEvent)>, fire: F) -> TurnTimer
    where
        F: Fn(u64, TimerEvent) -> bool + Send + 'static,
    {
        let cancelled = Arc::new((Mutex::new(false), Condvar::new()));
        let local_cancelled = cancelled.clone();

        thread::spawn(move || {
            let start = Instant::now();
            let (lock, cvar) = &*local_cancelled;
            for (offset, event) in schedule {
                let deadline = start + offset;
                {
                    let mut cancelled = lock.lock();
                    // no spurious wakeups in parking_lot cvars, but a cancel
                    // may arrive before the deadline
                    while !*cancelled && Instant::now() < deadline {
                        cvar.wait_until(&mut cancelled, deadline);
                    }
                    if *cancelled {
                        break;
                    }
                }
                if !fire(generation, event) {
                    break;
                }
            }
            debug!(generation, "turn timer terminated");
        });

        TurnTimer { cancelled }
    }

    /// Stops the timer. Never blocks, an event that is being fired right now
    /// still completes.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.cancelled;
        *lock.lock() = true;
        cvar.notify_all();
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
