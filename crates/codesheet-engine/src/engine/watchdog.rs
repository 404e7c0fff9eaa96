//! Evaluation deadline shared by nested cell evaluations.
//!
//! The outermost evaluation arms the deadline; evaluations started while it
//! is armed (cells referenced from other cells) run under the same deadline.
//! Rhai polls the deadline through `on_progress` and terminates the script
//! once it has passed.

use rhai::{Dynamic, Engine};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Number of Rhai operations between deadline checks.
const CHECK_INTERVAL: u64 = 256;

#[derive(Clone, Debug, Default)]
pub struct Watchdog {
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Watchdog {
    pub fn new() -> Watchdog {
        Watchdog::default()
    }

    /// Hook the deadline into `engine`.
    pub fn install(&self, engine: &mut Engine) {
        let deadline = self.deadline.clone();
        engine.on_progress(move |ops| {
            if ops % CHECK_INTERVAL != 0 {
                return None;
            }
            let armed = *deadline.lock().unwrap_or_else(PoisonError::into_inner);
            match armed {
                Some(at) if Instant::now() >= at => Some(Dynamic::from("timeout")),
                _ => None,
            }
        });
    }

    /// Arm the deadline unless an enclosing evaluation already did.
    ///
    /// The returned guard disarms the deadline on drop if it was the one
    /// that armed it.
    pub fn arm(&self, limit: Duration) -> WatchdogGuard {
        let mut deadline = self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        let owner = deadline.is_none();
        if owner {
            *deadline = Some(Instant::now() + limit);
        }
        WatchdogGuard {
            watchdog: self.clone(),
            owner,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Disarms the watchdog when the owning evaluation ends.
#[must_use]
pub struct WatchdogGuard {
    watchdog: Watchdog,
    owner: bool,
}

impl Drop for WatchdogGuard {
    fn drop(&mut self) {
        if self.owner {
            *self
                .watchdog
                .deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::EvalAltResult;

    #[test]
    fn test_nested_arm_keeps_outer_deadline() {
        let watchdog = Watchdog::new();
        let outer = watchdog.arm(Duration::from_secs(5));
        {
            let _inner = watchdog.arm(Duration::from_secs(1));
            assert!(watchdog.is_armed());
        }
        assert!(watchdog.is_armed());
        drop(outer);
        assert!(!watchdog.is_armed());
    }

    #[test]
    fn test_infinite_loop_is_terminated() {
        let watchdog = Watchdog::new();
        let mut engine = Engine::new();
        watchdog.install(&mut engine);
        let _guard = watchdog.arm(Duration::from_millis(50));
        let err = engine.run("loop { }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTerminated(..)));
    }

    #[test]
    fn test_unarmed_engine_runs_normally() {
        let watchdog = Watchdog::new();
        let mut engine = Engine::new();
        watchdog.install(&mut engine);
        let n: i64 = engine.eval("let n = 0; for i in 0..10000 { n += i } n").unwrap();
        assert_eq!(n, 49995000);
    }
}
