//! Sink lifecycle state machine.
//!
//! Exactly one writer (the consumer loop) advances the state; external
//! controllers (health checks, shutdown hooks) observe it through a watch
//! channel or request transitions (`stop`, `suspend`, `resume`). Waiting is
//! cooperative: observers await watch notifications, never spin.

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::info;

/// Lifecycle state of a sink consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Initializing,
    Running,
    Suspended,
    StoppingFromInit,
    StoppingFromRunning,
    StoppingFromSuspend,
    Stopped,
    BackendFailed,
}

impl SinkStatus {
    /// A stop has been requested but the loop has not yet exited.
    pub fn is_stopping(self) -> bool {
        matches!(
            self,
            SinkStatus::StoppingFromInit
                | SinkStatus::StoppingFromRunning
                | SinkStatus::StoppingFromSuspend
        )
    }

    /// The loop has exited and will not restart.
    pub fn is_terminal(self) -> bool {
        matches!(self, SinkStatus::Stopped | SinkStatus::BackendFailed)
    }
}

/// Guarded state plus a watch channel for observers.
#[derive(Debug)]
pub struct StatusFsm {
    state: Mutex<SinkStatus>,
    watch_tx: watch::Sender<SinkStatus>,
}

impl Default for StatusFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusFsm {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(SinkStatus::Initializing);
        Self {
            state: Mutex::new(SinkStatus::Initializing),
            watch_tx,
        }
    }

    /// Current state.
    pub fn current(&self) -> SinkStatus {
        match self.state.lock() {
            Ok(state) => *state,
            // A poisoned lock means a writer panicked mid-transition; the
            // stored value is still a valid enum.
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Guarded compare-and-set style transition. Returns the state after
    /// the call.
    fn transition(&self, apply: impl FnOnce(SinkStatus) -> Option<SinkStatus>) -> SinkStatus {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(next) = apply(*state) {
            info!(from = ?*state, to = ?next, "sink status transition");
            *state = next;
            self.watch_tx.send_replace(next);
        }
        *state
    }

    /// Subscription established; the loop is live.
    pub fn mark_init_completed(&self) {
        self.transition(|state| match state {
            SinkStatus::Initializing => Some(SinkStatus::Running),
            _ => None,
        });
    }

    /// Request a pause without dropping the consumer.
    pub fn suspend(&self) {
        self.transition(|state| match state {
            SinkStatus::Running => Some(SinkStatus::Suspended),
            _ => None,
        });
    }

    /// Resume a suspended consumer.
    pub fn resume(&self) {
        self.transition(|state| match state {
            SinkStatus::Suspended => Some(SinkStatus::Running),
            _ => None,
        });
    }

    /// Request a stop. The loop observes the request, finishes the current
    /// cycle and exits.
    pub fn stop(&self) {
        self.transition(|state| match state {
            SinkStatus::Initializing => Some(SinkStatus::StoppingFromInit),
            SinkStatus::Running => Some(SinkStatus::StoppingFromRunning),
            SinkStatus::Suspended => Some(SinkStatus::StoppingFromSuspend),
            _ => None,
        });
    }

    /// Fatal backend failure; requires operator intervention or restart.
    pub fn mark_backend_failed(&self) {
        self.transition(|state| match state {
            SinkStatus::Stopped | SinkStatus::BackendFailed => None,
            _ => Some(SinkStatus::BackendFailed),
        });
    }

    /// The loop has exited after a stop request.
    pub fn mark_stopped(&self) {
        self.transition(|state| {
            if state.is_stopping() {
                Some(SinkStatus::Stopped)
            } else {
                None
            }
        });
    }

    /// The loop should keep polling and processing.
    pub fn is_running(&self) -> bool {
        self.current() == SinkStatus::Running
    }

    /// The loop has not been asked to exit.
    pub fn is_active(&self) -> bool {
        matches!(
            self.current(),
            SinkStatus::Initializing | SinkStatus::Running | SinkStatus::Suspended
        )
    }

    /// Watch the state; the receiver sees every transition.
    pub fn subscribe(&self) -> watch::Receiver<SinkStatus> {
        self.watch_tx.subscribe()
    }

    /// Cooperatively wait until the sink is running, stopping or failed.
    /// Blocks only while suspended or still initializing.
    pub async fn wait_until_running_or_stopping(&self) {
        let mut rx = self.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            let wanted = state == SinkStatus::Running || state.is_stopping() || state.is_terminal();
            if wanted {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn init_then_run_then_stop() {
        let fsm = StatusFsm::new();
        assert_eq!(fsm.current(), SinkStatus::Initializing);
        assert!(fsm.is_active());

        fsm.mark_init_completed();
        assert!(fsm.is_running());

        fsm.stop();
        assert_eq!(fsm.current(), SinkStatus::StoppingFromRunning);
        assert!(!fsm.is_active());

        fsm.mark_stopped();
        assert_eq!(fsm.current(), SinkStatus::Stopped);
    }

    #[test]
    fn stop_records_the_state_it_came_from() {
        let from_init = StatusFsm::new();
        from_init.stop();
        assert_eq!(from_init.current(), SinkStatus::StoppingFromInit);

        let from_suspend = StatusFsm::new();
        from_suspend.mark_init_completed();
        from_suspend.suspend();
        from_suspend.stop();
        assert_eq!(from_suspend.current(), SinkStatus::StoppingFromSuspend);
    }

    #[test]
    fn suspend_and_resume() {
        let fsm = StatusFsm::new();
        fsm.mark_init_completed();
        fsm.suspend();
        assert_eq!(fsm.current(), SinkStatus::Suspended);
        assert!(fsm.is_active());
        assert!(!fsm.is_running());

        fsm.resume();
        assert!(fsm.is_running());
    }

    #[test]
    fn backend_failure_is_sticky() {
        let fsm = StatusFsm::new();
        fsm.mark_init_completed();
        fsm.mark_backend_failed();
        assert_eq!(fsm.current(), SinkStatus::BackendFailed);

        // A later stop request or stop confirmation must not mask the failure.
        fsm.stop();
        fsm.mark_stopped();
        assert_eq!(fsm.current(), SinkStatus::BackendFailed);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let fsm = StatusFsm::new();
        fsm.resume();
        assert_eq!(fsm.current(), SinkStatus::Initializing);
        fsm.suspend();
        assert_eq!(fsm.current(), SinkStatus::Initializing);
        fsm.mark_stopped();
        assert_eq!(fsm.current(), SinkStatus::Initializing);
    }

    #[tokio::test]
    async fn observers_see_transitions_through_the_watch_channel() {
        let fsm = Arc::new(StatusFsm::new());
        let mut rx = fsm.subscribe();

        let observer = {
            let rx_fsm = Arc::clone(&fsm);
            tokio::spawn(async move {
                rx_fsm.wait_until_running_or_stopping().await;
                rx_fsm.current()
            })
        };

        fsm.mark_init_completed();
        assert_eq!(observer.await.unwrap(), SinkStatus::Running);

        fsm.stop();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SinkStatus::StoppingFromRunning);
    }
}
